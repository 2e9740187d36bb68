use std::env;

use anyhow::Result;
use distexec::common::FragmentId;
use distexec::function::BuiltinFunctions;
use distexec::main_entry::QueryExecutor;
use distexec::planner::{
    BoundExpression, ExecutionRequest, FragmentInstanceParams, OutputPartition, PlanFragment,
    PlanNode, ScanRange,
};
use distexec::runtime::ExecConfig;
use distexec::types::LogicalType;
use distexec::util::pretty_batches;
use log::info;

const SAMPLE_PARTS: [&str; 2] = [
    "1,Hopkins,1200\n2,Ray,800\n3,Lee,not-a-number\n4,Gomez,3100",
    "5,Chen,1500\n6,Patel\n7,Novak,950\n8,Okafor,2200",
];

/// `select name, salary * 2 from employee where salary > 1000 limit 10`
fn build_request(ranges: Vec<ScanRange>, num_backends: usize) -> Result<ExecutionRequest> {
    let functions = BuiltinFunctions::new();
    let names = ["id", "name", "salary"];
    let types = vec![
        LogicalType::Integer,
        LogicalType::Varchar,
        LogicalType::Integer,
    ];
    let predicate = BoundExpression::function(
        &functions,
        "gt",
        vec![
            BoundExpression::reference("salary", 2, LogicalType::Integer),
            BoundExpression::constant(1000),
        ],
    )?;
    let select_list = vec![
        BoundExpression::reference("name", 1, LogicalType::Varchar),
        BoundExpression::function(
            &functions,
            "multiply",
            vec![
                BoundExpression::reference("salary", 2, LogicalType::Integer),
                BoundExpression::constant(2),
            ],
        )?,
    ];

    let scan = PlanNode::filter(predicate, PlanNode::text_scan(&names, types.clone(), b','));
    let fragments = if num_backends == 0 {
        let root = PlanNode::limit(Some(10), None, scan);
        vec![PlanFragment::coordinator(
            FragmentId(0),
            root,
            FragmentInstanceParams::new(ranges),
        )]
    } else {
        // one remote instance per range, gathered by the coordinator
        let instances = ranges
            .into_iter()
            .map(|range| FragmentInstanceParams::new(vec![range]))
            .collect();
        let remote = PlanFragment::remote(
            FragmentId(1),
            scan,
            FragmentId(0),
            OutputPartition::Unpartitioned,
            instances,
        );
        let root = PlanNode::limit(Some(10), None, PlanNode::exchange(FragmentId(1), &names, types));
        vec![
            PlanFragment::coordinator(FragmentId(0), root, FragmentInstanceParams::default()),
            remote,
        ]
    };
    Ok(ExecutionRequest::with_select_list(fragments, select_list))
}

fn main() -> Result<()> {
    env_logger::init();

    let config = ExecConfig::from_env();
    let args = env::args().skip(1).collect::<Vec<_>>();
    let ranges = if args.is_empty() {
        SAMPLE_PARTS
            .iter()
            .enumerate()
            .map(|(i, data)| ScanRange::inline(&format!("employee_{}.csv", i), data))
            .collect()
    } else {
        args.iter().map(ScanRange::file).collect()
    };
    let request = build_request(ranges, config.num_backends())?;

    let mut executor = QueryExecutor::new(config);

    // 1. show the fragments
    println!("{}\n", executor.explain(&request)?);

    // 2. run and print the result table
    executor.exec(&request)?;
    let mut batches = vec![];
    while let Some(batch) = executor.fetch_batch()? {
        batches.push(batch);
    }
    println!("{}", pretty_batches(&batches)?);

    // 3. diagnostics
    let stats = executor.exec_stats();
    info!(
        "{} rows from {} instances, {} errors",
        stats.num_rows, stats.num_instances, stats.num_errors
    );
    let errors = executor.error_log();
    if !errors.is_empty() {
        println!("\n{}\n{}", errors, executor.file_errors());
    }
    println!("\n{}", executor.profile().pretty_string());
    executor.shutdown();
    Ok(())
}
