use std::path::PathBuf;
use std::sync::Arc;

use derive_new::new;
use strum_macros::Display;

use super::PlanNode;
use crate::common::FragmentId;

/// How a streaming sink spreads its batches over the destination fragment's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OutputPartition {
    /// Every batch goes to every destination instance.
    #[strum(serialize = "UNPARTITIONED")]
    Unpartitioned,
    /// Batches are dealt round-robin over the destination instances.
    #[strum(serialize = "RANDOM")]
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSink {
    /// The query result; only the coordinator fragment writes it.
    Result,
    /// Streams the output into the exchange of another fragment.
    Stream {
        dest: FragmentId,
        partition: OutputPartition,
    },
}

#[derive(Debug, Clone)]
pub enum ScanSource {
    File(PathBuf),
    Inline(Arc<str>),
}

/// A unit of delimited text data read by one scan.
#[derive(new, Debug, Clone)]
pub struct ScanRange {
    /// Name used when reporting per-file errors.
    pub(crate) file_name: String,
    pub(crate) source: ScanSource,
}

impl ScanRange {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        ScanRange::new(path.display().to_string(), ScanSource::File(path))
    }

    pub fn inline(file_name: &str, data: &str) -> Self {
        ScanRange::new(file_name.to_string(), ScanSource::Inline(Arc::from(data)))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Per-instance execution parameters.
#[derive(new, Debug, Clone, Default)]
pub struct FragmentInstanceParams {
    pub(crate) scan_ranges: Vec<ScanRange>,
}

/// A subtree of the physical plan executed as one unit by one or more instances.
#[derive(new, Debug, Clone)]
pub struct PlanFragment {
    pub(crate) id: FragmentId,
    pub(crate) root: PlanNode,
    pub(crate) sink: DataSink,
    pub(crate) is_coordinator: bool,
    pub(crate) instances: Vec<FragmentInstanceParams>,
}

impl PlanFragment {
    /// The fragment that runs in the requesting process and writes the query result.
    pub fn coordinator(id: FragmentId, root: PlanNode, params: FragmentInstanceParams) -> Self {
        PlanFragment::new(id, root, DataSink::Result, true, vec![params])
    }

    pub fn remote(
        id: FragmentId,
        root: PlanNode,
        dest: FragmentId,
        partition: OutputPartition,
        instances: Vec<FragmentInstanceParams>,
    ) -> Self {
        PlanFragment::new(
            id,
            root,
            DataSink::Stream { dest, partition },
            false,
            instances,
        )
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn is_coordinator(&self) -> bool {
        self.is_coordinator
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }
}
