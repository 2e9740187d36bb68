use std::sync::Arc;

use async_stream::try_stream;
use derive_new::new;

use crate::execution::BoxedExecutor;
use crate::runtime::ExecutionContext;

#[derive(new)]
pub struct Limit {
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) child: BoxedExecutor,
}

impl Limit {
    pub fn execute(self, _context: Arc<ExecutionContext>) -> BoxedExecutor {
        let Limit {
            limit,
            offset,
            child,
        } = self;
        let offset_val = offset.unwrap_or(0);
        // end index of the whole output
        let total_end = limit.map(|l| offset_val + l).unwrap_or(u64::MAX);

        Box::pin(try_stream! {
            if limit != Some(0) {
                let mut returned_count = 0;

                for await batch in child {
                    let batch = batch?;

                    let cardinality = batch.num_rows() as u64;

                    let start = returned_count.max(offset_val) - returned_count;
                    // clamp the total end to the current batch, relative to the batch.
                    let end = total_end.min(returned_count + cardinality) - returned_count;

                    returned_count += cardinality;

                    // example: offset=1000, limit=2, cardinality=100
                    // start = 0.max(1000)-0 = 1000
                    // end = (1000+2).min(0+100)-0 = 100
                    // start > end, skip the whole batch.
                    if start < end {
                        if (start..end) == (0..cardinality) {
                            yield batch;
                        } else {
                            yield batch.slice(start as usize, (end - start) as usize);
                        }
                    }

                    if returned_count >= total_end {
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::sync::Arc;

    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use futures::{StreamExt, TryStreamExt};
    use itertools::Itertools;
    use test_case::test_case;

    use super::*;
    use crate::execution::test_util::test_context;

    #[test_case(&[(0..6)], 1, Some(4), &[(1..5)])]
    #[test_case(&[(0..6)], 0, Some(10), &[(0..6)])]
    #[test_case(&[(0..6)], 10, Some(0), &[])]
    #[test_case(&[(0..2), (2..4), (4..6)], 1, Some(4), &[(1..2),(2..4),(4..5)])]
    #[test_case(&[(0..2), (2..4), (4..6)], 1, Some(2), &[(1..2),(2..3)])]
    #[test_case(&[(0..2), (2..4), (4..6)], 3, Some(0), &[])]
    #[test_case(&[(0..2), (2..4), (4..6)], 3, None, &[(3..4),(4..6)])]
    #[tokio::test]
    async fn limit(
        inputs: &'static [Range<i32>],
        offset: u64,
        limit: Option<u64>,
        outputs: &'static [Range<i32>],
    ) {
        let executor = Limit::new(
            limit,
            Some(offset),
            futures::stream::iter(inputs.iter().map(range_to_chunk).map(Ok)).boxed(),
        );
        let actual = executor
            .execute(test_context())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        let outputs = outputs.iter().map(range_to_chunk).collect_vec();
        assert_eq!(actual, outputs);
    }

    fn range_to_chunk(range: &Range<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
        let data: Vec<_> = range.clone().collect();
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(data))]).unwrap()
    }
}
