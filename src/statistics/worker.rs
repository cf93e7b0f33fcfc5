use super::FqStatisticResult;
use crate::parallel::ParallelProcessor;
use crate::processing::validate_quality_offset;
use crate::{FastqRecord, RecordBatch, Result};

/// Computes a [`FqStatisticResult`] for one batch at a time
///
/// Workers are stateless between batches, so one clone per thread is enough.
#[derive(Debug, Clone, Copy)]
pub struct StatisticWorker {
    offset: u8,
    tid: Option<usize>,
}
impl StatisticWorker {
    /// # Errors
    ///
    /// Fails if `offset` is not 33 or 64.
    pub fn new(offset: u8) -> Result<Self> {
        Ok(Self {
            offset: validate_quality_offset(offset)?,
            tid: None,
        })
    }

    #[must_use]
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Distributions of every record in `batch`
    #[must_use]
    pub fn calculate(&self, batch: &RecordBatch) -> FqStatisticResult {
        let mut result = FqStatisticResult::new();
        for record in batch {
            result.add_read(record.seq(), record.qual(), self.offset);
        }
        result
    }
}

impl ParallelProcessor for StatisticWorker {
    type Output = FqStatisticResult;

    fn process_batch(&mut self, batch: &mut RecordBatch) -> Result<Self::Output> {
        Ok(self.calculate(batch))
    }

    fn set_tid(&mut self, tid: usize) {
        self.tid = Some(tid);
    }

    fn get_tid(&self) -> Option<usize> {
        self.tid
    }
}
