//! Per-position quality and base composition statistics
//!
//! Each batch is summarized into a [`FqStatisticResult`] by a [`StatisticWorker`];
//! the partial results are merged with `+=` and written by [`write_report`].

mod calculator;
mod report;
mod result;
mod worker;

pub use calculator::{StatisticCalculator, StatisticOptions, DEFAULT_STAT_BATCH_SIZE};
pub use report::write_report;
pub use result::{base_bin, BaseRow, FqStatisticResult, QualityRow, BASE_BINS, MAX_QUAL, OTHER_BASE};
pub use worker::StatisticWorker;
