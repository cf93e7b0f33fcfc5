use std::path::PathBuf;

use clap::Args;

use super::RuntimeArgs;
use crate::processing::validate_quality_offset;
use crate::statistics::{
    FqStatisticResult, StatisticCalculator, StatisticOptions, DEFAULT_STAT_BATCH_SIZE,
};
use crate::{ProcessingConfig, Result};

#[derive(Args, Debug, Clone)]
pub struct StatCommand {
    /// Input FASTQ (plain, gzip, or zstd)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output statistics report
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// Records per batch
    #[arg(long, default_value_t = DEFAULT_STAT_BATCH_SIZE)]
    pub batch_size: usize,
}
impl StatCommand {
    pub fn config(&self) -> Result<ProcessingConfig> {
        validate_quality_offset(self.runtime.quality_encoding)?;
        self.runtime.config_builder(self.batch_size).build()
    }

    /// Run the stat subcommand
    pub fn try_execute(&self) -> Result<FqStatisticResult> {
        let options =
            StatisticOptions::new(self.input.clone(), self.output.clone()).with_config(self.config()?);
        StatisticCalculator::new(options).run()
    }
}
