use std::io::Write;

use anyhow::Result;
use fqtools::statistics::{StatisticCalculator, StatisticOptions};
use fqtools::ProcessingConfig;

const READS: &[u8] = b"@r1\nAAAAA\n+\nIIIII\n@r2\nACGTN\n+\n!!#$!\n@r3\nGGCCA\n+\n55555\n";

pub fn main() -> Result<()> {
    // Usage: stat [input.fastq[.gz|.zst]]
    let dir = tempfile::tempdir()?;
    let input = match std::env::args().nth(1) {
        Some(path) => path.into(),
        None => {
            let path = dir.path().join("reads.fastq");
            std::fs::File::create(&path)?.write_all(READS)?;
            path
        }
    };
    let report = dir.path().join("reads.stat");

    let config = ProcessingConfig::builder().thread_count(2).build()?;
    let options = StatisticOptions::new(&input, &report).with_config(config);
    let result = StatisticCalculator::new(options).run()?;
    eprintln!(
        "{} reads, {} bases, longest read {}",
        result.read_count, result.total_bases, result.max_read_length
    );

    print!("{}", std::fs::read_to_string(&report)?);
    Ok(())
}
