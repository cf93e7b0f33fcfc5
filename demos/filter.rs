use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use fqtools::processing::{
    AdapterTrimmer, MinLengthPredicate, MinQualityPredicate, ProcessingPipeline, QualityTrimmer,
    TrimMode,
};
use fqtools::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const ADAPTER: &str = "AGATCGGAAGAGC";

/// Counts the N bases of every batch
#[derive(Clone, Default)]
pub struct NCounter {
    counter: Arc<AtomicUsize>,
}
impl NCounter {
    pub fn counter(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}
impl ParallelProcessor for NCounter {
    type Output = usize;

    fn process_batch(&mut self, batch: &mut RecordBatch) -> fqtools::Result<usize> {
        let n_bases = batch.iter().map(|r| r.n_count()).sum();
        self.counter.fetch_add(n_bases, Ordering::Relaxed);
        Ok(batch.len())
    }
}

/// Tallies records in input order
#[derive(Default)]
struct RecordTally(usize);
impl OrderedSink<usize> for RecordTally {
    fn drain(&mut self, _batch: &RecordBatch, n_records: usize) -> fqtools::Result<()> {
        self.0 += n_records;
        Ok(())
    }
}

fn write_random(path: &Path, num_seq: usize, max_len: usize) -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut writer = FastqWriter::create(path, WriterOptions::default())?;
    for idx in 0..num_seq {
        let len = rng.random_range(20..=max_len);
        let mut seq: Vec<u8> = (0..len).map(|_| b"ACGTN"[rng.random_range(0..5)]).collect();
        if rng.random_bool(0.1) {
            seq.truncate(rng.random_range(0..len));
            seq.extend_from_slice(ADAPTER.as_bytes());
        }
        let qual: Vec<u8> = (0..seq.len()).map(|_| rng.random_range(35..75)).collect();
        writer.write_record(&OwnedRecord::new(format!("read{idx}"), "", seq, qual))?;
    }
    writer.finish()?;
    Ok(())
}

fn count_n_bases(path: &Path, n_threads: usize) -> Result<()> {
    let config = ProcessingConfig::builder().thread_count(n_threads).build()?;
    let mut reader = ChunkedReader::open(path, config.reader_options())?;
    let proc = NCounter::default();
    let mut tally = RecordTally::default();
    OrderedPipeline::new(&config).run(&mut reader, proc.clone(), &mut tally)?;
    eprintln!("{} records, {} N bases", tally.0, proc.counter());
    Ok(())
}

fn filter(input: &Path, output: &Path, n_threads: usize) -> Result<()> {
    let config = ProcessingConfig::builder().thread_count(n_threads).build()?;
    let mut pipeline = ProcessingPipeline::builder()
        .input(input)
        .output(output)
        .config(config)
        .predicate(MinQualityPredicate::new(20.0, 33)?)
        .predicate(MinLengthPredicate::new(30))
        .mutator(QualityTrimmer::new(15.0, TrimMode::Both, 33)?)
        .mutator(AdapterTrimmer::new([ADAPTER])?)
        .build()?;
    let stats = pipeline.run()?;
    eprintln!("{stats}");
    Ok(())
}

fn time_it<F: FnOnce() -> Result<()>>(f: F, label: &str) {
    let start = Instant::now();
    if let Err(e) = f() {
        eprintln!("{label} failed: {e}");
        return;
    }
    eprintln!("{label}: {:?}", start.elapsed());
}

pub fn main() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reads.fastq.gz");
    let num_seq = 200_000;

    time_it(|| write_random(&input, num_seq, 150), "write_random");
    time_it(|| count_n_bases(&input, 1), "count_n_bases (1)");
    for n_threads in [2, 4, 8] {
        let output = dir.path().join(format!("filtered_{n_threads}.fastq.zst"));
        time_it(
            || filter(&input, &output, n_threads),
            &format!("filter ({n_threads})"),
        );
        time_it(
            || count_n_bases(&output, n_threads),
            &format!("count_n_bases ({n_threads})"),
        );
    }
    Ok(())
}
