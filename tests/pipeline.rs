use std::ffi::OsString;
use std::io::Write;
use std::path::Path;

use clap::Parser;
use flate2::write::GzEncoder;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use fqtools::cli::{Cli, Commands};
use fqtools::processing::{
    AdapterTrimmer, MaxNRatioPredicate, MinLengthPredicate, MinQualityPredicate,
    ProcessingPipeline, QualityTrimmer, TrimMode,
};
use fqtools::statistics::{StatisticCalculator, StatisticOptions};
use fqtools::{ChunkedReader, FastqRecord, OwnedRecord, ProcessingConfig, ReaderOptions, Result};

const ADAPTER: &str = "AGATCGGAAGAGC";

fn random_fastq(n_records: usize, seed: u64) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut out = Vec::new();
    for idx in 0..n_records {
        let len = rng.random_range(10..160);
        let mut seq: Vec<u8> = (0..len).map(|_| b"ACGTN"[rng.random_range(0..5)]).collect();
        if rng.random_bool(0.2) {
            let at = rng.random_range(0..seq.len());
            seq.truncate(at);
            seq.extend_from_slice(ADAPTER.as_bytes());
        }
        let qual: Vec<u8> = (0..seq.len()).map(|_| rng.random_range(35..75)).collect();
        writeln!(out, "@read{idx} lane=1").unwrap();
        out.extend_from_slice(&seq);
        out.extend_from_slice(b"\n+\n");
        out.extend_from_slice(&qual);
        out.push(b'\n');
    }
    out
}

fn read_all(path: &Path) -> Result<Vec<OwnedRecord>> {
    let mut reader = ChunkedReader::open(path, ReaderOptions::default())?;
    let mut batch = fqtools::RecordBatch::default();
    let mut records = Vec::new();
    while reader.fill_batch(&mut batch, 1000)? {
        records.extend(batch.iter().map(|r| r.to_owned()));
    }
    Ok(records)
}

fn filter_file(input: &Path, output: &Path, threads: usize) -> Result<u64> {
    let config = ProcessingConfig::builder()
        .thread_count(threads)
        .batch_size(97)
        .read_chunk_bytes(4096)
        .build()?;
    let mut pipeline = ProcessingPipeline::new(input, output, config);
    pipeline.add_predicate(MinQualityPredicate::new(20.0, 33)?);
    pipeline.add_predicate(MaxNRatioPredicate::new(0.3)?);
    pipeline.add_mutator(QualityTrimmer::new(10.0, TrimMode::Both, 33)?);
    pipeline.add_mutator(AdapterTrimmer::new([ADAPTER])?);
    let stats = pipeline.run()?;
    assert_eq!(stats.total_reads, stats.passed_reads + stats.filtered_reads);
    Ok(stats.passed_reads)
}

#[test]
fn test_thread_count_does_not_change_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reads.fastq");
    std::fs::write(&input, random_fastq(3000, 11))?;

    let reference = dir.path().join("single.fastq");
    let passed = filter_file(&input, &reference, 1)?;
    assert!(passed > 0);
    let expected = std::fs::read(&reference)?;

    for (threads, name) in [(2, "two.fastq"), (4, "four.fastq.gz"), (8, "eight.fastq.zst")] {
        let output = dir.path().join(name);
        assert_eq!(filter_file(&input, &output, threads)?, passed);
        let records = read_all(&output)?;
        assert_eq!(records.len() as u64, passed);

        let mut text = Vec::new();
        for record in &records {
            text.push(b'@');
            text.extend_from_slice(record.id());
            if !record.comment().is_empty() {
                text.push(b' ');
                text.extend_from_slice(record.comment());
            }
            text.push(b'\n');
            text.extend_from_slice(record.seq());
            text.extend_from_slice(b"\n+\n");
            text.extend_from_slice(record.qual());
            text.push(b'\n');
        }
        assert_eq!(text, expected, "output of {threads} threads differs");
    }
    Ok(())
}

#[test]
fn test_filtered_output_honours_chain() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reads.fastq");
    let output = dir.path().join("out.fastq");
    std::fs::write(&input, random_fastq(500, 5))?;

    let mut pipeline = ProcessingPipeline::new(&input, &output, ProcessingConfig::default());
    pipeline.add_predicate(MinLengthPredicate::new(40));
    pipeline.add_mutator(AdapterTrimmer::new([ADAPTER])?);
    pipeline.run()?;

    let adapter = ADAPTER.as_bytes();
    for record in read_all(&output)? {
        assert!(!record.is_empty());
        assert!(!record.seq().windows(adapter.len()).any(|w| w == adapter));
        assert_eq!(record.seq().len(), record.qual().len());
    }
    Ok(())
}

#[test]
fn test_gzip_input_statistics_report() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reads.fq.gz");
    let report = dir.path().join("reads.stat");

    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"@a\nAAAAA\n+\nIIIII\n@b\nACGTN\n+\n!!#$!\n")?;
    std::fs::write(&input, encoder.finish()?)?;

    let options = StatisticOptions::new(&input, &report)
        .with_config(ProcessingConfig::builder().thread_count(2).build()?);
    let result = StatisticCalculator::new(options).run()?;
    assert_eq!(result.read_count, 2);
    assert_eq!(result.total_bases, 10);
    assert_eq!(result.max_read_length, 5);
    assert_eq!(result.base_row(0).map(|row| row[0]), Some(2));

    let text = std::fs::read_to_string(&report)?;
    assert!(text.contains("#ReadNum\t2\n"));
    assert!(text.contains("#Pos\tA\tC\tG\tT\tN\tAvgQual\tErrRate\n"));
    assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 5);
    Ok(())
}

#[test]
fn test_cli_filter_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("reads.fastq");
    let output = dir.path().join("out.fastq");
    std::fs::write(&input, b"@r1\nACGTACGT\n+\n!!!!IIII\n@r2\nACGT\n+\n!!!!\n")?;

    let args: Vec<OsString> = vec![
        "fqtools".into(),
        "filter".into(),
        "-i".into(),
        input.clone().into_os_string(),
        "-o".into(),
        output.clone().into_os_string(),
        "--trim-quality".into(),
        "20".into(),
        "-t".into(),
        "2".into(),
    ];
    let cli = Cli::try_parse_from(args).expect("valid arguments");
    let Commands::Filter(cmd) = &cli.command else {
        panic!("expected filter");
    };
    let stats = cmd.try_execute()?;
    assert_eq!(stats.total_reads, 2);
    assert_eq!(stats.passed_reads, 1);
    assert_eq!(stats.modified_reads, 1);
    assert_eq!(std::fs::read(&output)?, b"@r1\nACGT\n+\nIIII\n");
    Ok(())
}
