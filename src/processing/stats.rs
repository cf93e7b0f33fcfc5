use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;

/// Counters describing one filtering run
///
/// Per-batch values are produced by the workers and summed in the drain stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStatistics {
    /// Records read from the input
    pub total_reads: u64,
    /// Records written to the output
    pub passed_reads: u64,
    /// Records rejected by a predicate or trimmed to nothing
    pub filtered_reads: u64,
    /// Written records that a mutator changed
    pub modified_reads: u64,
    /// Records that could not be processed
    pub error_reads: u64,
    /// Decoded input bytes
    pub input_bytes: u64,
    /// Uncompressed output bytes
    pub output_bytes: u64,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}
impl ProcessingStatistics {
    /// Fraction of records that passed, in `[0, 1]`
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        ratio(self.passed_reads, self.total_reads)
    }

    /// Fraction of records that were filtered, in `[0, 1]`
    #[must_use]
    pub fn filter_rate(&self) -> f64 {
        ratio(self.filtered_reads, self.total_reads)
    }

    /// Output MiB per second of elapsed time (0 when no time has elapsed)
    #[must_use]
    pub fn throughput_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.output_bytes as f64 / 1024.0 / 1024.0 / secs
        } else {
            0.0
        }
    }

    /// Adds the counters of `other` into `self`
    pub fn merge(&mut self, other: &Self) {
        self.total_reads += other.total_reads;
        self.passed_reads += other.passed_reads;
        self.filtered_reads += other.filtered_reads;
        self.modified_reads += other.modified_reads;
        self.error_reads += other.error_reads;
        self.input_bytes += other.input_bytes;
        self.output_bytes += other.output_bytes;
        self.elapsed += other.elapsed;
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl AddAssign for ProcessingStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

impl fmt::Display for ProcessingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processing statistics:")?;
        writeln!(f, "  Total reads:    {}", self.total_reads)?;
        writeln!(
            f,
            "  Passed reads:   {} ({:.2}%)",
            self.passed_reads,
            self.pass_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Filtered reads: {} ({:.2}%)",
            self.filtered_reads,
            self.filter_rate() * 100.0
        )?;
        writeln!(f, "  Modified reads: {}", self.modified_reads)?;
        writeln!(f, "  Error reads:    {}", self.error_reads)?;
        writeln!(
            f,
            "  Elapsed:        {:.2} ms",
            self.elapsed.as_secs_f64() * 1000.0
        )?;
        write!(f, "  Throughput:     {:.2} MB/s", self.throughput_mbps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_and_merge() {
        let mut a = ProcessingStatistics {
            total_reads: 10,
            passed_reads: 7,
            filtered_reads: 3,
            modified_reads: 2,
            output_bytes: 1024 * 1024,
            elapsed: Duration::from_millis(500),
            ..Default::default()
        };
        let b = ProcessingStatistics {
            total_reads: 10,
            passed_reads: 1,
            filtered_reads: 9,
            output_bytes: 1024 * 1024,
            elapsed: Duration::from_millis(500),
            ..Default::default()
        };
        assert!((a.pass_rate() - 0.7).abs() < 1e-12);
        a += b;
        assert_eq!(a.total_reads, 20);
        assert_eq!(a.passed_reads, 8);
        assert!((a.filter_rate() - 0.6).abs() < 1e-12);
        assert!((a.throughput_mbps() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run() {
        let stats = ProcessingStatistics::default();
        assert!(stats.pass_rate().abs() < f64::EPSILON);
        assert!(stats.throughput_mbps().abs() < f64::EPSILON);
        let text = stats.to_string();
        assert!(text.contains("Total reads:    0"));
        assert!(text.contains("(0.00%)"));
    }
}
