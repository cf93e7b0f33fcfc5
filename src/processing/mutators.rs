use std::sync::atomic::{AtomicU64, Ordering};

use auto_impl::auto_impl;

use super::validate_quality_offset;
use crate::error::ValidationError;
use crate::{FastqRecord, RecordMut, Result};

/// Minimum suffix/prefix overlap for a partial adapter match
pub const DEFAULT_ADAPTER_MIN_OVERLAP: usize = 3;

/// Mismatches tolerated in a partial adapter match
pub const DEFAULT_ADAPTER_MAX_MISMATCHES: usize = 1;

/// A transformation applied to records that passed every predicate
///
/// Mutators can only shrink a record. A record trimmed to zero bases is dropped
/// from its batch.
#[auto_impl(&, Box, Arc)]
pub trait ReadMutator: Send + Sync {
    /// Trims the record in place, returning `true` if it changed
    fn mutate(&self, record: &mut RecordMut<'_>) -> bool;

    /// Short, stable name used in log output
    fn name(&self) -> &'static str;

    /// One-line human readable description of the configured transformation
    fn description(&self) -> String;

    /// Trimming counters
    fn counters(&self) -> &MutatorCounters;
}

/// Thread-safe tally of mutator activity
#[derive(Debug, Default)]
pub struct MutatorCounters {
    processed: AtomicU64,
    trimmed: AtomicU64,
    bases_removed: AtomicU64,
}
impl MutatorCounters {
    fn processed_one(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn trimmed_one(&self, removed: usize) {
        self.trimmed.fetch_add(1, Ordering::Relaxed);
        self.bases_removed
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Records seen by the mutator
    #[must_use]
    pub fn records_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Records that lost at least one base
    #[must_use]
    pub fn records_trimmed(&self) -> u64 {
        self.trimmed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn bases_removed(&self) -> u64 {
        self.bases_removed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.trimmed.store(0, Ordering::Relaxed);
        self.bases_removed.store(0, Ordering::Relaxed);
    }
}

/// Which ends a [`QualityTrimmer`] scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMode {
    #[default]
    Both,
    FivePrime,
    ThreePrime,
}
impl TrimMode {
    fn five_prime(self) -> bool {
        matches!(self, Self::Both | Self::FivePrime)
    }

    fn three_prime(self) -> bool {
        matches!(self, Self::Both | Self::ThreePrime)
    }
}

/// Trims low quality bases from the ends of a record
///
/// From each configured end, bases are removed up to the first base whose Phred
/// score reaches `threshold`. If fewer than `min_length` bases remain the record is
/// emptied (and thereby filtered).
#[derive(Debug)]
pub struct QualityTrimmer {
    threshold: f64,
    mode: TrimMode,
    min_length: usize,
    offset: u8,
    counters: MutatorCounters,
}
impl QualityTrimmer {
    /// # Errors
    ///
    /// Fails if `offset` is not 33 or 64, or if `threshold` is negative or not finite.
    pub fn new(threshold: f64, mode: TrimMode, offset: u8) -> Result<Self> {
        let offset = validate_quality_offset(offset)?;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ValidationError::InvalidQualityThreshold(threshold).into());
        }
        Ok(Self {
            threshold,
            mode,
            min_length: 1,
            offset,
            counters: MutatorCounters::default(),
        })
    }

    /// Sets the shortest length a trimmed record may keep (default 1)
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    #[must_use]
    pub fn mode(&self) -> TrimMode {
        self.mode
    }

    fn is_high_quality(&self, q: u8) -> bool {
        f64::from(i16::from(q) - i16::from(self.offset)) >= self.threshold
    }

    /// Returns the `[start, end)` window that survives trimming
    fn window(&self, qual: &[u8]) -> (usize, usize) {
        let len = qual.len();
        let start = if self.mode.five_prime() {
            qual.iter()
                .position(|&q| self.is_high_quality(q))
                .unwrap_or(len)
        } else {
            0
        };
        let end = if self.mode.three_prime() && start < len {
            qual[start..]
                .iter()
                .rposition(|&q| self.is_high_quality(q))
                .map_or(start, |pos| start + pos + 1)
        } else {
            len
        };
        (start, end.max(start))
    }
}
impl ReadMutator for QualityTrimmer {
    fn mutate(&self, record: &mut RecordMut<'_>) -> bool {
        self.counters.processed_one();
        if record.is_empty() {
            return false;
        }
        let len = record.len();
        let (start, end) = self.window(record.qual());
        let new_len = end - start;

        if new_len < self.min_length {
            record.clear();
            self.counters.trimmed_one(len);
            true
        } else if new_len < len {
            record.trim(start, end);
            self.counters.trimmed_one(len - new_len);
            true
        } else {
            false
        }
    }

    fn name(&self) -> &'static str {
        "QualityTrimmer"
    }

    fn description(&self) -> String {
        format!("Trims bases with quality < {:.2}", self.threshold)
    }

    fn counters(&self) -> &MutatorCounters {
        &self.counters
    }
}

/// Which bases a [`LengthTrimmer`] keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthTrimPolicy {
    /// Keep the first `length` bases (drop the 3' tail)
    #[default]
    KeepFromStart,
    /// Keep the last `length` bases (drop the 5' head)
    KeepFromEnd,
}

/// Shortens records longer than a fixed length
#[derive(Debug)]
pub struct LengthTrimmer {
    length: usize,
    policy: LengthTrimPolicy,
    counters: MutatorCounters,
}
impl LengthTrimmer {
    /// # Errors
    ///
    /// Fails if `length` is zero.
    pub fn new(length: usize, policy: LengthTrimPolicy) -> Result<Self> {
        if length == 0 {
            return Err(ValidationError::ZeroTrimLength.into());
        }
        Ok(Self {
            length,
            policy,
            counters: MutatorCounters::default(),
        })
    }

    #[must_use]
    pub fn policy(&self) -> LengthTrimPolicy {
        self.policy
    }
}
impl ReadMutator for LengthTrimmer {
    fn mutate(&self, record: &mut RecordMut<'_>) -> bool {
        self.counters.processed_one();
        let len = record.len();
        if len <= self.length {
            return false;
        }
        match self.policy {
            LengthTrimPolicy::KeepFromStart => record.truncate(self.length),
            LengthTrimPolicy::KeepFromEnd => record.trim_front(len - self.length),
        }
        self.counters.trimmed_one(len - self.length);
        true
    }

    fn name(&self) -> &'static str {
        "LengthTrimmer"
    }

    fn description(&self) -> String {
        format!("Trims reads to length {}", self.length)
    }

    fn counters(&self) -> &MutatorCounters {
        &self.counters
    }
}

/// Removes 3' adapter read-through
///
/// Each adapter is located either as an exact substring of the read or as a partial
/// match where a suffix of the read equals a prefix of the adapter of at least
/// `min_overlap` bases with at most `max_mismatches` differences. The read is cut at
/// the earliest position found across all adapters.
#[derive(Debug)]
pub struct AdapterTrimmer {
    adapters: Vec<Vec<u8>>,
    min_overlap: usize,
    max_mismatches: usize,
    counters: MutatorCounters,
}
impl AdapterTrimmer {
    /// Creates a trimmer with the default overlap and mismatch tolerance
    ///
    /// # Errors
    ///
    /// Fails if no adapters are given or any adapter is empty.
    pub fn new<I, A>(adapters: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        Self::with_params(
            adapters,
            DEFAULT_ADAPTER_MIN_OVERLAP,
            DEFAULT_ADAPTER_MAX_MISMATCHES,
        )
    }

    /// Creates a trimmer with explicit overlap and mismatch tolerance
    ///
    /// # Errors
    ///
    /// Fails if no adapters are given, any adapter is empty, or `min_overlap` is zero.
    pub fn with_params<I, A>(adapters: I, min_overlap: usize, max_mismatches: usize) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let adapters: Vec<Vec<u8>> = adapters
            .into_iter()
            .map(|a| a.as_ref().to_vec())
            .collect();
        if adapters.is_empty() || adapters.iter().any(Vec::is_empty) {
            return Err(ValidationError::EmptyAdapter.into());
        }
        if min_overlap == 0 {
            return Err(ValidationError::ZeroAdapterOverlap.into());
        }
        Ok(Self {
            adapters,
            min_overlap,
            max_mismatches,
            counters: MutatorCounters::default(),
        })
    }

    #[must_use]
    pub fn adapters(&self) -> &[Vec<u8>] {
        &self.adapters
    }

    /// Position where `adapter` begins in `seq`, if anywhere
    fn find(&self, seq: &[u8], adapter: &[u8]) -> Option<usize> {
        if let Some(pos) = memchr::memmem::find(seq, adapter) {
            return Some(pos);
        }
        if seq.len() < self.min_overlap {
            return None;
        }
        let first = seq.len().saturating_sub(adapter.len());
        (first..=seq.len() - self.min_overlap).find(|&i| {
            let overlap = seq.len() - i;
            self.mismatches(&seq[i..], &adapter[..overlap]) <= self.max_mismatches
        })
    }

    /// Counts differing bytes, stopping once the tolerance is exceeded
    fn mismatches(&self, a: &[u8], b: &[u8]) -> usize {
        a.iter()
            .zip(b)
            .filter(|(x, y)| x != y)
            .take(self.max_mismatches + 1)
            .count()
    }
}
impl ReadMutator for AdapterTrimmer {
    fn mutate(&self, record: &mut RecordMut<'_>) -> bool {
        self.counters.processed_one();
        if record.is_empty() {
            return false;
        }
        let len = record.len();
        let cut = self
            .adapters
            .iter()
            .filter_map(|adapter| self.find(record.seq(), adapter))
            .min();
        match cut {
            Some(pos) => {
                record.truncate(pos);
                self.counters.trimmed_one(len - pos);
                true
            }
            None => false,
        }
    }

    fn name(&self) -> &'static str {
        "AdapterTrimmer"
    }

    fn description(&self) -> String {
        format!("Trims {} adapter sequence(s)", self.adapters.len())
    }

    fn counters(&self) -> &MutatorCounters {
        &self.counters
    }
}
