use std::sync::atomic::{AtomicU64, Ordering};

use auto_impl::auto_impl;

use super::validate_quality_offset;
use crate::error::ValidationError;
use crate::{FastqRecord, Result};

/// A pass/fail test applied to each record
///
/// Predicates are shared across worker threads, so `evaluate` takes `&self`.
/// Any bookkeeping must go through atomics (see [`PredicateCounters`]).
#[auto_impl(&, Box, Arc)]
pub trait ReadPredicate: Send + Sync {
    /// Returns `true` if the record should be kept
    fn evaluate(&self, record: &dyn FastqRecord) -> bool;

    /// Short, stable name used in log output
    fn name(&self) -> &'static str;

    /// One-line human readable description of the configured test
    fn description(&self) -> String;

    /// Evaluation counters
    fn counters(&self) -> &PredicateCounters;
}

/// Thread-safe tally of predicate outcomes
#[derive(Debug, Default)]
pub struct PredicateCounters {
    evaluated: AtomicU64,
    passed: AtomicU64,
}
impl PredicateCounters {
    /// Records one outcome and passes it through
    fn tally(&self, passed: bool) -> bool {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.passed.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    #[must_use]
    pub fn evaluated(&self) -> u64 {
        self.evaluated.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn passed(&self) -> u64 {
        self.passed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.evaluated.store(0, Ordering::Relaxed);
        self.passed.store(0, Ordering::Relaxed);
    }
}

/// Keeps records whose mean Phred score is at least `threshold`
///
/// Records without quality values always fail.
#[derive(Debug)]
pub struct MinQualityPredicate {
    threshold: f64,
    offset: u8,
    counters: PredicateCounters,
}
impl MinQualityPredicate {
    /// # Errors
    ///
    /// Fails if `offset` is not 33 or 64, or if `threshold` is negative or not finite.
    pub fn new(threshold: f64, offset: u8) -> Result<Self> {
        let offset = validate_quality_offset(offset)?;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ValidationError::InvalidQualityThreshold(threshold).into());
        }
        Ok(Self {
            threshold,
            offset,
            counters: PredicateCounters::default(),
        })
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
impl ReadPredicate for MinQualityPredicate {
    fn evaluate(&self, record: &dyn FastqRecord) -> bool {
        let passed = record
            .mean_quality(self.offset)
            .is_some_and(|mean| mean >= self.threshold);
        self.counters.tally(passed)
    }

    fn name(&self) -> &'static str {
        "MinQuality"
    }

    fn description(&self) -> String {
        format!("Filters reads with average quality < {:.2}", self.threshold)
    }

    fn counters(&self) -> &PredicateCounters {
        &self.counters
    }
}

/// Keeps records with at least `min_length` bases
#[derive(Debug)]
pub struct MinLengthPredicate {
    min_length: usize,
    counters: PredicateCounters,
}
impl MinLengthPredicate {
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            counters: PredicateCounters::default(),
        }
    }
}
impl ReadPredicate for MinLengthPredicate {
    fn evaluate(&self, record: &dyn FastqRecord) -> bool {
        self.counters.tally(record.len() >= self.min_length)
    }

    fn name(&self) -> &'static str {
        "MinLength"
    }

    fn description(&self) -> String {
        format!("Filters reads shorter than {} bp", self.min_length)
    }

    fn counters(&self) -> &PredicateCounters {
        &self.counters
    }
}

/// Keeps records with at most `max_length` bases
#[derive(Debug)]
pub struct MaxLengthPredicate {
    max_length: usize,
    counters: PredicateCounters,
}
impl MaxLengthPredicate {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            counters: PredicateCounters::default(),
        }
    }
}
impl ReadPredicate for MaxLengthPredicate {
    fn evaluate(&self, record: &dyn FastqRecord) -> bool {
        self.counters.tally(record.len() <= self.max_length)
    }

    fn name(&self) -> &'static str {
        "MaxLength"
    }

    fn description(&self) -> String {
        format!("Filters reads longer than {} bp", self.max_length)
    }

    fn counters(&self) -> &PredicateCounters {
        &self.counters
    }
}

/// Keeps records whose fraction of `N`/`n` bases is at most `max_ratio`
///
/// An empty sequence has a ratio of zero.
#[derive(Debug)]
pub struct MaxNRatioPredicate {
    max_ratio: f64,
    counters: PredicateCounters,
}
impl MaxNRatioPredicate {
    /// # Errors
    ///
    /// Fails if `max_ratio` lies outside `[0, 1]`.
    pub fn new(max_ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&max_ratio) {
            return Err(ValidationError::InvalidNRatio(max_ratio).into());
        }
        Ok(Self {
            max_ratio,
            counters: PredicateCounters::default(),
        })
    }
}
impl ReadPredicate for MaxNRatioPredicate {
    fn evaluate(&self, record: &dyn FastqRecord) -> bool {
        let ratio = if record.is_empty() {
            0.0
        } else {
            record.n_count() as f64 / record.len() as f64
        };
        self.counters.tally(ratio <= self.max_ratio)
    }

    fn name(&self) -> &'static str {
        "MaxNRatio"
    }

    fn description(&self) -> String {
        format!("Filters reads with N ratio > {:.2}", self.max_ratio)
    }

    fn counters(&self) -> &PredicateCounters {
        &self.counters
    }
}
