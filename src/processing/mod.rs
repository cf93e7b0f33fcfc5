//! Per-record filtering and trimming
//!
//! A [`FilterChain`] holds an ordered list of [`ReadPredicate`]s and
//! [`ReadMutator`]s. Predicates decide whether a record survives; mutators trim
//! the survivors. A [`ProcessingPipeline`] drives the chain over a whole file.

mod chain;
mod mutators;
mod pipeline;
mod predicates;
mod stats;

pub use chain::FilterChain;
pub use mutators::{
    AdapterTrimmer, LengthTrimPolicy, LengthTrimmer, MutatorCounters, QualityTrimmer, ReadMutator,
    TrimMode, DEFAULT_ADAPTER_MAX_MISMATCHES, DEFAULT_ADAPTER_MIN_OVERLAP,
};
pub use pipeline::{PipelineState, ProcessingPipeline, ProcessingPipelineBuilder};
pub use predicates::{
    MaxLengthPredicate, MaxNRatioPredicate, MinLengthPredicate, MinQualityPredicate,
    PredicateCounters, ReadPredicate,
};
pub use stats::ProcessingStatistics;

use crate::error::ValidationError;
use crate::Result;

/// Sanger / Illumina 1.8+ quality offset
pub const DEFAULT_QUALITY_OFFSET: u8 = 33;

/// Illumina 1.3 to 1.7 quality offset
pub const LEGACY_QUALITY_OFFSET: u8 = 64;

/// Accepts only the two quality encodings in use
pub fn validate_quality_offset(offset: u8) -> Result<u8> {
    match offset {
        DEFAULT_QUALITY_OFFSET | LEGACY_QUALITY_OFFSET => Ok(offset),
        _ => Err(ValidationError::InvalidQualityOffset(offset).into()),
    }
}
