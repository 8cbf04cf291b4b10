//! Signal ingestion module
//!
//! Canonical signal types plus the front half of the decision pipeline:
//! normalization, ordered validation, duplicate suppression, and
//! cross-source confluence scoring.

mod confluence;
mod dedup;
mod normalizer;
mod types;
mod validator;

pub use confluence::{ConfluenceCalculator, ConfluenceCategory, ConfluenceResult};
pub use dedup::DeduplicationCache;
pub use normalizer::{NormalizeError, RawMetadata, RawSignalPayload, RawTimestamp, SignalNormalizer};
pub use types::{Direction, Signal, SignalMetadata, SignalSource};
pub use validator::{SignalValidator, ValidationChecks, ValidationResult};
