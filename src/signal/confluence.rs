//! Confluence scoring
//!
//! Measures agreement across signal sources for one symbol on one
//! timeframe. Signals from other timeframes never influence the score.
//! Each source contributes at most one reading (its most recent) and is
//! weighted by its reliability.

use super::types::{Signal, SignalSource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Coarse confluence classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfluenceCategory {
    High,
    Medium,
    Low,
}

/// Result of a confluence calculation
#[derive(Debug, Clone)]
pub struct ConfluenceResult {
    /// Weighted agreement ratio, 0.0 to 1.0
    pub score: Decimal,
    /// Sources whose latest reading agrees with the evaluated signal
    pub agreeing: Vec<SignalSource>,
    /// Sources whose latest reading disagrees
    pub disagreeing: Vec<SignalSource>,
    /// Coarse classification of the score
    pub category: ConfluenceCategory,
}

/// Scores cross-source agreement for a symbol and timeframe
#[derive(Debug, Clone)]
pub struct ConfluenceCalculator {
    /// Scores at or above this are HIGH
    high_threshold: Decimal,
    /// Scores at or above this (but below high) are MEDIUM
    medium_threshold: Decimal,
}

impl ConfluenceCalculator {
    /// Create a calculator with the given category thresholds
    pub fn new(high_threshold: Decimal, medium_threshold: Decimal) -> Self {
        Self {
            high_threshold,
            medium_threshold,
        }
    }

    /// Score agreement for `signal` against `recent` signals
    ///
    /// Only entries sharing the signal's symbol and timeframe
    /// participate. A lone source is classified MEDIUM: with no second
    /// opinion there is nothing to agree or disagree with.
    pub fn calculate(&self, signal: &Signal, recent: &[Signal]) -> ConfluenceResult {
        // Latest reading per source, the evaluated signal included.
        let mut latest: HashMap<SignalSource, &Signal> = HashMap::new();
        for candidate in recent
            .iter()
            .chain(std::iter::once(signal))
            .filter(|s| s.symbol == signal.symbol && s.timeframe == signal.timeframe)
        {
            latest
                .entry(candidate.source)
                .and_modify(|current| {
                    if candidate.timestamp > current.timestamp {
                        *current = candidate;
                    }
                })
                .or_insert(candidate);
        }

        let mut agreeing = Vec::new();
        let mut disagreeing = Vec::new();
        let mut agreeing_weight = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;

        for (source, reading) in &latest {
            let weight = source.reliability_weight();
            total_weight += weight;
            if reading.direction == signal.direction {
                agreeing_weight += weight;
                agreeing.push(*source);
            } else {
                disagreeing.push(*source);
            }
        }

        let score = if total_weight > Decimal::ZERO {
            agreeing_weight / total_weight
        } else {
            Decimal::ZERO
        };

        let category = if latest.len() < 2 {
            ConfluenceCategory::Medium
        } else if score >= self.high_threshold {
            ConfluenceCategory::High
        } else if score >= self.medium_threshold {
            ConfluenceCategory::Medium
        } else {
            ConfluenceCategory::Low
        };

        ConfluenceResult {
            score,
            agreeing,
            disagreeing,
            category,
        }
    }
}

impl Default for ConfluenceCalculator {
    fn default() -> Self {
        Self::new(dec!(0.7), dec!(0.4))
    }
}
