//! gexflow: options signal decision engine
//!
//! This library provides the core components for:
//! - Normalizing heterogeneous inbound trading signals
//! - Ordered validation with cooldowns and market-hours checks
//! - Fingerprint-based duplicate suppression
//! - TTL-cached market context with coalesced refresh
//! - Gamma exposure staleness, weighting, and flip detection
//! - Cross-source confluence scoring
//! - Layered confidence and position-size calculation
//! - Entry/exit decision orchestration
//! - Position bookkeeping with P&L
//! - Full observability stack

pub mod cli;
pub mod config;
pub mod engine;
pub mod market;
pub mod position;
pub mod risk;
pub mod signal;
pub mod telemetry;
