//! Transport adapters.
//!
//! A transport adapter wraps another transport and the transfer handles it creates.

pub mod performance_metrics;
