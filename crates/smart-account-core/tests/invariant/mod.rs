//! Invariant tests module
//!
//! Critical guarantees that must always hold:
//! - Sequence monotonicity and single execution of signed operations
//! - Threshold enforcement
//! - Gateway replay protection

pub mod account_invariant;
