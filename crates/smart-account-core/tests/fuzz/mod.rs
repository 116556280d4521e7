//! Fuzz tests module
//!
//! Property-based testing using proptest to find edge cases:
//! - Command decoder robustness
//! - Signature verification against tampering
//! - Predicate evaluation

pub mod codec_fuzz;
