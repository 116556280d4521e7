//! Cryptographic primitives
//!
//! - [`curve`]: secp256k1 arithmetic and ECDSA verification
//! - [`verifier`]: verifier traits and the rotatable key registry
//! - [`signer`]: local signing (behind the `signer` feature)

pub mod curve;
#[cfg(feature = "signer")]
pub mod signer;
pub mod verifier;

#[cfg(feature = "signer")]
pub use signer::LocalSigner;
pub use verifier::{Secp256k1Verifier, SignatureAuthority, SignatureVerifier, VerifierContext};
