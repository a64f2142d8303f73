//! Pluggable authorization and validation capabilities
//!
//! Every swapper is one registry composed with exactly one
//! [`AuthorizationPolicy`] and one [`ValidationGate`].

pub mod authorization;
pub mod validation;

pub use authorization::AuthorizationPolicy;
pub use validation::{
    Bridge, BridgeAttestation, DigestAllowlistVerifier, ValidationGate, Verifier, VerifierError,
};

#[cfg(test)]
pub use validation::{MockBridge, MockVerifier};
