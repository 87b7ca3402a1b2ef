//! Common Infrastructure Module
//!
//! Shared error types used across the StakeVault backend.

pub mod error;

// Re-exports for convenience
pub use error::{Result, StakeVaultError};
