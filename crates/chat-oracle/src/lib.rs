//! # chat-oracle
//!
//! Test harness for broadcast delivery.
//!
//! A test arms [`MessageOracle::expect`] with the `(recipient, message)` pairs
//! it expects, in any order, and feeds every delivery it sees to
//! [`MessageOracle::observe`]. The expectation resolves `Ok` once all pairs
//! arrived, fails fast on a delivery nobody expected, and times out when no
//! expected delivery arrives within the rolling window.

#![deny(unsafe_code)]

pub mod canonical;
pub mod error;
pub mod oracle;

pub use canonical::Delivery;
pub use error::OracleError;
pub use oracle::MessageOracle;
