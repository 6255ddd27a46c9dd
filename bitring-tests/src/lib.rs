//! Bitring Tests - Deterministic Simulation Testing for the window ring.
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Deterministic simulation against a model
//! - `ring_dst`: Seeded consumer workloads replayed against `WindowRing`
//!   and a `RoaringTreemap` reference model
//!
//! **Support Modules**:
//! - `properties`: Reference model, `PropertyChecker` and `Violation`
//! - `scenarios`: Seeded workload generation and regression seeds
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Unit tests: Inline in each crate under `#[cfg(test)]`
//!
//! Set `RUST_LOG=bitring=trace` to see every ignored completion and resize.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;

// DST test modules (deterministic simulation against a model).
#[cfg(test)]
mod ring_dst;

/// Installs a test-writer tracing subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
