//! Test infrastructure for the permission engine.
//!
//! Fixtures build small hierarchies and write them through any
//! [`HierarchyWriter`], so the same scenario runs against every backend.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
