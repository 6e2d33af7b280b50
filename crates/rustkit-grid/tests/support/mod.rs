//! Test support utilities for grid integration tests
//!
//! - TestChildren: closure-driven children host
//! - Assertions: tolerance and track-size assertions

#![allow(dead_code)]

mod assertions;
mod host;

pub use assertions::*;
pub use host::{Content, TestChildren};

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
