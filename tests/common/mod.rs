#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Default fixed seed so property tests are reproducible in CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x7E7431;

const PROPTEST_SEED_ENV: &str = "TETHER_PROPTEST_SEED";

/// Initialize tracing output for a test binary.
///
/// Safe to call from every test; only the first call initializes.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Build a ProptestConfig with a deterministic seed unless the caller set
/// one through the environment.
pub fn proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        let seed = std::env::var(PROPTEST_SEED_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_PROPTEST_SEED);
        config.rng_seed = RngSeed::Fixed(seed);
    }
    config
}
