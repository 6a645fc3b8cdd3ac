//! Test infrastructure for the HL7 v2 codec
//!
//! Provides fixture loading, seeded message and chunk generation, and a
//! fixture harness.

#![allow(dead_code)]

mod generators;
mod harness;
mod loader;

pub use generators::Gen;
pub use harness::{run_case, run_with_variations, CaseResult};
pub use loader::{load_fixtures_by_name, Expect, TestCase};
