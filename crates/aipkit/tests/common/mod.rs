//! Shared test utilities for aipkit integration tests.
//!
//! - `TestHarness` builds an isolated batch directory and runs it
//! - `FakeRunner` stands in for the external tools

pub mod fake_runner;
pub mod harness;

pub use fake_runner::FakeRunner;
pub use harness::{list, row, TestHarness};
