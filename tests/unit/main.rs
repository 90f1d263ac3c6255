//! Unit tests for the strato CLI.
//!
//! These tests use mocked ports and run fast without external I/O.

mod helpers;
mod mocks;
mod orchestrator;
mod property_tests;
