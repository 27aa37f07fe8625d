//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below exercises one behaviour area end to end: two channels
//! wired back to back through in-memory pipes on a single executor.

mod access_tests;
mod call_tests;
mod liveness_tests;
mod stream_tests;
mod support;
