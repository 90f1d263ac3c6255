//! Integration tests driving the real `strato` binary.

mod cli_tests;
