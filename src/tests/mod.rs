//! Cross-module scenario tests

mod validation_tests;
