//! Integration tests for `LookupSession` against a real directory tree.

mod common;
mod incremental_tests;
mod lookup_tests;
