//! CLI integration tests for tpb.

#![cfg(unix)]

mod bundle_tests;
