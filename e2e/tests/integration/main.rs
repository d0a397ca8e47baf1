//! Integration tests for e2e-env
//!
//! These tests spawn the actual binary and test end-to-end behavior.
