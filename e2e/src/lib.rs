//! Ephemeral test-environment provisioning for agent end-to-end tests.
//!
//! `domain` holds pure types, `application` the ports and services built on
//! them, `infra` the adapters for ssh, the Pulumi CLI and config loading.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod domain;
pub mod infra;
pub mod telemetry;
