//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: manifest files on disk, scripted
//! clients for the scheduler, and helpers for tests that need real VCS executables.

#![allow(dead_code)]

pub mod mock_services;
pub mod test_fixtures;
