//! Shared fixtures for end-to-end tests

pub mod common;
