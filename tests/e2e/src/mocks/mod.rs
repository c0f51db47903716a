//! Mocks and fixtures

pub mod fixtures;
