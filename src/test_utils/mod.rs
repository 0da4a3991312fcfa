//! Fixtures shared by the unit tests
mod fixtures;

pub use fixtures::*;
