//! Crate-level test suites
//!
//! - `mocks`: scripted fakes and mockall doubles shared by every suite
//! - `unit`: component tests against fakes and wiremock servers
//! - `property`: proptest invariants

pub(crate) mod mocks;
mod property;
mod unit;
