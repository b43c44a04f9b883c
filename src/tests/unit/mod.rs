//! Unit tests for the voice clone pipeline components
//!
//! Provider tests talk to a wiremock server; everything else runs against
//! the scripted fakes in [`crate::tests::mocks`].

mod capacity_tests;
mod executor_tests;
mod notify_tests;
mod providers;
