//! Synthesis provider unit tests
//!
//! Uses wiremock for HTTP mocking to test:
//! - Request formatting and authentication headers
//! - Response parsing
//! - Mapping of provider failures onto error kinds
