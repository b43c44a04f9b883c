//! Property-based tests
//!
//! Invariants checked with proptest over generated inputs:
//!
//! - `chunking_props`: chunk plans
//!   - Reassembling chunks and separators reproduces the input exactly
//!   - No chunk is empty, exceeds the limit, or has edge whitespace
//!   - Text within the limit yields a single chunk
//!
//! - `capacity_props`: eviction planning
//!   - Unmanaged voices are never selected
//!   - A successful plan always makes room for the requested slots
//!   - Evicted voices are the oldest managed ones
//!
//! Case count follows `PROPTEST_CASES` (default 256).

mod capacity_props;
mod chunking_props;
