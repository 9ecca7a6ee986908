//! Fault-tolerant HTM temporal memory.
//!
//! The `core` module holds the sequence memory algorithm, split into its phases, plus a
//! fault mask that marks cells as dead so the robustness of learned sequences can be measured.

pub mod core;
