//! Tests for the model module.
//!
//! These tests cover the complete build and run workflow: ordering, binding
//! validation, lagged reads, per-component grids and failure handling.

#[cfg(test)]
mod basic;
#[cfg(test)]
mod failure;
