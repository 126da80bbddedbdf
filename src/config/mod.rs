//! # ndstore Configuration Module
//!
//! This module centralizes the layout constants of the record heap. Runtime
//! options (file path, growth limit, log capacity) are set through
//! [`crate::nd::NdBuilder`]; everything here is fixed at compile time because
//! it is part of the persisted format or sizes the reserved header chunk.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
