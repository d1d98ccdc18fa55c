//! Data types used across storage operations.
//!
//! This module defines the blob service data structures, continuation tokens,
//! and shared HTTP date helpers.

mod blob;
mod common;
mod continuation;

pub use blob::*;
pub use common::*;
pub use continuation::*;
