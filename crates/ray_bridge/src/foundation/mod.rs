//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the bridge:
//! - Math types and operations
//! - Handle collections
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
