//! Foundation module - Core utilities and types
//!
//! This module provides the fundamental building blocks the render core is
//! built on:
//! - Identifier allocation with id recycling
//! - Named objects and shared ownership handles
//! - Math types and operations
//! - Logging initialization

pub mod ids;
pub mod object;
pub mod math;
pub mod logging;
