//! Task hierarchy store with cascade deletion.
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod hierarchy;
pub mod logging;
pub mod store;
pub mod types;
