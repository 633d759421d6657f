// src/exec/mod.rs

//! Command execution layer.
//!
//! This module owns the full lifecycle of externally spawned commands:
//!
//! - [`manager`] exposes the public [`CommandManager`] API (execute, kill,
//!   query, subscribe) and holds the active-command map, the bounded
//!   result cache and the durable store behind it.
//! - [`runner`] supervises one process: spawn, stream output, race the
//!   exit against the timeout and the manual kill signal.
//! - [`encoding`] normalises raw output chunks to UTF-8.

pub mod encoding;
pub mod manager;
pub mod runner;

pub use manager::CommandManager;
