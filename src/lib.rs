//! promptsync - keep one canonical AI-assistant prompt in sync with the
//! native rule files of many editors and tools
//!
//! The canonical document ([`domain::CanonicalDocument`]) is rendered into
//! native files by format adapters ([`adapter`]), and edited native files are
//! parsed back and merged into it without losing variable references,
//! metadata or plugin declarations. [`engine::Engine`] exposes the
//! operations; [`storage`] and [`cli`] wrap them into a command-line tool.

pub mod adapter;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod storage;

pub use domain::{CanonicalDocument, SchemaVersion};
pub use engine::{Engine, EngineError};
