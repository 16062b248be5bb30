//! Crosslink Core Library
//!
//! This crate provides the core functionality for Crosslink, including:
//! - Linking pipeline (candidate generation, relevance scoring, selection)
//! - Storage (SQLite corpus store, link edges, derived metrics)
//! - Repository traits for the content store and authority-source catalog
//! - Configuration and error handling

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::linking::{JobScope, LinkKind, LinkingService, MatchType, RunSummary};
    pub use crate::error::{Error, Result};
}
