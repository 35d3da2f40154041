//! breachlog/crates/bl-repo/src/lib.rs
//!
//! The post repository and query layer: translates high-level
//! read/write operations into document-store operations against the
//! `bl-core` ports and back into typed results.

pub mod post;
pub mod query;
pub mod sanitize;
pub mod settings;

pub use post::PostRepository;
pub use settings::SettingsService;
