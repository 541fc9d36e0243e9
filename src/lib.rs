//! adpilot: ad campaign dashboard backend.
//!
//! Connects an ads platform account through OAuth, caches campaigns,
//! pauses low-ROAS campaigns on a schedule and serves the dashboard actions.

pub mod ads;
pub mod config;
pub mod creative;
pub mod credentials;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod llm;
pub mod optimizer;
pub mod store;
pub mod sync;
pub mod vault;
pub mod web;

pub use error::{Error, Result};
