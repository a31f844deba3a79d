//! # ggshield-core
//!
//! Shared building blocks for the secret scanning pipeline.
//!
//! ## What belongs here
//! * The error taxonomy and its exit-code mapping
//! * Resolved configuration records (no file parsing)
//! * Scan context (mode, command id, telemetry headers)
//! * Line model and match-span arithmetic for patches and files
//! * Ignore-sha, censoring and ignored-match helpers
//!
//! ## What does NOT belong here
//! * Anything that talks to the network (see `ggshield-api`)
//! * Anything that shells out to git (see `ggshield-git`)

pub mod config;
pub mod env_utils;
mod errors;
pub mod filter;
pub mod lines;
pub mod match_span;
mod scan_context;
mod types;

pub use errors::{Error, ExitCode};
pub use scan_context::{ScanContext, ScanMode};
pub use types::Filemode;

/// The all-zero sha git uses to denote branch creation or deletion.
pub const EMPTY_SHA: &str = "0000000000000000000000000000000000000000";
