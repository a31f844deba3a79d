//! # ggshield-api
//!
//! Typed client surface for the GitGuardian scanning API.
//!
//! ## What belongs here
//! * Request/response models (`Document`, `ScanResult`, `PolicyBreak`, ...)
//! * The blocking HTTP client and its error mapping
//! * Server-declared scan preferences and version metadata
//!
//! ## What does NOT belong here
//! * Verdict classification (see `ggshield-secret`)
//! * Anything that shells out to git (see `ggshield-git`)

mod client;
mod error;
pub mod models;

pub use client::{ClientConfig, GGClient, DEFAULT_API_URL};
pub use error::ApiError;
