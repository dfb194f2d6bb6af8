//! `butler-core` — shared config, error type, and repository coordinates.
//!
//! Everything here is consumed by at least two other crates in the
//! workspace; subsystem-specific types live with their subsystem.

pub mod config;
pub mod error;
pub mod types;

pub use config::ButlerConfig;
pub use error::{ButlerError, Result};
pub use types::RepoRef;
