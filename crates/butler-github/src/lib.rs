//! `butler-github` — the code-hosting collaborator.
//!
//! [`CodeHost`] is the seam the action workflow executes against; the
//! [`GithubClient`] implementation talks to the GitHub REST API via reqwest
//! with an explicit per-call timeout. Timeouts surface as a distinct error
//! so the user sees "try again" rather than a generic API failure.

pub mod client;
pub mod error;
pub mod oauth;
pub mod types;

pub use client::{CodeHost, GithubClient};
pub use error::{GithubError, Result};
pub use oauth::{GithubOauth, TokenExchanger};
pub use types::{FileContent, ReviewVerdict};
