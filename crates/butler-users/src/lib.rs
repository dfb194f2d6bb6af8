//! `butler-users` — user profiles and sealed GitHub credentials.
//!
//! A user row is keyed by the chat-channel user id and carries the two
//! fields every other subsystem reads: the IANA timezone (authoritative for
//! all "is it time yet" checks) and the saved default repository.
//!
//! The GitHub access token is sealed with AES-256-GCM before it touches
//! SQLite and unsealed on demand. A missing token is the terminal
//! "not connected" condition, never something to retry.

pub mod db;
pub mod error;
pub mod seal;
pub mod store;
pub mod types;

pub use error::{Result, UserError};
pub use seal::TokenSeal;
pub use store::UserStore;
pub use types::User;
