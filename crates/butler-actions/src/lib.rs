//! `butler-actions` — the pending-action confirmation workflow.
//!
//! A detected high-risk intent never executes directly. It becomes a
//! durable, expiring proposal in the `pending_actions` table; the user sees
//! a preview with confirm/cancel buttons; only an explicit confirm — after
//! ownership and expiry checks and a single-winner claim — reaches GitHub.
//!
//! # Lifecycle
//!
//! ```text
//! intent --propose--> PROPOSED (row + preview + buttons)
//! PROPOSED --confirm (owner, unexpired, claim won)--> execute --> row gone
//! PROPOSED --cancel--> row gone
//! PROPOSED --expiry (confirm-time check or sweep)--> row gone, never executed
//! ```
//!
//! Execution is at-most-once: the claim deletes the row before the external
//! call, so a failed call leaves nothing confirmable behind and the user
//! simply re-issues the request.

pub mod db;
pub mod diff;
pub mod editor;
pub mod error;
pub mod store;
pub mod types;
pub mod workflow;

pub use editor::{CodeEditor, FileEdit};
pub use error::{ActionError, Result};
pub use store::PendingActionStore;
pub use types::{ActionIntent, ActionPayload, GithubAction, PendingAction, Proposal};
pub use workflow::ActionWorkflow;
