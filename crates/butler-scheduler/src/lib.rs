//! `butler-scheduler` — reminders, daily digests, and the delivery loop.
//!
//! A single polling engine owns all scheduled delivery: every tick it finds
//! due reminders (UTC instants) and due digests (an exact local "HH:MM"
//! match in the owner's timezone, deduplicated to one send per local day)
//! and pushes them through the outbound [`Messenger`]. Reminders are the one
//! retry path in the system: a failed send leaves the row due and the next
//! tick tries again.
//!
//! The tick cadence must stay finer than one minute or digest minutes can
//! be skipped entirely.
//!
//! [`Messenger`]: butler_channels::Messenger

pub mod db;
pub mod digest;
pub mod engine;
pub mod error;
pub mod reminders;
pub mod types;

pub use digest::{AutomationStore, DigestService};
pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use reminders::ReminderStore;
pub use types::{Automation, DigestConfig, Reminder, ReminderKind, DAILY_DIGEST};
