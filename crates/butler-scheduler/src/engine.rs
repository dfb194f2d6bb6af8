//! The polling delivery loop.
//!
//! One tick does three independent passes: due reminders, due digests, and
//! the pending-action expiry sweep. Per-item failures are logged and
//! isolated; the loop itself only stops on shutdown.

use std::sync::Arc;

use butler_actions::PendingActionStore;
use butler_channels::{Button, Controls, Messenger};
use butler_users::UserStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::digest::AutomationStore;
use crate::reminders::ReminderStore;
use crate::types::{Automation, Reminder, ReminderKind, DAILY_DIGEST};

pub struct SchedulerEngine {
    reminders: ReminderStore,
    automations: AutomationStore,
    users: UserStore,
    pending: PendingActionStore,
    messenger: Arc<dyn Messenger>,
    tick_secs: u64,
}

impl SchedulerEngine {
    pub fn new(
        reminders: ReminderStore,
        automations: AutomationStore,
        users: UserStore,
        pending: PendingActionStore,
        messenger: Arc<dyn Messenger>,
        tick_secs: u64,
    ) -> Self {
        Self {
            reminders,
            automations,
            users,
            pending,
            messenger,
            tick_secs,
        }
    }

    /// Main loop. Ticks until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick_secs, "scheduler engine started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle. Never returns an error; everything is logged and
    /// isolated so one bad item cannot starve the rest.
    pub async fn tick(&self, now: DateTime<Utc>) {
        match self.pending.sweep_expired(now) {
            Ok(_) => {}
            Err(e) => error!("pending-action sweep failed: {e}"),
        }

        match self.reminders.due(now) {
            Ok(due) => {
                for reminder in due {
                    self.deliver_reminder(&reminder).await;
                }
            }
            Err(e) => error!("due-reminder query failed: {e}"),
        }

        match self.automations.list_enabled(DAILY_DIGEST) {
            Ok(enabled) => {
                for automation in enabled {
                    self.deliver_digest(&automation, now).await;
                }
            }
            Err(e) => error!("digest query failed: {e}"),
        }
    }

    /// Send one due reminder. Marked done only after a successful send, so a
    /// failed delivery is retried on the next tick.
    async fn deliver_reminder(&self, reminder: &Reminder) {
        match self.users.get(&reminder.user_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(reminder_id = reminder.id, user_id = %reminder.user_id, "reminder owner missing, skipping");
                return;
            }
            Err(e) => {
                error!(reminder_id = reminder.id, "user lookup failed: {e}");
                return;
            }
        }

        let text = match reminder.kind {
            ReminderKind::Plain => format!("⏰ Reminder: {}", reminder.message),
            ReminderKind::Focus => format!("🧘 Focus session over — {}", reminder.message),
        };
        let controls = reminder_controls(reminder.id);

        match self
            .messenger
            .send(&reminder.user_id, &text, Some(&controls))
            .await
        {
            Ok(()) => {
                info!(reminder_id = reminder.id, user_id = %reminder.user_id, "reminder delivered");
                if let Err(e) = self.reminders.mark_done(&reminder.user_id, reminder.id) {
                    error!(reminder_id = reminder.id, "mark_done failed: {e}");
                }
            }
            Err(e) => {
                // Left undone; the next tick retries.
                warn!(reminder_id = reminder.id, user_id = %reminder.user_id, "reminder send failed: {e}");
            }
        }
    }

    /// Send one digest if its local minute has arrived and it has not
    /// already gone out today (in the owner's timezone).
    async fn deliver_digest(&self, automation: &Automation, now: DateTime<Utc>) {
        let user = match self.users.get(&automation.user_id) {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(automation_id = automation.id, user_id = %automation.user_id, "digest owner missing, skipping");
                return;
            }
            Err(e) => {
                error!(automation_id = automation.id, "user lookup failed: {e}");
                return;
            }
        };

        let tz: Tz = match user.timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(user_id = %user.user_id, timezone = %user.timezone, "bad timezone, using UTC");
                chrono_tz::UTC
            }
        };

        let local = now.with_timezone(&tz);
        if local.format("%H:%M").to_string() != automation.config.time {
            return;
        }

        // One delivery per local calendar day, however often we tick inside
        // the matching minute.
        if let Some(last) = automation.last_sent_at.as_deref() {
            if let Ok(last) = DateTime::parse_from_rfc3339(last) {
                if last.with_timezone(&tz).date_naive() == local.date_naive() {
                    return;
                }
            }
        }

        let text = if automation.config.items.is_empty() {
            "🌅 Daily digest: your list is empty today. Add items whenever you like.".to_string()
        } else {
            format!(
                "🌅 Your daily digest:\n{}",
                automation
                    .config
                    .items
                    .iter()
                    .map(|i| format!("• {i}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        };

        match self.messenger.send(&automation.user_id, &text, None).await {
            Ok(()) => {
                info!(automation_id = automation.id, user_id = %automation.user_id, "digest delivered");
                if let Err(e) = self.automations.set_last_sent(automation.id, now) {
                    error!(automation_id = automation.id, "last_sent update failed: {e}");
                }
            }
            Err(e) => {
                warn!(automation_id = automation.id, user_id = %automation.user_id, "digest send failed: {e}");
            }
        }
    }
}

fn reminder_controls(id: i64) -> Controls {
    Controls::two_rows(
        vec![
            Button::new("😴 10 min", format!("reminder:snooze:{id}:10")),
            Button::new("😴 1 hour", format!("reminder:snooze:{id}:60")),
        ],
        vec![Button::new("✅ Done", format!("reminder:done:{id}"))],
    )
}
