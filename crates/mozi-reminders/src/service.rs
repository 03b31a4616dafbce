//! Session-scoped reminder API exposed to tool code (SPEC_FULL §6
//! "Reminder public API"). Every mutation checks the target reminder is
//! owned by the calling session before touching it.

use std::sync::Arc;

use chrono::Utc;
use mozi_core::{PeerType, Reminder, Schedule, SessionKey};
use mozi_storage::ReminderRepository;
use uuid::Uuid;

use crate::error::{ReminderError, ReminderResult};
use crate::schedule::compute_next_run;

const LIST_LIMIT_CEILING: u32 = 200;

/// Thin, session-scoped front for [`ReminderRepository`].
pub struct ReminderService {
    reminders: Arc<dyn ReminderRepository>,
}

impl ReminderService {
    #[must_use]
    pub fn new(reminders: Arc<dyn ReminderRepository>) -> Self {
        Self { reminders }
    }

    /// Create and persist a new reminder, computing its initial
    /// `next_run_at` from `schedule` as of now.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::InvalidCron`]/[`ReminderError::InvalidTimeZone`]
    /// if `schedule` doesn't parse, or [`ReminderError::Storage`] on a store failure.
    pub async fn create(
        &self,
        session_key: &SessionKey,
        channel_id: &str,
        peer_id: &str,
        peer_type: PeerType,
        message: &str,
        schedule: Schedule,
    ) -> ReminderResult<Reminder> {
        let now = Utc::now();
        let next_run_at = compute_next_run(&schedule, now)?;
        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            session_key: session_key.clone(),
            channel_id: channel_id.to_owned(),
            peer_id: peer_id.to_owned(),
            peer_type,
            message: message.to_owned(),
            schedule,
            enabled: next_run_at.is_some(),
            next_run_at,
            last_run_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.reminders.insert(&reminder).await?;
        Ok(reminder)
    }

    /// List reminders owned by `session_key`, optionally including disabled
    /// ones, capped at 200 regardless of the requested `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::Storage`] on a store failure.
    pub async fn list_by_session(
        &self,
        session_key: &SessionKey,
        include_disabled: bool,
        limit: u32,
    ) -> ReminderResult<Vec<Reminder>> {
        let limit = limit.min(LIST_LIMIT_CEILING);
        let all = self.reminders.list_by_session(session_key, limit).await?;
        Ok(all.into_iter().filter(|r| include_disabled || r.enabled).collect())
    }

    /// Cancel a reminder: `enabled=false`, `cancelled_at=now`. Fails if
    /// `id` isn't owned by `session_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::WrongSession`] if the reminder belongs to a
    /// different session, or [`ReminderError::Storage`] on a store failure.
    pub async fn cancel_by_session(&self, session_key: &SessionKey, id: &str) -> ReminderResult<()> {
        let reminder = self.owned(session_key, id).await?;
        self.reminders.cancel(&reminder.id, Utc::now()).await?;
        Ok(())
    }

    /// Replace `message` and/or `schedule` on a reminder owned by
    /// `session_key`, recomputing `next_run_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::WrongSession`] if the reminder belongs to a
    /// different session, a schedule-parse error, or
    /// [`ReminderError::Storage`] on a store failure.
    pub async fn update_by_session(
        &self,
        session_key: &SessionKey,
        id: &str,
        message: Option<String>,
        schedule: Option<Schedule>,
    ) -> ReminderResult<Reminder> {
        let mut reminder = self.owned(session_key, id).await?;
        if let Some(message) = message {
            reminder.message = message;
        }
        let now = Utc::now();
        if let Some(schedule) = schedule {
            let next_run_at = compute_next_run(&schedule, now)?;
            reminder.schedule = schedule;
            reminder.enabled = next_run_at.is_some();
            reminder.next_run_at = next_run_at;
        }
        reminder.updated_at = now;
        self.reminders.replace(&reminder).await?;
        Ok(reminder)
    }

    /// Overwrite `next_run_at` directly (e.g. a manual snooze), leaving the
    /// schedule itself untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::WrongSession`] if the reminder belongs to a
    /// different session, or [`ReminderError::Storage`] on a store failure.
    pub async fn update_next_run_by_session(
        &self,
        session_key: &SessionKey,
        id: &str,
        next_run_at: Option<chrono::DateTime<Utc>>,
    ) -> ReminderResult<Reminder> {
        let mut reminder = self.owned(session_key, id).await?;
        reminder.next_run_at = next_run_at;
        reminder.enabled = next_run_at.is_some();
        reminder.updated_at = Utc::now();
        self.reminders.replace(&reminder).await?;
        Ok(reminder)
    }

    async fn owned(&self, session_key: &SessionKey, id: &str) -> ReminderResult<Reminder> {
        let reminder = self
            .reminders
            .get(id)
            .await?
            .ok_or_else(|| ReminderError::WrongSession { id: id.to_owned(), session_key: session_key.as_str().to_owned() })?;
        if &reminder.session_key != session_key {
            return Err(ReminderError::WrongSession { id: id.to_owned(), session_key: session_key.as_str().to_owned() });
        }
        Ok(reminder)
    }
}
