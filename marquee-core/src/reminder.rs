//! Showtime reminders.
//!
//! The store is built once at start-up and handed to whoever needs it, so
//! tests get their own isolated instance.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: Uuid,
    pub title: String,
    pub showtime_id: Option<Uuid>,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub showtime_id: Option<Uuid>,
    pub remind_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderChange {
    Added { owner: String, reminder: Reminder },
    Removed { owner: String, reminder_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Reminder not found: {0}")]
    NotFound(Uuid),

    #[error("Reminder persistence failed: {0}")]
    Persistence(String),
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Reminders for `owner`, earliest first.
    async fn list(&self, owner: &str) -> Result<Vec<Reminder>, ReminderError>;

    /// Adding a second reminder for the same showtime returns the existing one.
    async fn add(&self, owner: &str, reminder: NewReminder) -> Result<Reminder, ReminderError>;

    async fn remove(&self, owner: &str, reminder_id: Uuid) -> Result<(), ReminderError>;

    fn subscribe(&self) -> broadcast::Receiver<ReminderChange>;
}

/// Reminder store kept in memory, optionally mirrored to a JSON file.
pub struct InMemoryReminderStore {
    reminders: RwLock<HashMap<String, Vec<Reminder>>>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<ReminderChange>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            reminders: RwLock::new(HashMap::new()),
            path: None,
            changes,
        }
    }

    /// Loads the snapshot at `path` if it exists and writes back to it after
    /// every mutation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ReminderError> {
        let path = path.into();
        let reminders = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<HashMap<String, Vec<Reminder>>>(&bytes)
                .map_err(|e| ReminderError::Persistence(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(ReminderError::Persistence(format!("{}: {}", path.display(), e))),
        };

        info!("Loaded reminders for {} owners from {}", reminders.len(), path.display());

        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            reminders: RwLock::new(reminders),
            path: Some(path),
            changes,
        })
    }

    async fn persist(&self, snapshot: &HashMap<String, Vec<Reminder>>) -> Result<(), ReminderError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| ReminderError::Persistence(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| ReminderError::Persistence(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| ReminderError::Persistence(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    fn notify(&self, change: ReminderChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

impl Default for InMemoryReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn list(&self, owner: &str) -> Result<Vec<Reminder>, ReminderError> {
        let reminders = self.reminders.read().await;
        let mut list = reminders.get(owner).cloned().unwrap_or_default();
        list.sort_by_key(|r| r.remind_at);
        Ok(list)
    }

    async fn add(&self, owner: &str, reminder: NewReminder) -> Result<Reminder, ReminderError> {
        let mut reminders = self.reminders.write().await;

        if let Some(showtime_id) = reminder.showtime_id {
            let existing = reminders
                .get(owner)
                .and_then(|entries| entries.iter().find(|r| r.showtime_id == Some(showtime_id)));
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        let created = Reminder {
            id: Uuid::new_v4(),
            title: reminder.title,
            showtime_id: reminder.showtime_id,
            remind_at: reminder.remind_at,
            created_at: Utc::now(),
        };

        // The live map only changes once the snapshot is on disk.
        let mut next = reminders.clone();
        next.entry(owner.to_string()).or_default().push(created.clone());
        self.persist(&next).await?;
        *reminders = next;

        debug!("Reminder {} added for {}", created.id, owner);
        self.notify(ReminderChange::Added { owner: owner.to_string(), reminder: created.clone() });
        Ok(created)
    }

    async fn remove(&self, owner: &str, reminder_id: Uuid) -> Result<(), ReminderError> {
        let mut reminders = self.reminders.write().await;
        let found = reminders
            .get(owner)
            .is_some_and(|entries| entries.iter().any(|r| r.id == reminder_id));
        if !found {
            return Err(ReminderError::NotFound(reminder_id));
        }

        let mut next = reminders.clone();
        if let Some(entries) = next.get_mut(owner) {
            entries.retain(|r| r.id != reminder_id);
            if entries.is_empty() {
                next.remove(owner);
            }
        }
        self.persist(&next).await?;
        *reminders = next;

        debug!("Reminder {} removed for {}", reminder_id, owner);
        self.notify(ReminderChange::Removed { owner: owner.to_string(), reminder_id });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReminderChange> {
        self.changes.subscribe()
    }
}
