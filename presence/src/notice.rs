//! Transient user-facing notices.
//!
//! Each posted notice clears itself after the board's TTL, unless a newer
//! notice replaced it in the meantime: a stale timer never clears a newer
//! message.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Clone)]
pub struct NoticeBoard {
    current: Arc<watch::Sender<Option<Notice>>>,
    next_id: Arc<AtomicU64>,
    ttl: Duration,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
            next_id: Arc::new(AtomicU64::new(1)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Shows `text`, replacing whatever was showing. Must be called within a
    /// Tokio runtime; the expiry timer is a spawned task.
    pub fn post(&self, level: NoticeLevel, text: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.current.send_replace(Some(Notice {
            id,
            level,
            text: text.into(),
        }));

        let current = self.current.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            current.send_if_modified(|shown| {
                if shown.as_ref().is_some_and(|n| n.id == id) {
                    *shown = None;
                    true
                } else {
                    false
                }
            });
        });
        id
    }

    pub fn current(&self) -> Option<Notice> {
        self.current.borrow().clone()
    }

    pub fn clear(&self) {
        self.current.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.current.subscribe()
    }
}
