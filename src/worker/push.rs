//! Push events and the notifications they raise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, WorkerError};
use crate::worker::Worker;

const TITLE: &str = "Nabha Digital Learning";
const DEFAULT_BODY: &str = "New update from Nabha Digital Learning";
const ICON: &str = "/logo.svg";
const BADGE: &str = "/favicon.ico";
const VIBRATE: [u32; 3] = [100, 50, 100];
const CLICK_URL: &str = "/";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationData {
    /// Page opened when the notification is clicked
    pub url: Option<String>,
}

/// A user-visible notification raised by a push event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// Notifications currently displayed.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    next_id: AtomicU64,
    shown: Mutex<HashMap<u64, Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displays a notification; an empty or missing payload gets the default body.
    pub async fn show(&self, payload: Option<&str>) -> Notification {
        let body = payload
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_BODY);

        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            title: TITLE.to_string(),
            body: body.to_string(),
            icon: ICON.to_string(),
            badge: BADGE.to_string(),
            vibrate: VIBRATE.to_vec(),
            data: NotificationData {
                url: Some(CLICK_URL.to_string()),
            },
        };
        self.shown
            .lock()
            .await
            .insert(notification.id, notification.clone());
        notification
    }

    /// Closes a notification, returning it if it was still displayed.
    pub async fn click(&self, id: u64) -> Option<Notification> {
        self.shown.lock().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.shown.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shown.lock().await.is_empty()
    }
}

impl Worker {
    // == Push Event ==
    pub async fn handle_push(&self, payload: Option<String>) -> Notification {
        let notification = self.notifications.show(payload.as_deref()).await;
        info!("Push notification {} shown: {}", notification.id, notification.body);
        notification
    }

    // == Notification Click ==
    /// Closes the notification and returns the page URL it points at.
    pub async fn handle_notification_click(&self, id: u64) -> Result<Option<String>> {
        let notification = self
            .notifications
            .click(id)
            .await
            .ok_or_else(|| WorkerError::NotFound(format!("notification {}", id)))?;
        debug!("Notification {} clicked", id);
        Ok(notification.data.url)
    }
}
