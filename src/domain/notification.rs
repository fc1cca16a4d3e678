//! User and admin-pool notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

/// Who a notification is addressed to. `Admin` is visible to every admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "audience", content = "user_id", rename_all = "lowercase")]
pub enum NotificationTarget {
    User(Uuid),
    Admin,
}

impl NotificationTarget {
    pub fn audience(&self) -> &'static str {
        match self {
            NotificationTarget::User(_) => "user",
            NotificationTarget::Admin => "admin",
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            NotificationTarget::User(id) => Some(*id),
            NotificationTarget::Admin => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Success,
    Pending,
    Warning,
    Error,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Pending => "pending",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
        }
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationType::Info),
            "success" => Ok(NotificationType::Success),
            "pending" => Ok(NotificationType::Pending),
            "warning" => Ok(NotificationType::Warning),
            "error" => Ok(NotificationType::Error),
            other => Err(ParseEnumError::new("notification type", other)),
        }
    }
}

/// Immutable after creation apart from `is_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub target: NotificationTarget,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub issued_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub target: NotificationTarget,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub issued_by: Option<Uuid>,
}

impl NewNotification {
    pub fn into_notification(self) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            target: self.target,
            kind: self.kind,
            title: self.title,
            message: self.message,
            is_read: false,
            issued_by: self.issued_by,
            created_at: now,
            sent_at: Some(now),
        }
    }
}
