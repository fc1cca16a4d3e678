use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewNotification, Notification, NotificationTarget, NotificationType};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::NotificationRepository;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Best-effort record of user and admin-facing events.
///
/// `notify*` never fail: a write error is logged and the caller carries on.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn notify(
        &self,
        target: NotificationTarget,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Option<Uuid> {
        self.dispatch(NewNotification {
            target,
            kind,
            title: title.to_string(),
            message: message.to_string(),
            issued_by: None,
        })
        .await
    }

    pub async fn notify_user(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Option<Uuid> {
        self.notify(NotificationTarget::User(user_id), kind, title, message)
            .await
    }

    pub async fn notify_admins(
        &self,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Option<Uuid> {
        self.notify(NotificationTarget::Admin, kind, title, message)
            .await
    }

    /// Same as `notify_user`, stamped with the issuing admin.
    pub async fn notify_from_admin(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Option<Uuid> {
        self.dispatch(NewNotification {
            target: NotificationTarget::User(user_id),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            issued_by: Some(admin_id),
        })
        .await
    }

    async fn dispatch(&self, new: NewNotification) -> Option<Uuid> {
        let audience = new.target.audience();
        let kind = new.kind.as_str();
        match self.repo.insert_notification(&new.into_notification()).await {
            Ok(n) => {
                tracing::debug!(notification_id = %n.id, audience, kind, "notification recorded");
                Some(n.id)
            }
            Err(e) => {
                tracing::warn!(error = %e, audience, kind, "failed to record notification");
                None
            }
        }
    }

    pub async fn list_recent(
        &self,
        target: NotificationTarget,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.repo.list_notifications(target, limit).await?)
    }

    /// Mark one notification read on behalf of `target`; another audience's
    /// notification reads as not found.
    pub async fn mark_read(
        &self,
        target: NotificationTarget,
        id: Uuid,
    ) -> LedgerResult<Notification> {
        let notification = self.repo.get_notification(id).await?;
        if notification.target != target {
            return Err(LedgerError::NotFound(format!("notification {}", id)));
        }
        Ok(self.repo.mark_read(id).await?)
    }

    pub async fn mark_all_read(&self, target: NotificationTarget) -> LedgerResult<u64> {
        Ok(self.repo.mark_all_read(target).await?)
    }

    pub async fn unread_count(&self, target: NotificationTarget) -> LedgerResult<i64> {
        Ok(self.repo.unread_count(target).await?)
    }
}
