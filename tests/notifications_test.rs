mod common;

use common::{harness, harness_without_otp, transfer};
use uuid::Uuid;
use vaultbank_core::domain::{NotificationTarget, NotificationType};
use vaultbank_core::error::LedgerError;

#[tokio::test]
async fn test_user_notifications_are_newest_first_and_scoped() {
    let h = harness_without_otp();
    let (user_id, account) = h.funded_customer("100.00").await;
    let (other_id, _) = h.customer(true).await;

    h.core
        .transfers
        .initiate(user_id, transfer(account.id, "10.00"))
        .await
        .unwrap();

    let mine = h
        .core
        .notifications
        .list_recent(NotificationTarget::User(user_id), None)
        .await
        .unwrap();
    // Deposit, pending, completed.
    assert_eq!(mine.len(), 3);
    assert!(mine.iter().any(|n| n.title == "Transfer Completed"));
    assert!(mine
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));

    let theirs = h
        .core
        .notifications
        .list_recent(NotificationTarget::User(other_id), None)
        .await
        .unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn test_mark_read_is_scoped_to_target() {
    let h = harness();
    let (user_id, _) = h.funded_customer("10.00").await;
    let (other_id, _) = h.customer(true).await;
    let target = NotificationTarget::User(user_id);

    let id = h
        .core
        .notifications
        .list_recent(target, Some(1))
        .await
        .unwrap()[0]
        .id;
    assert_eq!(h.core.notifications.unread_count(target).await.unwrap(), 1);

    let foreign = h
        .core
        .notifications
        .mark_read(NotificationTarget::User(other_id), id)
        .await;
    assert!(matches!(foreign, Err(LedgerError::NotFound(_))));

    let read = h.core.notifications.mark_read(target, id).await.unwrap();
    assert!(read.is_read);
    assert_eq!(h.core.notifications.unread_count(target).await.unwrap(), 0);
}

#[tokio::test]
async fn test_admin_pool_is_shared() {
    let h = harness();
    for i in 0..3 {
        h.core
            .notifications
            .notify_admins(NotificationType::Info, "Heads up", &format!("event {}", i))
            .await
            .unwrap();
    }
    let user_note = h
        .core
        .notifications
        .notify_user(Uuid::new_v4(), NotificationType::Info, "Hello", "hi")
        .await;
    assert!(user_note.is_some());

    let admin = h
        .core
        .notifications
        .list_recent(NotificationTarget::Admin, Some(2))
        .await
        .unwrap();
    assert_eq!(admin.len(), 2);
    assert_eq!(
        h.core
            .notifications
            .unread_count(NotificationTarget::Admin)
            .await
            .unwrap(),
        3
    );

    let updated = h
        .core
        .notifications
        .mark_all_read(NotificationTarget::Admin)
        .await
        .unwrap();
    assert_eq!(updated, 3);
    assert_eq!(
        h.core
            .notifications
            .unread_count(NotificationTarget::Admin)
            .await
            .unwrap(),
        0
    );
}
