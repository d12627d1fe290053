//! Integration tests for the per-user notification channel

use chrono::Utc;
use pulse_ach::notify::{ConnectionRegistry, ConnectionState, NotificationChannel};
use pulse_common::events::NotificationEvent;
use pulse_common::models::{AchievementRecord, UserId};
use serde_json::Value;
use std::sync::Arc;

fn channel(buffer: usize) -> NotificationChannel {
    NotificationChannel::new(Arc::new(ConnectionRegistry::new(buffer)))
}

fn earned(user: &str, badge: &str) -> NotificationEvent {
    NotificationEvent::achievement_earned(AchievementRecord {
        user_id: UserId::from(user),
        badge_id: badge.to_string(),
        earned_at: Utc::now(),
        progress: 100,
    })
}

#[tokio::test]
async fn test_publish_without_connections_is_dropped() {
    let channel = channel(8);
    assert_eq!(channel.publish(&earned("user-1", "steps-5k")), 0);

    // A later subscriber does not see the earlier event
    let mut subscription = channel.subscribe(&UserId::from("user-1"));
    subscription.open();
    assert!(subscription.try_recv().is_none());
}

#[tokio::test]
async fn test_only_open_connections_receive() {
    let channel = channel(8);
    let user = UserId::from("user-1");

    let mut connecting = channel.subscribe(&user);
    let mut open = channel.subscribe(&user);
    open.open();
    let mut closing = channel.subscribe(&user);
    closing.open();
    closing.begin_close();

    assert_eq!(channel.publish(&earned("user-1", "steps-5k")), 1);

    assert!(connecting.try_recv().is_none());
    assert!(closing.try_recv().is_none());
    let text = open.recv().await.unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "achievement_earned");
    assert_eq!(value["achievement"]["badgeId"], "steps-5k");
}

#[tokio::test]
async fn test_every_open_connection_of_user_receives() {
    let channel = channel(8);
    let user = UserId::from("user-1");
    let mut phone = channel.subscribe(&user);
    let mut laptop = channel.subscribe(&user);
    phone.open();
    laptop.open();

    assert_eq!(channel.publish(&earned("user-1", "workout-first")), 2);
    assert!(phone.try_recv().is_some());
    assert!(laptop.try_recv().is_some());
}

#[tokio::test]
async fn test_events_are_scoped_to_their_user() {
    let channel = channel(8);
    let mut alice = channel.subscribe(&UserId::from("alice"));
    let mut bob = channel.subscribe(&UserId::from("bob"));
    alice.open();
    bob.open();

    channel.publish(&earned("alice", "goal-first"));

    assert!(alice.try_recv().is_some());
    assert!(bob.try_recv().is_none());
}

#[tokio::test]
async fn test_full_queue_drops_for_that_connection_only() {
    let channel = channel(1);
    let user = UserId::from("user-1");
    let mut slow = channel.subscribe(&user);
    let mut fast = channel.subscribe(&user);
    slow.open();
    fast.open();

    assert_eq!(channel.publish(&earned("user-1", "steps-5k")), 2);
    // Drain only the fast connection
    assert!(fast.try_recv().is_some());

    assert_eq!(channel.publish(&earned("user-1", "steps-10k")), 1);

    let first = slow.try_recv().unwrap();
    assert!(first.contains("steps-5k"));
    assert!(slow.try_recv().is_none());
    assert!(fast.try_recv().unwrap().contains("steps-10k"));
}

#[tokio::test]
async fn test_dropping_subscription_unsubscribes() {
    let channel = channel(8);
    let user = UserId::from("user-1");
    let subscription = channel.subscribe(&user);
    let id = subscription.id();
    subscription.open();
    assert_eq!(channel.registry().state(id), Some(ConnectionState::Open));

    drop(subscription);

    assert_eq!(channel.registry().state(id), None);
    assert_eq!(channel.registry().user_connection_count(&user), 0);
    assert_eq!(channel.publish(&earned("user-1", "steps-5k")), 0);
}

#[tokio::test]
async fn test_explicit_unsubscribe_stops_delivery() {
    let channel = channel(8);
    let user = UserId::from("user-1");
    let mut subscription = channel.subscribe(&user);
    subscription.open();

    channel.unsubscribe(subscription.id());

    assert_eq!(channel.publish(&earned("user-1", "steps-5k")), 0);
    assert!(subscription.try_recv().is_none());
    assert_eq!(subscription.state(), None);
}
