//! Session lifecycle E2E tests.

use chatgm_domain::SessionState;

use super::*;

#[tokio::test]
async fn test_first_message_creates_session_lazily() {
    let ctx = E2ETestContext::setup();
    ctx.say("alice", "chat-1", "/help").await;

    let session = ctx.app.sessions.get_or_create("chat-1").await.unwrap();
    assert_eq!(session.state(), SessionState::Inactive);
    assert_eq!(session.last_activity(), ctx.clock_now());
}

#[tokio::test]
async fn test_activity_keeps_session_alive() {
    let ctx = E2ETestContext::setup();
    ctx.say("alice", "chat-1", "/start").await;
    let started = ctx.app.sessions.get_or_create("chat-1").await.unwrap();

    for _ in 0..4 {
        ctx.advance_minutes(20);
        ctx.say("alice", "chat-1", "/help").await;
    }

    let session = ctx.app.sessions.get_or_create("chat-1").await.unwrap();
    assert_eq!(session.id(), started.id());
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_idle_session_is_indistinguishable_from_new() {
    let ctx = E2ETestContext::setup();
    ctx.say("alice", "chat-1", "/start").await;
    let started = ctx.app.sessions.get_or_create("chat-1").await.unwrap();

    ctx.advance_minutes(31);
    assert_eq!(ctx.app.sessions.sweep_expired().await.unwrap(), 1);

    let fresh = ctx.app.sessions.get_or_create("chat-1").await.unwrap();
    assert_ne!(fresh.id(), started.id());
    assert_eq!(fresh.state(), SessionState::Inactive);
    assert!(fresh.players().is_empty());
}

#[tokio::test]
async fn test_chats_are_independent() {
    let ctx = E2ETestContext::setup();
    ctx.say("alice", "chat-1", "/start").await;
    ctx.say("alice", "chat-1", "/mode combat").await;
    ctx.say("bob", "chat-2", "/start").await;

    let one = ctx.app.sessions.get_or_create("chat-1").await.unwrap();
    let two = ctx.app.sessions.get_or_create("chat-2").await.unwrap();
    assert_eq!(one.state(), SessionState::Combat);
    assert_eq!(two.state(), SessionState::Active);
    assert_ne!(one.id(), two.id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_are_not_lost() {
    let ctx = E2ETestContext::setup();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = ctx.app.clone();
            tokio::spawn(async move {
                app.use_cases
                    .message
                    .handle
                    .execute(&format!("player-{i}"), "chat-1", "/start")
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let session = ctx.app.sessions.get_or_create("chat-1").await.unwrap();
    assert_eq!(session.players().len(), 16);
    assert_eq!(session.state(), SessionState::Active);
}
