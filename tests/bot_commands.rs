use tg_agent_bot::{
    bot::{
        Sender,
        commands::{
            AGENT_UNAVAILABLE_REPLY, FORBIDDEN_REPLY, INVALID_TOKEN_REPLY, MISSING_ARGUMENT_REPLY,
            NOT_REGISTERED_REPLY, START_REPLY,
        },
    },
    db::dao::AuthDao,
    test_helpers::{FakeAgent, command_handler, memory_db},
};

fn alice() -> Sender {
    Sender {
        user_id: "100".to_string(),
        chat_id: 100,
        display_name: "alice".to_string(),
    }
}

fn bob() -> Sender {
    Sender {
        user_id: "200".to_string(),
        chat_id: 200,
        display_name: "bob".to_string(),
    }
}

#[tokio::test]
async fn start_greets() {
    let db = memory_db().await;
    let handler = command_handler(&db, FakeAgent::replying("hi"), None);

    let reply = handler.handle(&alice(), "/start").await;

    assert_eq!(reply.as_deref(), Some(START_REPLY));
}

#[tokio::test]
async fn token_without_argument_asks_for_one() {
    let db = memory_db().await;
    let handler = command_handler(&db, FakeAgent::replying("hi"), None);

    let reply = handler.handle(&alice(), "/token").await;

    assert_eq!(reply.as_deref(), Some(MISSING_ARGUMENT_REPLY));
}

#[tokio::test]
async fn token_registration_flow() {
    let db = memory_db().await;
    AuthDao
        .create_token(&db, "invite-1", None)
        .await
        .expect("token");
    let handler = command_handler(&db, FakeAgent::replying("hi"), None);

    let first = handler
        .handle(&alice(), "/token invite-1")
        .await
        .expect("reply");
    assert!(first.starts_with("Welcome, alice!"));

    let repeat = handler
        .handle(&alice(), "/token invite-1")
        .await
        .expect("reply");
    assert_eq!(repeat, "This token is already registered to you.");

    let stolen = handler.handle(&bob(), "/token invite-1").await;
    assert_eq!(stolen.as_deref(), Some(INVALID_TOKEN_REPLY));

    let unknown = handler.handle(&bob(), "/token nope").await;
    assert_eq!(unknown.as_deref(), Some(INVALID_TOKEN_REPLY));
}

#[tokio::test]
async fn unregistered_users_cannot_reach_the_agent() {
    let db = memory_db().await;
    let agent = FakeAgent::replying("hi");
    let handler = command_handler(&db, agent.clone(), None);

    let reply = handler.handle(&bob(), "hello there").await;

    assert_eq!(reply.as_deref(), Some(NOT_REGISTERED_REPLY));
    assert!(agent.requests().is_empty());
}

#[tokio::test]
async fn registered_text_is_forwarded_to_the_agent() {
    let db = memory_db().await;
    AuthDao.create_token(&db, "invite-1", None).await.expect("token");
    let agent = FakeAgent::replying("42");
    let handler = command_handler(&db, agent.clone(), None);
    handler.handle(&alice(), "/token invite-1").await;

    let reply = handler.handle(&alice(), "what is the answer?").await;

    assert_eq!(reply.as_deref(), Some("42"));
    let requests = agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].thread_id, "100");
    assert_eq!(requests[0].message, "what is the answer?");
}

#[tokio::test]
async fn required_action_gates_the_agent() {
    let db = memory_db().await;
    AuthDao.create_token(&db, "plain", None).await.expect("token");
    AuthDao.create_token(&db, "chatty", None).await.expect("token");
    AuthDao
        .create_action(&db, "agent:chat", None)
        .await
        .expect("action");
    AuthDao
        .attach_action(&db, "chatty", "agent:chat")
        .await
        .expect("attach");
    let handler = command_handler(&db, FakeAgent::replying("ok"), Some("agent:chat"));

    handler.handle(&alice(), "/token plain").await;
    let denied = handler.handle(&alice(), "hi").await;
    assert_eq!(denied.as_deref(), Some(FORBIDDEN_REPLY));

    handler.handle(&alice(), "/token chatty").await;
    let allowed = handler.handle(&alice(), "hi").await;
    assert_eq!(allowed.as_deref(), Some("ok"));

    handler.handle(&alice(), "/revoke chatty").await;
    let revoked = handler.handle(&alice(), "hi").await;
    assert_eq!(revoked.as_deref(), Some(FORBIDDEN_REPLY));
}

#[tokio::test]
async fn agent_failure_yields_an_apology() {
    let db = memory_db().await;
    AuthDao.create_token(&db, "invite-1", None).await.expect("token");
    let handler = command_handler(&db, FakeAgent::unavailable(), None);
    handler.handle(&alice(), "/token invite-1").await;

    let reply = handler.handle(&alice(), "hello").await;

    assert_eq!(reply.as_deref(), Some(AGENT_UNAVAILABLE_REPLY));
}

#[tokio::test]
async fn revoke_and_list_only_touch_own_tokens() {
    let db = memory_db().await;
    AuthDao.create_token(&db, "a-1", None).await.expect("token");
    AuthDao.create_action(&db, "read", None).await.expect("action");
    AuthDao.attach_action(&db, "a-1", "read").await.expect("attach");
    let handler = command_handler(&db, FakeAgent::replying("hi"), None);
    handler.handle(&alice(), "/token a-1").await;

    let listed = handler.handle(&alice(), "/tokens").await.expect("reply");
    assert_eq!(listed, "Your tokens:\na-1: read");

    let foreign = handler.handle(&bob(), "/revoke a-1").await.expect("reply");
    assert_eq!(foreign, "You do not have a token with that id.");
    assert!(AuthDao.token_exists(&db, "a-1").await.expect("exists"));

    let own = handler.handle(&alice(), "/revoke a-1").await.expect("reply");
    assert_eq!(own, "Token revoked.");
    let empty = handler.handle(&alice(), "/tokens").await.expect("reply");
    assert!(empty.starts_with("You have no tokens yet."));
}

#[tokio::test]
async fn blank_text_gets_no_reply() {
    let db = memory_db().await;
    let handler = command_handler(&db, FakeAgent::replying("hi"), None);

    assert!(handler.handle(&alice(), "   ").await.is_none());
}
