//! Request/response surface over the history store and the reclaimer.

mod common;

use common::start_test_server;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create_forum(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{base}/api/forums"))
        .json(&json!({ "id": "f1", "title": "Books", "description": "what are you reading", "image": "books.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    body["forum"]["uuid"].as_str().unwrap().to_owned()
}

async fn add_user(client: &reqwest::Client, base: &str, username: &str) -> Value {
    let resp = client
        .post(format!("{base}/addnewuser"))
        .json(&json!({ "username": username, "deviceId": "device-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    body["user"].clone()
}

#[tokio::test]
async fn forum_messages_round_trip_through_http() {
    let (addr, _state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let forum = create_forum(&client, &base).await;

    let forums: Value = client.get(format!("{base}/api/forums")).send().await.unwrap().json().await.unwrap();
    assert_eq!(forums.as_array().unwrap().len(), 1);

    let empty = client.get(format!("{base}/forums/{forum}/messages")).send().await.unwrap();
    assert_eq!(empty.status(), StatusCode::NOT_FOUND);

    let saved = client
        .post(format!("{base}/forums/{forum}/messages"))
        .json(&json!({ "userID": "1", "username": "alice", "content": "first!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::CREATED);

    let listed: Value = client.get(format!("{base}/forums/{forum}/messages")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed[0]["content"], "first!");
    assert_eq!(listed[0]["forumID"], forum.as_str());
}

#[tokio::test]
async fn message_to_unknown_forum_is_rejected() {
    let (addr, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/forums/0191d7a0-0000-7000-8000-000000000000/messages"))
        .json(&json!({ "userID": "1", "username": "alice", "content": "hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let listed = client.get(format!("http://{addr}/forums/lobby/messages")).send().await.unwrap();
    assert_eq!(listed.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn direct_messages_need_every_field() {
    let (addr, _state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let missing = client
        .post(format!("{base}/api/messages/send"))
        .json(&json!({ "senderID": "1", "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let sent = client
        .post(format!("{base}/api/messages/send"))
        .json(&json!({ "senderID": "1", "receiverID": "2", "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status(), StatusCode::CREATED);

    let listed: Value = client.get(format!("{base}/api/messages/2/1")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed["messages"][0]["senderID"], "1");

    let none = client.get(format!("{base}/api/messages/1/3")).send().await.unwrap();
    assert_eq!(none.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contact_lists_and_user_lookup() {
    let (addr, _state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    add_user(&client, &base, "alice").await;
    let bob = add_user(&client, &base, "bob").await;

    let duplicate = client
        .post(format!("{base}/addnewuser"))
        .json(&json!({ "username": "alice", "deviceId": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let bob_id = bob["userID"].as_i64().unwrap().to_string();
    let found: Value = client.get(format!("{base}/getuser/{bob_id}")).send().await.unwrap().json().await.unwrap();
    assert_eq!(found["user"]["username"], "bob");

    let added = client
        .post(format!("{base}/add-connected-user"))
        .json(&json!({ "username": "alice", "userIDToAdd": bob_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), StatusCode::OK);

    let again = client
        .post(format!("{base}/add-connected-user"))
        .json(&json!({ "username": "alice", "userIDToAdd": bob_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);

    let listed: Value = client.get(format!("{base}/connected-users/alice")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed["connectedUsers"][0]["username"], "bob");

    let missing = client.get(format!("{base}/getuser/nobody")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cleanup_refuses_unknown_silent_and_active_users() {
    let (addr, _state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let unknown = client.delete(format!("{base}/cleanup-user/ghost")).send().await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let alice = add_user(&client, &base, "alice").await;
    let silent = client.delete(format!("{base}/cleanup-user/alice")).send().await.unwrap();
    assert_eq!(silent.status(), StatusCode::NOT_FOUND);

    client
        .post(format!("{base}/api/messages/send"))
        .json(&json!({ "senderID": alice["userID"].as_i64().unwrap().to_string(), "receiverID": "99", "content": "hi" }))
        .send()
        .await
        .unwrap();
    let active = client.delete(format!("{base}/cleanup-user/alice")).send().await.unwrap();
    assert_eq!(active.status(), StatusCode::BAD_REQUEST);

    let still_there = client.get(format!("{base}/getuser/alice")).send().await.unwrap();
    assert_eq!(still_there.status(), StatusCode::OK);
}
