//! HTTP API tests driven through the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use hearth::notifier::ResetMailer;
use hearth::{api, AppState, Database, ServerConfig};

const PASSWORD: &str = "Passw0rd!";

/// Captures reset tokens instead of mailing them.
#[derive(Default)]
struct Outbox {
    tokens: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    fn token_for(&self, email: &str) -> Option<String> {
        self.tokens
            .lock()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

impl ResetMailer for Outbox {
    fn send_reset_token(&self, email: &str, _user_id: &str, token: &str) {
        self.tokens.lock().push((email.to_string(), token.to_string()));
    }
}

struct TestApp {
    router: Router,
    outbox: Arc<Outbox>,
}

impl TestApp {
    fn new() -> Self {
        let db = Database::open(None).unwrap();
        let config = ServerConfig {
            token_secret: Some("test-secret".into()),
            ..Default::default()
        };
        let outbox = Arc::new(Outbox::default());
        Self {
            router: api::router(AppState::with_mailer(db, config, outbox.clone())),
            outbox,
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    /// Create an account and return its ID.
    async fn signup(&self, username: &str) -> String {
        let (status, body) = self
            .post(
                "/signup",
                json!({
                    "username": username,
                    "password": PASSWORD,
                    "name": username.to_uppercase(),
                    "email": format!("{}@example.com", username),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        body["user"]["id"].as_str().unwrap().to_string()
    }

    async fn send_request(&self, from: &str, to: &str) -> (StatusCode, Value) {
        self.post(
            "/send-friend-request",
            json!({ "fromUserId": from, "toUserId": to }),
        )
        .await
    }

    async fn respond(&self, request_id: &str, status: &str) -> (StatusCode, Value) {
        self.post(
            "/respond-friend-request",
            json!({ "requestId": request_id, "status": status }),
        )
        .await
    }

    async fn befriend(&self, a: &str, b: &str) {
        let (status, body) = self.send_request(a, b).await;
        assert_eq!(status, StatusCode::CREATED);
        let request_id = body["request"]["id"].as_str().unwrap().to_string();
        let (status, _) = self.respond(&request_id, "accepted").await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn friend_ids(&self, user_id: &str) -> Vec<String> {
        let (status, body) = self.get(&format!("/friend-list/{}", user_id)).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array()
            .unwrap()
            .iter()
            .map(|f| f["id"].as_str().unwrap().to_string())
            .collect()
    }
}

// ── Accounts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_signup_login_and_profile() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let (status, body) = app
        .post("/login", json!({ "username": "alice", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], alice.as_str());
    assert!(body["token"].as_str().unwrap().contains('.'));

    let (status, body) = app
        .post("/login", json!({ "username": "alice", "password": "Wr0ngpass!" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = app.get(&format!("/user/{}", alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert!(body.get("email").is_none());
    assert!(body.get("passwordHash").is_none());

    let (status, body) = app.get("/user/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_signup_rejects_duplicate_and_weak_password() {
    let app = TestApp::new();
    app.signup("alice").await;

    let (status, body) = app
        .post(
            "/signup",
            json!({
                "username": "alice",
                "password": PASSWORD,
                "name": "Again",
                "email": "again@example.com",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username or email already exists");

    let (status, _) = app
        .post(
            "/signup",
            json!({
                "username": "bob",
                "password": "short",
                "name": "Bob",
                "email": "bob@example.com",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_profile_and_change_password() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let (status, body) = app
        .request(
            "PUT",
            &format!("/edit-profile/{}", alice),
            Some(json!({ "bio": "Baker", "location": "Lisbon" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "Baker");
    assert_eq!(body["user"]["location"], "Lisbon");

    let (status, _) = app
        .post(
            &format!("/change-password/{}", alice),
            json!({ "currentPassword": "Wr0ngpass!", "newPassword": "N3wPassword!" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/change-password/{}", alice),
            json!({ "currentPassword": PASSWORD, "newPassword": "N3wPassword!" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/login",
            json!({ "username": "alice", "password": "N3wPassword!" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = TestApp::new();
    app.signup("alice").await;

    let (status, _) = app
        .post("/forgot-password", json!({ "email": "ghost@example.com" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/forgot-password", json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    // the token reaches the mailbox, never the requester
    assert!(body.get("token").is_none());
    let token = app.outbox.token_for("alice@example.com").unwrap();

    let (status, _) = app
        .post(
            "/reset-password",
            json!({ "token": token, "newPassword": "N3wPassword!" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // token is single use
    let (status, body) = app
        .post(
            "/reset-password",
            json!({ "token": token, "newPassword": "An0therPass!" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password reset token is invalid or has expired");
}

// ── Friends ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_friend_request_to_self_is_400() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let (status, _) = app.send_request(&alice, &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_request_either_direction_is_400() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (status, _) = app.send_request(&alice, &bob).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.send_request(&alice, &bob).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.send_request(&bob, &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_accept_and_terminal_state() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (_, body) = app.send_request(&alice, &bob).await;
    let request_id = body["request"]["id"].as_str().unwrap().to_string();

    let (status, pending) = app.get(&format!("/pending-friend-requests/{}", bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending[0]["id"], request_id.as_str());
    assert_eq!(pending[0]["from"]["username"], "alice");

    let (status, _) = app.respond(&request_id, "maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.respond(&request_id, "accepted").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "accepted");

    assert_eq!(app.friend_ids(&alice).await, vec![bob.clone()]);
    assert_eq!(app.friend_ids(&bob).await, vec![alice.clone()]);

    let (status, _) = app.respond(&request_id, "rejected").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.respond("missing", "accepted").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, pending) = app.get(&format!("/pending-friend-requests/{}", bob)).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_leaves_friend_lists_unchanged() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (_, body) = app.send_request(&alice, &bob).await;
    let request_id = body["request"]["id"].as_str().unwrap().to_string();
    let (status, _) = app.respond(&request_id, "rejected").await;
    assert_eq!(status, StatusCode::OK);

    assert!(app.friend_ids(&alice).await.is_empty());
    assert!(app.friend_ids(&bob).await.is_empty());
}

#[tokio::test]
async fn test_unfriend() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.befriend(&alice, &bob).await;

    for _ in 0..2 {
        let (status, _) = app
            .post("/unfriend", json!({ "userId": alice, "friendId": bob }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert!(app.friend_ids(&alice).await.is_empty());
    assert!(app.friend_ids(&bob).await.is_empty());
}

#[tokio::test]
async fn test_recommendations_count_mutual_friends() {
    let app = TestApp::new();
    let a = app.signup("anna").await;
    let b = app.signup("ben").await;
    let c = app.signup("cleo").await;
    app.befriend(&a, &c).await;
    app.befriend(&b, &c).await;

    let (status, body) = app.get(&format!("/friend-recommendations/{}", a)).await;
    assert_eq!(status, StatusCode::OK);
    let recs = body.as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["id"], b.as_str());
    assert_eq!(recs[0]["mutualFriends"], 1);

    // a pending request removes the suggestion
    app.send_request(&b, &a).await;
    let (_, body) = app.get(&format!("/friend-recommendations/{}", a)).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_users_with_request_status() {
    let app = TestApp::new();
    let sam = app.signup("sam").await;
    let sally = app.signup("sally").await;
    app.signup("sandy").await;
    app.send_request(&sam, &sally).await;

    let (status, body) = app
        .get(&format!("/search-users?query=sa&userId={}", sam))
        .await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        let expected = if result["id"] == sally.as_str() {
            "sent"
        } else {
            "none"
        };
        assert_eq!(result["requestStatus"], expected);
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_conversation_and_messages_in_order() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (status, first) = app
        .post(
            "/api/conversations",
            json!({ "senderId": alice, "receiverId": bob }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = app
        .post(
            "/api/conversations",
            json!({ "senderId": bob, "receiverId": alice }),
        )
        .await;
    assert_eq!(first["id"], second["id"]);
    let conversation_id = first["id"].as_str().unwrap().to_string();

    for i in 0..10 {
        let sender = if i % 2 == 0 { &alice } else { &bob };
        let (status, message) = app
            .post(
                "/api/messages",
                json!({
                    "conversationId": conversation_id,
                    "senderId": sender,
                    "text": format!("message {}", i),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        // nobody is connected to the gateway
        assert_eq!(message["status"], "sent");
    }

    let (status, body) = app.get(&format!("/api/messages/{}", conversation_id)).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("message {}", i)).collect();
    assert_eq!(texts, expected);

    let (_, convs) = app.get(&format!("/api/conversations/{}", alice)).await;
    assert_eq!(convs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_errors() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;

    let (status, _) = app
        .post(
            "/api/conversations",
            json!({ "senderId": alice, "receiverId": alice }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, conv) = app
        .post(
            "/api/conversations",
            json!({ "senderId": alice, "receiverId": bob }),
        )
        .await;

    let (status, _) = app
        .post(
            "/api/messages",
            json!({ "conversationId": conv["id"], "senderId": carol, "text": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/messages",
            json!({ "conversationId": "missing", "senderId": alice, "text": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/messages/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Deletion ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_profile_cascades() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;
    app.befriend(&alice, &bob).await;
    app.send_request(&alice, &carol).await;

    let (status, _) = app
        .request("DELETE", &format!("/delete-profile/{}", alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(app.friend_ids(&bob).await.is_empty());
    let (_, pending) = app.get(&format!("/pending-friend-requests/{}", carol)).await;
    assert!(pending.as_array().unwrap().is_empty());

    let (status, _) = app
        .request("DELETE", &format!("/delete-profile/{}", alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
