mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{Harness, harness_with};
use mentorlink::{app, config::Config};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

struct Client {
    router: Router,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl Client {
    async fn new(allow_directory_sign_in: bool) -> (Self, Harness) {
        let mut config = Config::new("sqlite::memory:");
        config.allow_directory_sign_in = allow_directory_sign_in;
        let h = harness_with(config.clone()).await;
        let router = app(h.state.clone(), &config);
        (Self { router }, h)
    }

    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_owned);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply { status, cookie, body }
    }

    async fn sign_in(&self, user_id: Uuid) -> String {
        let reply = self
            .send(Method::POST, "/session", None, Some(json!({ "user_id": user_id })))
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["id"], user_id.to_string());
        reply.cookie.expect("sign in sets the session cookie")
    }
}

#[tokio::test]
async fn signed_out_requests_are_unauthorized() {
    let (client, _) = Client::new(true).await;

    for uri in ["/notifications", "/mentorship/requests", "/messages", "/feed/ws"] {
        let reply = client.send(Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let reply = client
        .send(Method::POST, "/notifications/read", Some("id=not-a-session"), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn directory_sign_in_is_not_mounted_by_default() {
    let (client, h) = Client::new(false).await;

    let reply = client
        .send(Method::POST, "/session", None, Some(json!({ "user_id": h.alice })))
        .await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(reply.cookie.is_none());

    let reply = client.send(Method::DELETE, "/session", None, None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn sign_in_requires_a_known_profile_and_sign_out_ends_the_session() {
    let (client, h) = Client::new(true).await;

    let reply = client
        .send(Method::POST, "/session", None, Some(json!({ "user_id": Uuid::now_v7() })))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let cookie = client.sign_in(h.alice).await;
    let reply = client.send(Method::GET, "/notifications", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = client.send(Method::DELETE, "/session", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let reply = client.send(Method::GET, "/notifications", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mentorship_errors_map_to_statuses() {
    let (client, h) = Client::new(true).await;
    let alice = client.sign_in(h.alice).await;
    let mentor = client.sign_in(h.mentor).await;

    let body = json!({ "mentor_id": h.mentor, "message": "  " });
    let reply = client
        .send(Method::POST, "/mentorship/requests", Some(&alice), Some(body))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["error"].as_str().unwrap().contains("empty"));

    let body = json!({ "mentor_id": h.mentor, "message": "Could we talk?" });
    let reply = client
        .send(Method::POST, "/mentorship/requests", Some(&alice), Some(body.clone()))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["status"], "pending");
    let id = reply.body["id"].as_str().unwrap().to_owned();

    let reply = client
        .send(Method::POST, "/mentorship/requests", Some(&alice), Some(body))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let respond = format!("/mentorship/requests/{id}/respond");
    let reply = client
        .send(Method::POST, &respond, Some(&alice), Some(json!({ "decision": "accept" })))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = client
        .send(Method::POST, &respond, Some(&mentor), Some(json!({ "decision": "reject" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "rejected");

    let reply = client
        .send(Method::POST, &respond, Some(&mentor), Some(json!({ "decision": "accept" })))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let missing = format!("/mentorship/requests/{}", Uuid::now_v7());
    let reply = client.send(Method::GET, &missing, Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_listing_defaults_to_the_callers_role() {
    let (client, h) = Client::new(true).await;
    let alice = client.sign_in(h.alice).await;
    let bob = client.sign_in(h.bob).await;
    let mentor = client.sign_in(h.mentor).await;
    let admin = client.sign_in(h.admin).await;

    for (cookie, mentor_id) in [(&alice, h.mentor), (&bob, h.other_mentor)] {
        let body = json!({ "mentor_id": mentor_id, "message": "hello" });
        let reply = client
            .send(Method::POST, "/mentorship/requests", Some(cookie), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let reply = client.send(Method::GET, "/mentorship/requests", Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let sent = reply.body.as_array().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["student_id"], h.alice.to_string());

    let reply = client.send(Method::GET, "/mentorship/requests", Some(&mentor), None).await;
    let received = reply.body.as_array().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["mentor_id"], h.mentor.to_string());

    let reply = client.send(Method::GET, "/mentorship/requests", Some(&admin), None).await;
    assert_eq!(reply.body.as_array().unwrap().len(), 2);

    let reply = client
        .send(Method::GET, "/mentorship/requests?direction=received", Some(&alice), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = client
        .send(Method::GET, "/mentorship/requests?direction=sent&status=accepted", Some(&alice), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn messages_and_notifications_round_trip_over_http() {
    let (client, h) = Client::new(true).await;
    let alice = client.sign_in(h.alice).await;
    let bob = client.sign_in(h.bob).await;

    let uri = format!("/messages/{}", h.bob);
    let reply = client
        .send(Method::POST, &uri, Some(&alice), Some(json!({ "content": "hi bob" })))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = client.send(Method::GET, "/messages/unread", Some(&bob), None).await;
    assert_eq!(reply.body["count"], 1);

    let reply = client.send(Method::GET, "/messages", Some(&bob), None).await;
    let conversations = reply.body.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["counterparty_id"], h.alice.to_string());

    let read = format!("/messages/{}/read", h.alice);
    let reply = client.send(Method::POST, &read, Some(&bob), None).await;
    assert_eq!(reply.body["count"], 1);

    let reply = client
        .send(Method::GET, "/notifications?filter=unread", Some(&bob), None)
        .await;
    let unread = reply.body.as_array().unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["type"], "message");
    let id = unread[0]["id"].as_str().unwrap().to_owned();

    let uri = format!("/notifications/{id}");
    let reply = client.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = client.send(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unfollowing_is_idempotent_over_http() {
    let (client, h) = Client::new(true).await;
    let alice = client.sign_in(h.alice).await;
    let uri = format!("/connections/{}", h.mentor);

    let reply = client.send(Method::POST, &uri, Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    for _ in 0..2 {
        let reply = client.send(Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
    }
    let reply = client.send(Method::GET, "/connections/following", Some(&alice), None).await;
    assert!(reply.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn only_admins_post_announcements() {
    let (client, h) = Client::new(true).await;
    let admin = client.sign_in(h.admin).await;
    let alice = client.sign_in(h.alice).await;
    let body = json!({ "audience": "alumni_and_admins", "title": "Reunion" });

    let reply = client
        .send(Method::POST, "/announcements", Some(&alice), Some(body.clone()))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = client
        .send(Method::POST, "/announcements", Some(&admin), Some(body))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["delivered"], 2);
}
