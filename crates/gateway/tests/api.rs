//! Integration tests for the HTTP surface, driven over a real socket.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    relay_channels::{MemoryChannel, MemoryConnector, MemoryProbe},
    relay_dispatch::{DispatchEngine, EngineConfig, PacingPolicy, PollPolicy, SessionState},
    relay_gateway::{GatewayState, build_gateway_app},
    secrecy::Secret,
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

const TOKEN: &str = "test-token";

fn engine_config() -> EngineConfig {
    EngineConfig {
        pacing: PacingPolicy::none(),
        poll: PollPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 500,
        },
        send_timeout: Duration::from_secs(5),
        rng_seed: Some(1),
    }
}

struct TestServer {
    addr: SocketAddr,
    engine: Arc<DispatchEngine>,
    probe: MemoryProbe,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(channel: MemoryChannel) -> Self {
        let probe = channel.probe();
        let engine = Arc::new(DispatchEngine::start(
            engine_config(),
            Arc::new(MemoryConnector::new(channel)),
        ));
        Self::serve(engine, probe).await
    }

    async fn start_ready() -> Self {
        let server = Self::start(MemoryChannel::new()).await;
        server
            .engine
            .session_handle()
            .wait_for_state(SessionState::Ready)
            .await
            .unwrap();
        server
    }

    async fn serve(engine: Arc<DispatchEngine>, probe: MemoryProbe) -> Self {
        let state = GatewayState::new(Arc::clone(&engine), Secret::new(TOKEN.to_string()));
        let app = build_gateway_app(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            engine,
            probe,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.send().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn wait_terminal(&self, task_id: &str) -> Value {
        for _ in 0..200 {
            let (status, task) = self.get_json(&format!("/queue/status/{task_id}")).await;
            assert_eq!(status, 200);
            if task["status"] == "sent" || task["status"] == "error" {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("task {task_id} never finished");
    }
}

#[tokio::test]
async fn text_send_is_queued_and_delivered() {
    let server = TestServer::start_ready().await;

    let resp = server
        .post(
            "/rest/sendMessage/main/text",
            Some(TOKEN),
            &json!({"messageData": {"to": "5511999999999@s.whatsapp.net", "text": "hello\nthere"}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "message queued");
    assert_eq!(body["queue_position"], 1);

    let task = server
        .wait_terminal(body["task_id"].as_str().unwrap())
        .await;
    assert_eq!(task["status"], "sent");
    assert_eq!(task["type"], "text");
    assert_eq!(task["text"], "hello\nthere");
    assert_eq!(task["result"]["success"], true);
    assert!(task["completed_at"].is_string());
    assert_eq!(server.probe.sent_to(), vec!["5511999999999@s.whatsapp.net"]);
}

#[tokio::test]
async fn image_send_carries_caption() {
    let server = TestServer::start_ready().await;

    let resp = server
        .post(
            "/rest/sendMessage/main/image",
            Some(TOKEN),
            &json!({"messageData": {"to": "5511", "imageUrl": "https://example.com/a.png", "caption": "look"}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "image queued");

    let task = server
        .wait_terminal(body["task_id"].as_str().unwrap())
        .await;
    assert_eq!(task["status"], "sent");
    assert_eq!(task["type"], "image");
    assert_eq!(task["image_url"], "https://example.com/a.png");
    assert_eq!(task["caption"], "look");
}

#[tokio::test]
async fn missing_text_is_rejected_without_registering() {
    let server = TestServer::start_ready().await;

    let resp = server
        .post(
            "/rest/sendMessage/main/text",
            Some(TOKEN),
            &json!({"messageData": {"to": "5511"}}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "fields 'to' and 'text' are required");

    let resp = server
        .post(
            "/rest/sendMessage/main/image",
            Some(TOKEN),
            &json!({"messageData": {"to": "5511", "imageUrl": "   "}}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(server.engine.total_tasks(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_400() {
    let server = TestServer::start_ready().await;
    let resp = server
        .client
        .post(server.url("/rest/sendMessage/main/text"))
        .header("Authorization", format!("Bearer {TOKEN}"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(server.engine.total_tasks(), 0);
}

#[tokio::test]
async fn bad_tokens_are_401_and_register_nothing() {
    let server = TestServer::start_ready().await;
    let body = json!({"messageData": {"to": "5511", "text": "hi"}});

    let resp = server.post("/rest/sendMessage/main/text", None, &body).await;
    assert_eq!(resp.status(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "authorization token not provided");

    let resp = server
        .post("/rest/sendMessage/main/text", Some("wrong"), &body)
        .await;
    assert_eq!(resp.status(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid token");

    let resp = server
        .client
        .post(server.url("/rest/sendMessage/main/image"))
        .header("Authorization", TOKEN)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid token format");

    assert_eq!(server.engine.total_tasks(), 0);
}

#[tokio::test]
async fn bad_token_wins_over_bad_body() {
    let server = TestServer::start_ready().await;
    let resp = server
        .post("/rest/sendMessage/main/text", Some("wrong"), &json!({}))
        .await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn not_ready_session_is_503() {
    let server = TestServer::start(MemoryChannel::new().never_authenticate()).await;
    server
        .engine
        .session_handle()
        .wait_for_state(SessionState::AwaitingAuthentication)
        .await
        .unwrap();

    let resp = server
        .post(
            "/rest/sendMessage/main/text",
            Some(TOKEN),
            &json!({"messageData": {"to": "5511", "text": "hi"}}),
        )
        .await;
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "channel not ready");
    assert_eq!(server.engine.total_tasks(), 0);
}

#[tokio::test]
async fn unknown_task_is_404() {
    let server = TestServer::start_ready().await;
    let (status, body) = server.get_json("/queue/status/does-not-exist").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "task not found");
}

#[tokio::test]
async fn unknown_contact_is_recorded_on_the_task() {
    let server = TestServer::start(MemoryChannel::new().with_unknown_contact("000")).await;
    server
        .engine
        .session_handle()
        .wait_for_state(SessionState::Ready)
        .await
        .unwrap();

    let resp = server
        .post(
            "/rest/sendMessage/main/text",
            Some(TOKEN),
            &json!({"messageData": {"to": "000", "text": "hi"}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let task = server
        .wait_terminal(body["task_id"].as_str().unwrap())
        .await;
    assert_eq!(task["status"], "error");
    assert!(task["error"].as_str().unwrap().contains("contact not found"));
    assert_eq!(task["result"]["success"], false);
}

#[tokio::test]
async fn queue_status_lists_every_task() {
    let server = TestServer::start_ready().await;
    let mut ids = Vec::new();
    for to in ["a", "b"] {
        let resp = server
            .post(
                "/rest/sendMessage/main/text",
                Some(TOKEN),
                &json!({"messageData": {"to": to, "text": "hi"}}),
            )
            .await;
        let body: Value = resp.json().await.unwrap();
        ids.push(body["task_id"].as_str().unwrap().to_string());
    }
    for id in &ids {
        server.wait_terminal(id).await;
    }

    let (status, body) = server.get_json("/queue/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["queue_size"], 0);
    assert_eq!(body["total_tasks"], 2);
    assert_eq!(body["counts"]["sent"], 2);
    for id in &ids {
        assert_eq!(body["tasks"][id]["status"], "sent");
    }
}

#[tokio::test]
async fn health_reports_session_and_queue() {
    let server = TestServer::start_ready().await;
    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "online");
    assert_eq!(body["whatsapp_ready"], true);
    assert_eq!(body["session_state"], "ready");
    assert_eq!(body["queue_size"], 0);
    assert!(body["last_error"].is_null());
}

#[tokio::test]
async fn health_surfaces_bootstrap_failure() {
    let engine = Arc::new(DispatchEngine::start(
        engine_config(),
        Arc::new(MemoryConnector::failing("chromium missing")),
    ));
    engine.session_handle().wait_settled().await.unwrap();
    let server = TestServer::serve(engine, MemoryChannel::new().probe()).await;

    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["whatsapp_ready"], false);
    assert_eq!(body["session_state"], "failed");
    assert!(body["last_error"].as_str().unwrap().contains("chromium missing"));

    let resp = server.client.get(server.url("/qr")).send().await.unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn qr_returns_png_while_awaiting_login() {
    let server = TestServer::start(MemoryChannel::new().never_authenticate()).await;
    server
        .engine
        .session_handle()
        .wait_for_state(SessionState::AwaitingAuthentication)
        .await
        .unwrap();

    let resp = server.client.get(server.url("/qr")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn qr_when_connected_is_a_message() {
    let server = TestServer::start_ready().await;
    let (status, body) = server.get_json("/qr").await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "channel already connected");
}
