use fellowship_backend::api;
use fellowship_backend::config::{FellowshipConfig, FellowshipPaths};
use fellowship_backend::node::FellowshipNode;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

struct TestServer {
    _dir: TempDir,
    server: tokio::task::JoinHandle<()>,
    base_url: String,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempdir().expect("tempdir");
        let config = FellowshipConfig::new(
            0,
            FellowshipPaths::from_base_dir(dir.path()).expect("paths"),
        );
        let node = FellowshipNode::start(config).expect("start node");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let state = node.state();
        let server = tokio::spawn(async move {
            let _ = api::serve_on(listener, state).await;
        });
        let server = Self {
            _dir: dir,
            server,
            base_url,
            client: Client::new(),
        };
        server.wait_for_health().await;
        server
    }

    async fn wait_for_health(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status().is_success() {
                    return;
                }
            }
            sleep(Duration::from_millis(100)).await;
        }
        panic!("server did not become healthy in time");
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.expect("request");
        let status = resp.status();
        let text = resp.text().await.expect("body");
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call(reqwest::Method::GET, path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn delete(&self, path: &str, token: &str) -> StatusCode {
        self.call(reqwest::Method::DELETE, path, Some(token), None).await.0
    }

    async fn sign_up_and_login(&self, email: &str, name: &str) -> (String, String) {
        let (status, created) = self
            .post(
                "/auth/signup",
                None,
                json!({ "email": email, "password": "password123", "displayName": name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        let token = self.login(email, "password123").await;
        (created["user"]["id"].as_str().unwrap().to_string(), token)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post("/auth/login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn member_count(&self, family_id: &str, token: &str) -> i64 {
        let (status, family) = self.get(&format!("/families/{family_id}"), token).await;
        assert_eq!(status, StatusCode::OK, "{family}");
        family["memberCount"].as_i64().unwrap()
    }

    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

async fn initialized_server() -> (TestServer, String) {
    let server = TestServer::start().await;
    let (status, body) = server
        .post(
            "/setup",
            None,
            json!({
                "deploymentName": "First Church",
                "email": "pastor@example.org",
                "password": "shepherd-42",
                "displayName": "Pastor Ann"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let root = server.login("pastor@example.org", "shepherd-42").await;
    (server, root)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn setup_gates_the_api() {
    let server = TestServer::start().await;

    let (status, body) = server
        .call(reqwest::Method::GET, "/families", None, None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "setup_required");

    let setup = json!({
        "deploymentName": "First Church",
        "email": "pastor@example.org",
        "password": "shepherd-42",
        "displayName": "Pastor Ann"
    });
    let (status, _) = server.post("/setup", None, setup.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = server.post("/setup", None, setup).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_initialized");

    let (status, body) = server
        .call(reqwest::Method::GET, "/families", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn grace_scenario_over_http() {
    let (server, root) = initialized_server().await;

    let (status, grace) = server.post("/families", Some(&root), json!({ "name": "Grace" })).await;
    assert_eq!(status, StatusCode::CREATED, "{grace}");
    assert_eq!(grace["memberCount"], 0);
    let grace_id = grace["id"].as_str().unwrap().to_string();
    let (_, hope) = server.post("/families", Some(&root), json!({ "name": "Hope" })).await;
    let hope_id = hope["id"].as_str().unwrap().to_string();

    let (a_id, a) = server.sign_up_and_login("a@example.org", "Abigail").await;
    let (b_id, b) = server.sign_up_and_login("b@example.org", "Barnabas").await;

    let (status, joined) = server
        .post(&format!("/families/{grace_id}/join"), Some(&a), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{joined}");
    assert_eq!(joined["user"]["familyId"], grace_id.as_str());
    assert_eq!(server.member_count(&grace_id, &root).await, 1);

    // Joining again leaves the counter alone.
    server
        .post(&format!("/families/{grace_id}/join"), Some(&a), json!({}))
        .await;
    assert_eq!(server.member_count(&grace_id, &root).await, 1);

    let (status, promoted) = server
        .post(&format!("/users/{a_id}/promote"), Some(&root), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "admin");

    server
        .post(&format!("/families/{hope_id}/join"), Some(&b), json!({}))
        .await;
    server
        .post(&format!("/users/{b_id}/promote"), Some(&root), json!({}))
        .await;

    let (status, post) = server
        .post(
            &format!("/families/{grace_id}/posts"),
            Some(&a),
            json!({ "content": "Welcome to Grace", "type": "announcement" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    assert_eq!(post["authorName"], "Abigail");
    let post_id = post["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        server
            .post(&format!("/posts/{post_id}/like"), Some(&a), json!({}))
            .await;
    }
    let (_, liked) = server.get(&format!("/posts/{post_id}"), &a).await;
    assert_eq!(liked["likes"], json!([a_id.clone()]));

    let status = server.delete(&format!("/posts/{post_id}"), &b).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let status = server.delete(&format!("/posts/{post_id}"), &root).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let status = server.delete(&format!("/users/{a_id}"), &root).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(server.member_count(&grace_id, &root).await, 0);
    let (status, _) = server.get("/me", &a).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn family_request_approval_is_single_shot() {
    let (server, root) = initialized_server().await;
    let (_, ruth) = server.sign_up_and_login("ruth@example.org", "Ruth").await;

    let (status, request) = server
        .post(
            "/family-requests",
            Some(&ruth),
            json!({ "familyName": "Faith", "description": "Young adults" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    let request_id = request["id"].as_str().unwrap().to_string();

    let path = format!("/family-requests/{request_id}/approve");
    let (status, _) = server.post(&path, Some(&ruth), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = server.post(&path, Some(&root), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["family"]["memberCount"], 0);

    let (status, body) = server.post(&path, Some(&root), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (_, families) = server.get("/families", &root).await;
    assert_eq!(families.as_array().unwrap().len(), 1);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn media_upload_and_download() {
    let (server, root) = initialized_server().await;
    let (_, grace) = server.post("/families", Some(&root), json!({ "name": "Grace" })).await;
    let grace_id = grace["id"].as_str().unwrap().to_string();
    let (_, member) = server.sign_up_and_login("m@example.org", "Mary").await;
    server
        .post(&format!("/families/{grace_id}/join"), Some(&member), json!({}))
        .await;

    let form = reqwest::multipart::Form::new()
        .text("type", "photo")
        .text("title", "Picnic")
        .text("tags", "summer, picnic")
        .part(
            "file",
            reqwest::multipart::Part::bytes(PNG.to_vec()).file_name("picnic.png"),
        );
    let resp = server
        .client
        .post(server.url(&format!("/families/{grace_id}/media")))
        .bearer_auth(&member)
        .multipart(form)
        .send()
        .await
        .expect("upload");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let media: Value = resp.json().await.unwrap();
    assert_eq!(media["mime"], "image/png");
    let media_id = media["id"].as_str().unwrap().to_string();

    let resp = server
        .client
        .get(server.url(&format!("/media/{media_id}/file")))
        .bearer_auth(&member)
        .send()
        .await
        .expect("download");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), PNG);

    let (_, listing) = server
        .get(&format!("/families/{grace_id}/notifications"), &member)
        .await;
    // The join notice plus the upload notice.
    assert_eq!(listing["unread"], 2);
    assert_eq!(listing["notifications"][0]["type"], "media");

    let status = server.delete(&format!("/media/{media_id}"), &member).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    server.shutdown().await;
}

/// Reads a streaming body until `needle` shows up, or panics after a few
/// seconds of silence.
async fn read_until(resp: &mut reqwest::Response, needle: &str) -> String {
    let mut seen = String::new();
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), resp.chunk())
            .await
            .expect("stream stalled")
            .expect("stream error")
            .expect("stream ended early");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    seen
}

/// Drains a streaming body and returns what arrived before it closed.
async fn read_to_close(resp: &mut reqwest::Response) -> String {
    let mut seen = String::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), resp.chunk())
            .await
            .expect("stream stayed open");
        match next {
            Ok(Some(chunk)) => seen.push_str(&String::from_utf8_lossy(&chunk)),
            Ok(None) | Err(_) => return seen,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn family_stream_closes_when_access_ends() {
    let (server, root) = initialized_server().await;
    let (_, grace) = server.post("/families", Some(&root), json!({ "name": "Grace" })).await;
    let grace_id = grace["id"].as_str().unwrap().to_string();
    let (_, alice) = server.sign_up_and_login("alice@example.org", "Alice").await;
    let (_, bob) = server.sign_up_and_login("bob@example.org", "Bob").await;
    let (_, carol) = server.sign_up_and_login("carol@example.org", "Carol").await;
    for token in [&alice, &bob, &carol] {
        let (status, body) = server
            .post(&format!("/families/{grace_id}/join"), Some(token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let open_stream = |token: String| {
        server
            .client
            .get(server.url(&format!("/families/{grace_id}/events")))
            .bearer_auth(token)
            .send()
    };
    let mut alice_stream = open_stream(alice.clone()).await.expect("alice stream");
    assert_eq!(alice_stream.status(), StatusCode::OK);
    let mut carol_stream = open_stream(carol.clone()).await.expect("carol stream");
    assert_eq!(carol_stream.status(), StatusCode::OK);

    let (status, first) = server
        .post(&format!("/families/{grace_id}/posts"), Some(&bob), json!({ "content": "Hello" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let first_id = first["id"].as_str().unwrap().to_string();
    read_until(&mut alice_stream, &first_id).await;
    read_until(&mut carol_stream, &first_id).await;

    // Signing out ends the stream opened with that token.
    let (status, _) = server.post("/auth/logout", Some(&alice), json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Leaving the family ends the member's stream.
    let (status, body) = server.post("/me/leave", Some(&carol), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, second) = server
        .post(&format!("/families/{grace_id}/posts"), Some(&bob), json!({ "content": "Still here?" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{second}");
    let second_id = second["id"].as_str().unwrap().to_string();

    assert!(!read_to_close(&mut alice_stream).await.contains(&second_id));
    assert!(!read_to_close(&mut carol_stream).await.contains(&second_id));

    server.shutdown().await;
}
