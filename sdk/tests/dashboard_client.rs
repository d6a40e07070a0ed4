//! Tests of the REST client against a local HTTP responder.

use std::sync::Arc;
use std::time::Duration;

use fleetdesk_sdk::{
    ClientConfig, ClientError, DashboardClient, EventRouter, QueryCache, QueryFetcher, QueryKey,
    RouteOutcome,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// One request as the server saw it.
#[derive(Debug)]
struct Seen {
    head: String,
    body: String,
}

impl Seen {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

type Responder = fn(&str) -> (u16, String);

/// Serves one request per connection, answering with `respond(request_line)`.
async fn spawn_api(respond: Responder) -> (String, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some(seen) = read_request(&mut stream).await else {
                    return;
                };
                let (status, body) = respond(seen.request_line());
                let mut response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    status,
                    body.len()
                );
                if status == 429 {
                    response.push_str("Retry-After: 7\r\n");
                }
                response.push_str("\r\n");
                response.push_str(&body);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
                let _ = tx.send(seen);
            });
        }
    });

    (format!("http://{}/admin", addr), rx)
}

async fn read_request(stream: &mut TcpStream) -> Option<Seen> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(chunk.get(..n)?);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };

        let head = String::from_utf8_lossy(buf.get(..end)?).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                if key.trim().eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        let mut body = buf.get(end + 4..)?.to_vec();
        while body.len() < length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(chunk.get(..n)?);
        }
        return Some(Seen {
            head,
            body: String::from_utf8_lossy(&body).to_string(),
        });
    }
}

fn client(base_url: &str) -> DashboardClient {
    let config = ClientConfig::new(base_url)
        .with_session_token("tok-123")
        .with_max_retries(0)
        .with_timeout(Duration::from_secs(5));
    DashboardClient::new(config).expect("client")
}

fn api(request_line: &str) -> (u16, String) {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    match (method, path) {
        ("GET", "/admin/orders") => (200, json!([{"id": "o1", "status": "new"}]).to_string()),
        ("POST", "/admin/messages") => (201, json!({"id": "m1", "body": "hi"}).to_string()),
        ("GET", "/admin/users") => (401, String::new()),
        ("GET", "/admin/settings") => (403, String::new()),
        ("GET", "/admin/transactions") => (
            409,
            json!({"error": {"code": "ESCROW_PENDING", "message": "escrow not released"}})
                .to_string(),
        ),
        ("GET", "/admin/stats") => (500, "upstream down".to_string()),
        ("GET", "/admin/reports") => (200, "<html>".to_string()),
        ("GET", "/admin/busy") => (429, String::new()),
        _ => (404, String::new()),
    }
}

#[tokio::test]
async fn test_fetch_sends_session_cookie() {
    let (url, mut seen) = spawn_api(api).await;
    let client = client(&url);

    let orders = client.fetch(&QueryKey::new("orders")).await.expect("orders");
    assert_eq!(orders, json!([{"id": "o1", "status": "new"}]));

    let request = seen.recv().await.expect("request");
    assert_eq!(request.request_line(), "GET /admin/orders HTTP/1.1");
    assert!(request
        .header("cookie")
        .is_some_and(|cookie| cookie.contains("session=tok-123")));
}

#[tokio::test]
async fn test_post_json_sends_body() {
    let (url, mut seen) = spawn_api(api).await;
    let client = client(&url);

    let created = client
        .post_json("/messages", &json!({"body": "hi"}))
        .await
        .expect("created");
    assert_eq!(created, json!({"id": "m1", "body": "hi"}));

    let request = seen.recv().await.expect("request");
    assert_eq!(request.request_line(), "POST /admin/messages HTTP/1.1");
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body, json!({"body": "hi"}));
}

#[tokio::test]
async fn test_status_mapping() {
    let (url, _seen) = spawn_api(api).await;
    let client = client(&url);
    let fetch = |key: &'static str| {
        let client = client.clone();
        async move { client.fetch(&QueryKey::new(key)).await }
    };

    assert!(matches!(fetch("users").await, Err(ClientError::SessionExpired)));
    assert!(matches!(
        fetch("settings").await,
        Err(ClientError::Forbidden(path)) if path == "/settings"
    ));
    assert!(matches!(
        fetch("missing").await,
        Err(ClientError::NotFound(path)) if path == "/missing"
    ));
    assert!(matches!(
        fetch("transactions").await,
        Err(ClientError::Api { status: 409, ref code, .. }) if code == "ESCROW_PENDING"
    ));
    assert!(matches!(
        fetch("stats").await,
        Err(ClientError::Http { status: 500, ref body }) if body == "upstream down"
    ));
    assert!(matches!(
        fetch("reports").await,
        Err(ClientError::InvalidResponse(_))
    ));
    assert!(matches!(
        fetch("busy").await,
        Err(ClientError::RateLimited {
            retry_after: Some(7)
        })
    ));
}

#[tokio::test]
async fn test_routed_event_refetches_through_client() {
    let (url, _seen) = spawn_api(api).await;
    let fetcher: Arc<dyn QueryFetcher> = Arc::new(client(&url));
    let cache = Arc::new(QueryCache::new(fetcher));
    let router = EventRouter::new(Arc::clone(&cache));

    let outcome = router.route(r#"{"type":"order_status_changed"}"#).await;

    assert!(matches!(outcome, RouteOutcome::Refetched { ref failed, .. } if failed.is_empty()));
    assert_eq!(
        cache.get(&QueryKey::new("orders")).await,
        Some(json!([{"id": "o1", "status": "new"}]))
    );

    let outcome = router.route(r#"{"type":"stats_updated"}"#).await;
    assert!(matches!(outcome, RouteOutcome::Refetched { ref failed, .. } if failed.len() == 1));
    assert!(cache.is_stale(&QueryKey::new("stats")).await);
}
