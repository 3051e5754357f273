use axum::{routing::get, Json, Router};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct RangeWindow {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    current: RangeWindow,
    comparison: RangeWindow,
    span_days: i64,
    granularity: String,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

/// Stand-in analytics API. Only the funnel endpoint answers; everything else 404s.
static UPSTREAM: Lazy<String> = Lazy::new(|| {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream port");
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("upstream runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("upstream listener");
            axum::serve(listener, upstream_app())
                .await
                .expect("upstream server");
        });
    });

    format!("http://{addr}")
});

fn upstream_app() -> Router {
    Router::new().route(
        "/traffic/conversion-funnel/comparison",
        get(|| async { Json(funnel_fixture()) }),
    )
}

fn funnel_fixture() -> Value {
    json!({
        "current": { "funnel_steps": [
            { "step": "1.浏览", "users": 1000, "conversion_rate": "-" },
            { "step": "2.加购", "users": 420, "conversion_rate": "42.0%" }
        ]},
        "previous": { "funnel_steps": [
            { "step": "1.浏览", "users": 800, "conversion_rate": "-" },
            { "step": "2.加购", "users": 0, "conversion_rate": "0%" }
        ]},
        "comparison": { "steps": [
            { "step": "1.浏览", "change_rate": 25.0, "change_amount": 200 },
            { "step": "2.加购", "change_rate": 100.0, "change_amount": 420 }
        ]}
    })
}

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_metrics_dashboard"))
        .env("PORT", port.to_string())
        .env("ANALYTICS_API_BASE", UPSTREAM.as_str())
        .env("ANALYTICS_TIMEOUT_SECS", "5")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

#[tokio::test]
async fn http_range_resolves_preset() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let range: RangeResponse = client
        .get(format!("{}/api/range?range=last_7_days", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(range.span_days, 7);
    assert_eq!(range.granularity, "daily");
    assert!(range.current.from.ends_with("T00:00:00Z"));
    assert!(range.current.to.ends_with("T23:59:59Z"));
    assert!(range.comparison.to < range.current.from);
    assert!(range.comparison.from.ends_with("T00:00:00Z"));
}

#[tokio::test]
async fn http_range_rejects_bad_input() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let unknown = client
        .get(format!("{}/api/range?range=last_year", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let inverted = client
        .get(format!(
            "{}/api/pages/overview?from=2024-03-10&to=2024-03-01",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);
    let message = inverted.text().await.unwrap();
    assert!(message.contains("after"), "unexpected message: {message}");

    let missing = client
        .get(format!("{}/api/pages/admin", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_page_degrades_failed_sections() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let report: Value = client
        .get(format!(
            "{}/api/pages/conversion?range=last_7_days",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(report.get("banner").is_none());
    let funnel = &report["sections"]["funnel"];
    assert_eq!(funnel["status"], "ready");
    assert_eq!(
        funnel["data"]["points"][0],
        json!({ "id": "浏览", "value": 100.0, "label": "100%" })
    );
    assert_eq!(funnel["data"]["points"][1]["id"], "加购");
    assert_eq!(funnel["data"]["points"][1]["value"], 42.0);
    assert!(funnel["data"]["cards"][1].get("change").is_none());
    assert_eq!(report["sections"]["conversion_trend"]["status"], "no_data");
}

#[tokio::test]
async fn http_primary_failure_sets_banner() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let report: Value = client
        .get(format!("{}/api/pages/search?range=today", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        report["banner"],
        "failed to load data, please try again later"
    );
    assert_eq!(report["sections"]["search_stats"]["status"], "no_data");
    assert_eq!(report["range"]["label"], "Today");
}

#[tokio::test]
async fn http_selection_updates_view() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/pages/conversion/selection", server.base_url))
        .json(&json!({ "range": "yesterday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted: Value = response.json().await.unwrap();
    let generation = accepted["generation"].as_u64().unwrap();
    assert!(generation >= 1);
    assert_eq!(accepted["range"]["label"], "Yesterday");

    let deadline = Instant::now() + Duration::from_secs(3);
    let view = loop {
        let view: Value = client
            .get(format!("{}/api/pages/conversion/view", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if view["sections"]["funnel"]["status"] != "loading" {
            break view;
        }
        if Instant::now() > deadline {
            panic!("funnel never finished loading");
        }
        sleep(Duration::from_millis(50)).await;
    };

    assert_eq!(view["generation"].as_u64(), Some(generation));
    assert_eq!(view["sections"]["funnel"]["status"], "ready");

    let rejected = client
        .post(format!("{}/api/pages/conversion/selection", server.base_url))
        .json(&json!({ "from": "2024-03-10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let after: Value = client
        .get(format!("{}/api/pages/conversion/view", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["generation"].as_u64(), Some(generation));
    assert_eq!(after["sections"]["funnel"]["status"], "ready");
    assert!(after["validation_error"].as_str().unwrap().contains("required"));
}
