//! End-to-end tests against an in-process mock NMOS node.
//!
//! The mock serves the IS-04 node API, an SDP manifest and the IS-05
//! staged/active resources of one receiver over real TCP on 127.0.0.1, so
//! the `reqwest` client and the negotiator run exactly as in the binary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use serde_json::{Value, json};

use nmos_patcher::discovery::{self, NodeApi};
use nmos_patcher::paths::receiver_base;
use nmos_patcher::{ApiError, ConnectionApi, HttpClient, NegotiateError, Negotiator, Phase};

const RECEIVER: &str = "/x-nmos/connection/v1.1/single/receivers/rx-1";

const SDP: &str = "v=0\n\
o=- 1443716955 1443716955 IN IP4 192.168.1.2\n\
s=Camera 1\n\
t=0 0\n\
m=video 50020 RTP/AVP 96\n\
c=IN IP4 239.100.1.1/64\n\
a=source-filter: incl IN IP4 239.100.1.1 192.168.1.2\n\
a=rtpmap:96 raw/90000\n\
a=mid:primary\n\
m=video 50022 RTP/AVP 96\n\
c=IN IP4 239.100.2.1/64\n\
a=source-filter: incl IN IP4 239.100.2.1 192.168.2.2\n\
a=rtpmap:96 raw/90000\n\
a=mid:secondary\n\n";

// ── Mock node ───────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    root: String,
    legs: usize,
    patches: Vec<(String, Value)>,
    active: Value,
}

#[derive(Clone, Default)]
struct Mock {
    inner: Arc<Mutex<Inner>>,
}

impl Mock {
    fn patches(&self) -> Vec<(String, Value)> {
        self.inner.lock().unwrap().patches.clone()
    }
}

async fn node_versions() -> Json<Value> {
    Json(json!(["v1.2/", "v1.3/"]))
}

async fn connection_versions() -> Json<Value> {
    Json(json!(["v1.0/", "v1.1/"]))
}

async fn senders(State(mock): State<Mock>) -> Json<Value> {
    let root = mock.inner.lock().unwrap().root.clone();
    Json(json!([
        {"id": "snd-0", "label": "No manifest", "manifest_href": null},
        {"id": "snd-1", "label": "Camera 1", "manifest_href": format!("{root}/sdp/snd-1.sdp")}
    ]))
}

async fn receivers() -> Json<Value> {
    Json(json!([
        {"id": "rx-1", "label": "Monitor", "format": "urn:x-nmos:format:video"}
    ]))
}

async fn manifest() -> &'static str {
    SDP
}

async fn get_staged(State(mock): State<Mock>) -> Json<Value> {
    let legs = mock.inner.lock().unwrap().legs;
    let params: Vec<Value> = (0..legs)
        .map(|_| json!({"destination_port": "auto", "multicast_ip": null, "rtp_enabled": true}))
        .collect();
    Json(json!({"master_enable": false, "transport_params": params}))
}

async fn patch_staged(
    State(mock): State<Mock>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut inner = mock.inner.lock().unwrap();
    inner.patches.push((uri.path().to_string(), body.clone()));

    if body["master_enable"] != true {
        return (StatusCode::OK, Json(body));
    }

    let count = body["transport_params"].as_array().map_or(0, Vec::len);
    if count != inner.legs {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 400, "error": "transport_params length mismatch"})),
        );
    }
    inner.active = body.clone();
    (StatusCode::ACCEPTED, Json(body))
}

async fn get_active(State(mock): State<Mock>) -> Json<Value> {
    Json(mock.inner.lock().unwrap().active.clone())
}

/// Start a node whose receiver routes only the given staged spellings.
async fn spawn_node(staged_spellings: &[&str], legs: usize) -> (String, Mock) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root = format!("http://{}", listener.local_addr().unwrap());

    let mock = Mock::default();
    {
        let mut inner = mock.inner.lock().unwrap();
        inner.root = root.clone();
        inner.legs = legs;
        inner.active = json!({"master_enable": false});
    }

    let mut app = Router::new()
        .route("/x-nmos/node/", get(node_versions))
        .route("/x-nmos/node/v1.3/senders/", get(senders))
        .route("/x-nmos/node/v1.3/receivers/", get(receivers))
        .route("/sdp/snd-1.sdp", get(manifest))
        .route("/x-nmos/connection/", get(connection_versions))
        .route(&format!("{RECEIVER}/active/"), get(get_active));
    for spelling in staged_spellings {
        app = app.route(
            &format!("{RECEIVER}{spelling}"),
            get(get_staged).patch(patch_staged),
        );
    }
    let app = app.with_state(mock.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (root, mock)
}

fn client() -> HttpClient {
    HttpClient::new(Some(Duration::from_secs(5))).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn sdp_from_manifest_reaches_active_state() {
    let (root, mock) = spawn_node(&["/staged/", "/staged"], 2).await;
    let client = client();

    let node = NodeApi::new(&client, root.clone());
    let version = node.version().await.unwrap();
    assert_eq!(version, "v1.3");

    let senders = node.senders(&version).await.unwrap();
    let sender = senders.iter().find(|s| s.id == "snd-1").unwrap();
    let sdp = discovery::fetch_manifest(&client, sender).await.unwrap();
    assert!(sdp.contains("a=mid:secondary"));

    let receivers = node.receivers(&version).await.unwrap();
    assert_eq!(receivers[0].id, "rx-1");

    let conn_version = discovery::connection_version(&client, &root).await.unwrap();
    assert_eq!(conn_version, "v1.1");
    let base = receiver_base(&root, &conn_version, &receivers[0].id);

    let mut negotiator = Negotiator::new(client).with_settle_delay(Duration::from_millis(10));
    let outcome = negotiator
        .run(&base, &sdp, Some(sender.id.as_str()))
        .await
        .unwrap();
    assert_eq!(negotiator.phase(), Phase::Done);
    assert!(outcome.path.staged.ends_with("/staged/"));

    let active = &outcome.active;
    assert_eq!(active["master_enable"], true);
    assert_eq!(active["sender_id"], "snd-1");
    assert_eq!(active["transport_file"]["type"], "application/sdp");
    assert_eq!(
        active["transport_params"],
        json!([
            {"destination_port": 50020, "multicast_ip": "239.100.1.1", "source_ip": "192.168.1.2", "rtp_enabled": true},
            {"destination_port": 50022, "multicast_ip": "239.100.2.1", "source_ip": "192.168.2.2", "rtp_enabled": true}
        ])
    );
    let data = active["transport_file"]["data"].as_str().unwrap();
    assert!(data.ends_with("a=mid:secondary\r\n"));
    assert!(!data.contains("\r\n\r\n"));

    let patches = mock.patches();
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[0].0, format!("{RECEIVER}/staged/"));
    assert_eq!(
        patches[0].1,
        json!({"activation": {"mode": "activate_immediate"}, "master_enable": false})
    );
    assert_eq!(patches[1].0, format!("{RECEIVER}/staged/"));
}

#[tokio::test]
async fn bare_staged_spelling_is_used_when_slash_is_not_routed() {
    let (root, mock) = spawn_node(&["/staged"], 2).await;
    let base = receiver_base(&root, "v1.1", "rx-1");

    let mut negotiator = Negotiator::new(client()).with_settle_delay(Duration::ZERO);
    let outcome = negotiator.run(&base, SDP, None).await.unwrap();

    assert_eq!(outcome.path.staged, format!("{base}/staged"));
    assert_eq!(outcome.path.active, format!("{base}/active/"));
    assert!(outcome.active.get("sender_id").is_none());

    let urls: Vec<String> = mock.patches().into_iter().map(|(url, _)| url).collect();
    // Only successful requests reach the handler; the slash probe was a 404.
    assert_eq!(urls, vec![format!("{RECEIVER}/staged"), format!("{RECEIVER}/staged")]);
}

#[tokio::test]
async fn single_leg_receiver_accepts_truncated_document() {
    let (root, _mock) = spawn_node(&["/staged/"], 1).await;
    let base = receiver_base(&root, "v1.1", "rx-1");

    let mut negotiator = Negotiator::new(client()).with_settle_delay(Duration::ZERO);
    let outcome = negotiator.run(&base, SDP, None).await.unwrap();

    assert_eq!(
        outcome.active["transport_params"],
        json!([{"destination_port": 50020, "multicast_ip": "239.100.1.1", "source_ip": "192.168.1.2", "rtp_enabled": true}])
    );
}

#[tokio::test]
async fn unrouted_receiver_fails_path_resolution() {
    let (root, mock) = spawn_node(&[], 2).await;
    let base = receiver_base(&root, "v1.1", "rx-1");

    let mut negotiator = Negotiator::new(client()).with_settle_delay(Duration::ZERO);
    let err = negotiator.run(&base, SDP, None).await.unwrap_err();

    assert_eq!(negotiator.phase(), Phase::Failed);
    match err {
        NegotiateError::PathResolution { attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|e| e.status() == Some(404)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(mock.patches().is_empty());
}

#[tokio::test]
async fn sender_without_manifest_is_reported() {
    let (root, _mock) = spawn_node(&[], 2).await;
    let client = client();
    let node = NodeApi::new(&client, root);
    let senders = node.senders("v1.3").await.unwrap();
    let err = discovery::fetch_manifest(&client, &senders[0]).await.unwrap_err();
    assert!(matches!(
        err,
        discovery::DiscoveryError::MissingManifest { ref sender_id } if sender_id == "snd-0"
    ));
}

#[tokio::test]
async fn non_200_read_is_a_fetch_error() {
    let (root, _mock) = spawn_node(&[], 2).await;
    let err = client()
        .fetch_json(&format!("{root}/x-nmos/node/v9.9/senders/"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Fetch { status: 404, .. }));
}
