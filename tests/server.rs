//! HTTP API end-to-end: sessions, filing, tracking, reports and stats,
//! served over a real socket with a scripted oracle and in-memory store.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cyberguard::config::ServerConfig;
use cyberguard::server::{router, AppState};
use cyberguard::services::Services;
use cyberguard::speech::{DisabledRecognizer, DisabledSynthesizer};
use cyberguard_core::store::memory::InMemoryStore;
use cyberguard_core::traits::{Blob, DisabledNotifier, GenerativeModel, OracleError};

/// Echo translation and extraction; categorize everything as financial fraud.
struct ScriptedOracle;

#[async_trait]
impl GenerativeModel for ScriptedOracle {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, blob: Option<Blob<'_>>) -> Result<String, OracleError> {
        if let Some(blob) = blob {
            return Ok(format!("An image of {} bytes", blob.data.len()));
        }
        if prompt.contains("expert cybercrime analyst") {
            return Ok("Category: Financial Fraud\nExplanation: Money was taken through a fake bank call.".into());
        }
        if let Some((_, text)) = prompt.split_once("Text to translate: ") {
            return Ok(text.to_string());
        }
        if let Some((_, rest)) = prompt.split_once("Response: ") {
            return Ok(rest.lines().next().unwrap_or_default().to_string());
        }
        Err(OracleError::Disabled)
    }
}

async fn start_server() -> String {
    start_server_with(ServerConfig::default()).await.0
}

async fn start_server_with(settings: ServerConfig) -> (String, AppState) {
    let services = Services::assemble(
        Arc::new(ScriptedOracle),
        Arc::new(InMemoryStore::new()),
        Arc::new(DisabledNotifier),
        Arc::new(DisabledRecognizer),
        Arc::new(DisabledSynthesizer),
    );
    let state = AppState::with_settings(Arc::new(services), &settings);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    wait_for_server(port).await;
    (format!("http://127.0.0.1:{}", port), state)
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn turn(client: &reqwest::Client, base: &str, id: &str, body: Value) -> Value {
    let resp = client
        .post(format!("{}/sessions/{}/turns", base, id))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn new_session(client: &reqwest::Client, base: &str) -> String {
    let session: Value = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    session["id"].as_str().unwrap().to_string()
}

/// A turn at the evidence question carrying one `bytes`-sized screenshot.
async fn send_evidence(
    client: &reqwest::Client,
    base: &str,
    id: &str,
    bytes: usize,
) -> reqwest::Response {
    let shot = base64::engine::general_purpose::STANDARD.encode(vec![0x89u8; bytes]);
    client
        .post(format!("{}/sessions/{}/turns", base, id))
        .json(&json!({ "text": "chat screenshot", "attachments": [{ "name": "chat.png", "content": shot }] }))
        .send()
        .await
        .unwrap()
}

fn silent_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..1600 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_languages() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let langs: Value = client
        .get(format!("{}/languages", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let langs = langs.as_array().unwrap();
    assert_eq!(langs.len(), 23);
    assert!(langs
        .iter()
        .any(|l| l["name"] == "Hindi" && l["locale"] == "hi-IN"));
}

#[tokio::test]
async fn test_session_interview_file_and_track() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/sessions", base))
        .json(&json!({ "language": "English" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let session: Value = resp.json().await.unwrap();
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(
        session["prompt"],
        "What is your full name and contact phone number?"
    );
    assert_eq!(session["speak"], true);
    assert_eq!(session["phase"]["state"], "awaiting_input");

    // Filing before completion is a conflict.
    let early = client
        .post(format!("{}/sessions/{}/file", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(early.status(), 409);

    for answer in ["Asha Rao 9876543210", "asha@example.in", "yesterday 6pm"] {
        let r = turn(&client, &base, &id, json!({ "text": answer })).await;
        assert_eq!(r["outcome"]["outcome"], "moved");
    }

    let r = turn(&client, &base, &id, json!({ "text": "maybe" })).await;
    assert_eq!(r["outcome"]["outcome"], "reprompt");
    assert_eq!(r["outcome"]["message"], "Please respond with 'yes' or 'no'.");
    assert_eq!(r["session"]["current_index"], 3);

    for answer in ["no", "yes", "no", "no"] {
        turn(&client, &base, &id, json!({ "text": answer })).await;
    }
    turn(
        &client,
        &base,
        &id,
        json!({ "text": "A caller posing as my bank took the OTP." }),
    )
    .await;

    let shot = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG fake");
    let r = turn(
        &client,
        &base,
        &id,
        json!({ "text": "screenshot of the call", "attachments": [{ "name": "call.PNG", "content": shot }] }),
    )
    .await;
    assert_eq!(r["outcome"]["outcome"], "completed");
    assert_eq!(r["outcome"]["categorization"]["category"], "Financial Fraud");
    assert_eq!(r["session"]["phase"]["state"], "complete");
    assert_eq!(r["session"]["progress"], 1.0);
    assert_eq!(r["session"]["attachments"], 1);
    assert!(r["session"]["prompt"].is_null());

    let resp = client
        .post(format!("{}/sessions/{}/file", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let receipt: Value = resp.json().await.unwrap();
    let ticket = receipt["ticket_id"].as_str().unwrap().to_string();
    assert!(ticket.starts_with("CYBER-"));
    assert_eq!(receipt["record"]["status"], "Under Investigation");
    assert_eq!(receipt["notification"]["status"], "failed");
    assert!(receipt["warning"].is_string());

    // A session files once.
    let again = client
        .post(format!("{}/sessions/{}/file", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 409);
    let err: Value = again.json().await.unwrap();
    assert_eq!(err["error"]["code"], "conflict");

    let tracked: Value = client
        .get(format!("{}/complaints/{}", base, ticket.to_lowercase()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tracked["ticket_id"], ticket.as_str());
    assert_eq!(tracked["category"], "Financial Fraud");
    assert_eq!(tracked["status"], "Under Investigation");

    let pdf = client
        .get(format!("{}/complaints/{}/report.pdf", base, ticket))
        .send()
        .await
        .unwrap();
    assert_eq!(pdf.status(), 200);
    assert_eq!(
        pdf.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    assert!(pdf.bytes().await.unwrap().starts_with(b"%PDF"));

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats, json!({ "total": 1, "resolved": 0, "active": 1 }));
}

#[tokio::test]
async fn test_silent_audio_turn_reports_notice() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    // No body: default language.
    let session: Value = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["language"], "English");
    let id = session["id"].as_str().unwrap();

    let audio = base64::engine::general_purpose::STANDARD.encode(silent_wav());
    let r = turn(&client, &base, id, json!({ "audio": audio })).await;
    assert_eq!(r["notice"], "No sound detected in audio.");
    assert!(r["outcome"].is_null());
    assert_eq!(r["session"]["current_index"], 0);
    assert_eq!(r["session"]["transcript"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_delete_session_and_errors() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let bad = client
        .post(format!("{}/sessions", base))
        .json(&json!({ "language": "Klingon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    let session: Value = client
        .post(format!("{}/sessions", base))
        .json(&json!({ "language": "ta-IN" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["language"], "Tamil");
    let id = session["id"].as_str().unwrap();

    let deleted = client
        .delete(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let gone = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
    let err: Value = gone.json().await.unwrap();
    assert_eq!(err["error"]["code"], "not_found");

    let missing = client
        .get(format!("{}/complaints/CYBER-00000000", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_form_submission() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let rejected = client
        .post(format!("{}/complaints", base))
        .json(&json!({ "name_phone": "Asha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 400);
    let err: Value = rejected.json().await.unwrap();
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("incident_description"));

    let resp = client
        .post(format!("{}/complaints", base))
        .json(&json!({
            "language": "English",
            "name_phone": "Asha 98765",
            "email": "",
            "incident_date": "today",
            "financial_scam": "Yes",
            "incident_description": "Fake KYC link drained my wallet",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let receipt: Value = resp.json().await.unwrap();
    assert_eq!(receipt["record"]["category"], "Financial Fraud");
    assert_eq!(receipt["record"]["answers"]["financial_scam"], "yes");
    assert_eq!(receipt["notification"]["status"], "skipped");
    assert!(receipt["warning"].is_null());
}

#[tokio::test]
async fn test_large_evidence_upload_is_accepted() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let id = new_session(&client, &base).await;
    for _ in 0..8 {
        turn(&client, &base, &id, json!({ "text": "next" })).await;
    }

    let resp = send_evidence(&client, &base, &id, 3 * 1024 * 1024).await;
    assert_eq!(resp.status(), 200);
    let r: Value = resp.json().await.unwrap();
    assert_eq!(r["outcome"]["outcome"], "completed");
    assert_eq!(r["session"]["attachments"], 1);
}

#[tokio::test]
async fn test_body_over_configured_limit_is_rejected() {
    let settings = ServerConfig {
        max_body_mb: 1,
        ..ServerConfig::default()
    };
    let (base, _state) = start_server_with(settings).await;
    let client = reqwest::Client::new();
    let id = new_session(&client, &base).await;
    for _ in 0..8 {
        turn(&client, &base, &id, json!({ "text": "next" })).await;
    }

    let resp = send_evidence(&client, &base, &id, 2 * 1024 * 1024).await;
    assert_eq!(resp.status(), 413);

    // The session is untouched and still waiting at the evidence question.
    let session: Value = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["current_index"], 8);
    assert_eq!(session["attachments"], 0);
}

#[tokio::test]
async fn test_filed_session_leaves_memory() {
    let (base, state) = start_server_with(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let id = new_session(&client, &base).await;
    turn(&client, &base, &id, json!({ "text": "Asha 98765" })).await;
    let r = turn(&client, &base, &id, json!({ "text": "submit" })).await;
    assert_eq!(r["outcome"]["outcome"], "completed");
    assert_eq!(state.session_count(), 1);

    let filed = client
        .post(format!("{}/sessions/{}/file", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(filed.status(), 201);
    assert_eq!(state.session_count(), 0);

    let after: Value = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["error"]["code"], "conflict");

    // The filed marker is forgotten once the idle window passes.
    state.expire_idle_sessions(Instant::now() + Duration::from_secs(31 * 60));
    let gone = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_idle_sessions_expire() {
    let (base, state) = start_server_with(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let first = new_session(&client, &base).await;
    let second = new_session(&client, &base).await;
    turn(&client, &base, &second, json!({ "text": "Asha 98765" })).await;
    assert_eq!(state.session_count(), 2);

    assert_eq!(state.expire_idle_sessions(Instant::now()), 0);
    assert_eq!(state.session_count(), 2);

    let later = Instant::now() + Duration::from_secs(31 * 60);
    assert_eq!(state.expire_idle_sessions(later), 2);
    assert_eq!(state.session_count(), 0);

    for id in [first, second] {
        let resp = client
            .get(format!("{}/sessions/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
