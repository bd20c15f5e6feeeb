use std::io::Write;
use std::time::Duration;

use rstest::rstest;
use tgrelay_core::deploy::{Credential, DestinationId, InlineButton};
use tgrelay_core::remote::{MessageId, MessagingClient, OutgoingDocument, RemoteError};
use tgrelay_core::session::{BotIdentity, Session};
use tgrelay_core::storage::ChunkSource;
use tgrelay_shared::TelegramConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const TOKEN: &str = "123:ABC";

fn client_for(base_url: &str) -> TelegramClient {
    retrying_client_for(base_url, 0)
}

fn retrying_client_for(base_url: &str, max_retries: u32) -> TelegramClient {
    let config = TelegramConfig {
        api_base_url: base_url.to_string(),
        request_timeout_secs: 10,
        max_retries,
        retry_delay_secs: 0,
        ..Default::default()
    };
    TelegramClient::new(&config).expect("client")
}

fn session() -> Session {
    let credential = Credential::parse(TOKEN).expect("valid token");
    Session::new(
        credential,
        BotIdentity {
            id: 123,
            username: Some("deploy_bot".into()),
            first_name: "Deploy".into(),
        },
    )
}

fn document(file: &tempfile::NamedTempFile, len: u64) -> OutgoingDocument {
    OutgoingDocument {
        destination: DestinationId::parse("-1001234").expect("valid"),
        filename: "release.apk".into(),
        caption: Some("v1.2".into()),
        button: None,
        content: ChunkSource::new(file.path(), 4, len),
    }
}

fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content).expect("write");
    file.flush().expect("flush");
    file
}

fn sent_message(message_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "ok": true,
        "result": { "message_id": message_id, "chat": { "id": -1_001_234, "type": "channel" } }
    }))
}

#[test]
fn test_method_url() {
    let client = client_for("https://api.telegram.org");
    assert_eq!(
        client.method_url(TOKEN, "getMe"),
        "https://api.telegram.org/bot123:ABC/getMe"
    );
    assert_eq!(
        client.method_url(TOKEN, "sendDocument"),
        "https://api.telegram.org/bot123:ABC/sendDocument"
    );
}

#[test]
fn test_method_url_trims_trailing_slash() {
    let client = client_for("http://localhost:8081/");
    assert_eq!(
        client.method_url(TOKEN, "getMe"),
        "http://localhost:8081/bot123:ABC/getMe"
    );
}

#[rstest]
#[case("short", 5)]
#[case(&"x".repeat(CAPTION_LIMIT), CAPTION_LIMIT)]
#[case(&"y".repeat(CAPTION_LIMIT + 10), CAPTION_LIMIT)]
#[case(&"é".repeat(CAPTION_LIMIT + 1), CAPTION_LIMIT)]
fn test_truncate_caption(#[case] caption: &str, #[case] expected_chars: usize) {
    assert_eq!(truncate_caption(caption).chars().count(), expected_chars);
}

#[test]
fn test_retry_policy_prefers_platform_delay() {
    let policy = RetryPolicy {
        max_retries: 2,
        delay: Duration::from_secs(5),
    };
    let limited = RemoteError::RateLimited {
        retry_after: Some(9),
        detail: "slow down".into(),
    };
    assert_eq!(policy.delay_for(&limited), Duration::from_secs(9));
    assert_eq!(
        policy.delay_for(&RemoteError::Network("reset".into())),
        Duration::from_secs(5)
    );
}

#[test]
fn test_retry_policy_from_config() {
    let config = TelegramConfig {
        max_retries: 3,
        retry_delay_secs: 2,
        ..Default::default()
    };
    assert_eq!(
        RetryPolicy::from(&config),
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_secs(2)
        }
    );
}

#[tokio::test]
async fn test_authenticate_returns_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bot123:ABC/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": { "id": 123, "is_bot": true, "first_name": "Deploy", "username": "deploy_bot" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let identity = client
        .authenticate(&Credential::parse(TOKEN).expect("valid"))
        .await
        .expect("identity");

    assert_eq!(identity.id, 123);
    assert_eq!(identity.username.as_deref(), Some("deploy_bot"));
}

#[tokio::test]
async fn test_authenticate_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bot123:ABC/getMe"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "ok": false, "error_code": 401, "description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .authenticate(&Credential::parse(TOKEN).expect("valid"))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Unauthorized(ref d) if d == "Unauthorized"));
}

#[tokio::test]
async fn test_send_document_streams_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(sent_message(77))
        .expect(1)
        .mount(&server)
        .await;

    let file = temp_file(b"0123456789");
    let mut doc = document(&file, 10);
    doc.button = Some(InlineButton {
        text: "Download".into(),
        url: "https://example.com/app".into(),
    });

    let message_id = client_for(&server.uri())
        .send_document(&session(), &doc)
        .await
        .expect("sent");
    assert_eq!(message_id, MessageId(77));

    let requests = server.received_requests().await.expect("recording enabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"chat_id\""));
    assert!(body.contains("-1001234"));
    assert!(body.contains("name=\"caption\""));
    assert!(body.contains("v1.2"));
    assert!(body.contains("filename=\"release.apk\""));
    assert!(body.contains("0123456789"));
    assert!(body.contains("inline_keyboard"));
    assert!(body.contains("https://example.com/app"));
}

#[tokio::test]
async fn test_send_document_without_button_omits_markup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(sent_message(1))
        .mount(&server)
        .await;

    let file = temp_file(b"abc");
    let mut doc = document(&file, 3);
    doc.caption = None;
    client_for(&server.uri())
        .send_document(&session(), &doc)
        .await
        .expect("sent");

    let requests = server.received_requests().await.expect("recording enabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("reply_markup"));
    assert!(!body.contains("name=\"caption\""));
}

#[tokio::test]
async fn test_rate_limit_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 30",
            "parameters": { "retry_after": 30 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = temp_file(b"abc");
    let err = client_for(&server.uri())
        .send_document(&session(), &document(&file, 3))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RemoteError::RateLimited {
            retry_after: Some(30),
            ..
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_retry_restarts_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": { "retry_after": 0 }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(sent_message(5))
        .mount(&server)
        .await;

    let file = temp_file(b"restartable");
    let client = retrying_client_for(&server.uri(), 1);
    let message_id = client
        .send_document(&session(), &document(&file, 11))
        .await
        .expect("sent after retry");

    assert_eq!(message_id, MessageId(5));
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert!(String::from_utf8_lossy(&request.body).contains("restartable"));
    }
}

#[tokio::test]
async fn test_chat_not_found_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let file = temp_file(b"abc");
    let client = retrying_client_for(&server.uri(), 3);
    let err = client
        .send_document(&session(), &document(&file, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Rejected { code: 400, .. }));
    // Rejections are not retried.
    assert_eq!(server.received_requests().await.expect("recording").len(), 1);
}

#[tokio::test]
async fn test_migrated_chat_names_new_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: group chat was upgraded to a supergroup chat",
            "parameters": { "migrate_to_chat_id": -1_009_876 }
        })))
        .mount(&server)
        .await;

    let file = temp_file(b"abc");
    let err = client_for(&server.uri())
        .send_document(&session(), &document(&file, 3))
        .await
        .unwrap_err();

    assert!(
        matches!(err, RemoteError::Rejected { code: 400, ref description } if description.contains("-1009876"))
    );
}

#[tokio::test]
async fn test_non_json_error_uses_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendDocument"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let file = temp_file(b"abc");
    let err = client_for(&server.uri())
        .send_document(&session(), &document(&file, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Unauthorized(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let file = temp_file(b"abc");
    let err = client_for("http://127.0.0.1:1")
        .send_document(&session(), &document(&file, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Network(_)));
    assert!(!err.to_string().contains("ABC"));
}

#[tokio::test]
async fn test_get_updates_decodes_chats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bot123:ABC/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": [
                { "update_id": 10, "message": { "message_id": 1, "chat": { "id": -42, "type": "group", "title": "QA" } } }
            ]
        })))
        .mount(&server)
        .await;

    let updates = client_for(&server.uri())
        .get_updates(&Credential::parse(TOKEN).expect("valid"))
        .await
        .expect("updates");

    assert_eq!(updates.len(), 1);
    let chat = updates[0].chat().expect("chat");
    assert_eq!(chat.id, -42);
    assert_eq!(chat.title.as_deref(), Some("QA"));
}
