mod common;

use common::*;
use gpapi::{APIError, HttpResponse, MediaType, ProgressFn};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

const TRANSFER_URL: &str =
    "https://photos.google.com/_/upload/photos/resumable?authuser=0&upload_id=ADPycdu&upload_protocol=resumable";

fn session_started() -> HttpResponse {
    HttpResponse::new(
        200,
        json!({
            "sessionStatus": {
                "state": "OPEN",
                "externalFieldTransfers": [{
                    "name": "file",
                    "status": "IN_PROGRESS",
                    "bytesTransferred": 0,
                    "totalBytesTransferred": 0,
                    "putInfo": {"url": TRANSFER_URL},
                    "content_type": "application/octet-stream"
                }],
                "upload_id": "ADPycdu"
            }
        })
        .to_string(),
    )
}

fn transfer_finished(state: &str, info: Value) -> HttpResponse {
    HttpResponse::new(
        200,
        json!({
            "sessionStatus": {
                "state": state,
                "externalFieldTransfers": [{"name": "file", "status": "COMPLETED"}],
                "additionalInfo": {
                    "uploader_service.GoogleRupioAdditionalInfo": {
                        "completionInfo": {
                            "status": "SUCCESS",
                            "customerSpecificInfo": info
                        }
                    }
                },
                "upload_id": "ADPycdu"
            }
        })
        .to_string(),
    )
}

fn media_info() -> Value {
    json!({
        "photoMediaKey": "M1",
        "timestamp": "1600000000",
        "kind": "video",
        "title": "clip.mp4",
        "description": "",
        "url": "https://lh3.googleusercontent.com/M1",
        "width": 1920,
        "height": "1080"
    })
}

#[tokio::test]
async fn uploads_exact_bytes_to_advertised_url() {
    let transport = ScriptedTransport::new([session_started(), transfer_finished("FINALIZED", media_info())]);
    let client = client(&transport);
    let data = b"0123456789".to_vec();

    let photo = client
        .upload(&session(), Cursor::new(data.clone()), 10, "clip.mp4", None)
        .await
        .unwrap();

    assert_eq!(photo.id, "M1");
    assert_eq!(photo.media_type, MediaType::Video);
    assert_eq!(photo.created_at.timestamp(), 1_600_000_000);
    assert_eq!((photo.width, photo.height), (1920, 1080));
    assert_eq!(photo.title.as_deref(), Some("clip.mp4"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);

    let start = &requests[0];
    assert_eq!(
        start.url,
        "https://photos.google.com/_/upload/photos/resumable?authuser=0"
    );
    let (content_type, body) = start.text.clone().unwrap();
    assert_eq!(content_type, "application/x-www-form-urlencoded;charset=UTF-8");
    let template: Value = serde_json::from_str(&body).unwrap();
    let fields = template["createSessionRequest"]["fields"].as_array().unwrap();
    assert_eq!(fields[0]["external"]["filename"], "clip.mp4");
    assert_eq!(fields[0]["external"]["size"], 10);
    assert!(
        fields
            .iter()
            .any(|f| f["inlined"]["name"] == "effective_id" && f["inlined"]["content"] == USER_ID)
    );

    let transfer = &requests[1];
    assert_eq!(transfer.url, TRANSFER_URL);
    assert_eq!(transfer.bytes, data);
    assert_eq!(transfer.header("X-HTTP-Method-Override"), Some("PUT"));
    assert_eq!(transfer.header("Content-Type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn unfinished_upload_is_rejected_with_state() {
    let transport = ScriptedTransport::new([session_started(), transfer_finished("FAILED", json!({}))]);
    let client = client(&transport);

    match client
        .upload(&session(), Cursor::new(vec![1u8; 10]), 10, "a.jpg", None)
        .await
    {
        Err(APIError::UploadFailed { state }) => assert_eq!(state, "FAILED"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn transfer_without_session_status_is_a_failed_upload() {
    let transport = ScriptedTransport::new([
        session_started(),
        HttpResponse::new(200, json!({"upload_id": "ADPycdu"}).to_string()),
    ]);
    let client = client(&transport);

    match client
        .upload(&session(), Cursor::new(vec![1u8; 4]), 4, "a.jpg", None)
        .await
    {
        Err(APIError::UploadFailed { state }) => assert!(state.is_empty()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn refused_session_never_reads_the_stream() {
    let transport = ScriptedTransport::new([HttpResponse::new(403, "")]);
    let client = client(&transport);

    let result = client
        .upload(&session(), Cursor::new(vec![0u8; 10]), 10, "a.jpg", None)
        .await;
    assert!(matches!(result, Err(APIError::UploadSession(_))));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn session_without_transfer_url_is_an_upload_session_error() {
    let transport = ScriptedTransport::new([HttpResponse::new(
        200,
        json!({"errorMessage": {"reason": "REQUEST_REJECTED"}}).to_string(),
    )]);
    let client = client(&transport);

    let result = client
        .upload(&session(), Cursor::new(vec![0u8; 10]), 10, "a.jpg", None)
        .await;
    assert!(matches!(result, Err(APIError::UploadSession(_))));
}

#[tokio::test]
async fn progress_reports_cumulative_bytes() {
    let size = 600 * 1024;
    let transport = ScriptedTransport::new([session_started(), transfer_finished("FINALIZED", media_info())]);
    let client = client(&transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |sent| sink.lock().unwrap().push(sent));

    client
        .upload(&session(), Cursor::new(vec![7u8; size]), size as u64, "big.bin", Some(progress))
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![256 * 1024, 512 * 1024, 600 * 1024]);
    assert_eq!(transport.requests()[1].bytes.len(), size);
}

#[tokio::test]
async fn empty_filename_becomes_timestamp() {
    let transport = ScriptedTransport::new([session_started(), transfer_finished("FINALIZED", media_info())]);
    let client = client(&transport);

    client
        .upload(&session(), Cursor::new(vec![0u8; 3]), 3, "", None)
        .await
        .unwrap();

    let (_, body) = transport.requests()[0].text.clone().unwrap();
    let template: Value = serde_json::from_str(&body).unwrap();
    let filename = template["createSessionRequest"]["fields"][0]["external"]["filename"]
        .as_str()
        .unwrap()
        .to_owned();
    assert!(!filename.is_empty());
    assert!(filename.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn upload_file_uses_base_name_and_size() {
    let dir = std::env::temp_dir().join(format!("gpapi-upload-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("IMG_2041.JPG");
    std::fs::write(&path, b"jpeg-bytes").unwrap();

    let transport = ScriptedTransport::new([session_started(), transfer_finished("FINALIZED", media_info())]);
    let client = client(&transport);

    client.upload_file(&session(), &path, None).await.unwrap();

    let requests = transport.requests();
    let (_, body) = requests[0].text.clone().unwrap();
    let template: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        template["createSessionRequest"]["fields"][0]["external"],
        json!({"name": "file", "filename": "IMG_2041.JPG", "put": {}, "size": 10})
    );
    assert_eq!(requests[1].bytes, b"jpeg-bytes");

    std::fs::remove_dir_all(&dir).unwrap();
}
