use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use server::repo::{ComplaintScope, Repository};
use shared_types::{ComplaintFilter, Role};
use std::sync::Arc;

use crate::common::{complaint_form, get_raw, send_multipart, FailingStore, Form, TestApp};

const PHOTO: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png but close enough";

async fn file_with_photo(app: &TestApp, token: &str) -> serde_json::Value {
    let form = complaint_form("Sector 5").file("evidence", "scene.png", "image/png", PHOTO);
    let (status, body) = send_multipart(app, "POST", "/api/complaints", Some(token), form).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn attached_files_are_recorded_and_served_unchanged() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let complaint = file_with_photo(&app, &token).await;

    let evidence = complaint["evidence"].as_array().unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0]["filename"], "scene.png");
    assert_eq!(evidence[0]["mimetype"], "image/png");
    assert_eq!(evidence[0]["size"], PHOTO.len() as i64);

    let uri = format!(
        "/api/complaints/files/{}",
        evidence[0]["id"].as_str().unwrap()
    );
    let (status, headers, first) = get_raw(&app, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "image/png");
    assert!(headers["content-disposition"]
        .to_str()
        .unwrap()
        .contains("scene.png"));
    assert_eq!(first, PHOTO);

    let (_, _, second) = get_raw(&app, &uri, Some(&token)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn parts_without_a_filename_are_ignored() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;

    let form = complaint_form("Sector 5").file("evidence", "", "application/octet-stream", b"");
    let (status, body) = send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["evidence"], serde_json::json!([]));
}

#[tokio::test]
async fn evidence_is_only_served_to_readers_of_the_complaint() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let (_, stranger) = app.seed(Role::User, "Some One", None, 0).await;
    let complaint = file_with_photo(&app, &token).await;
    let uri = format!(
        "/api/complaints/files/{}",
        complaint["evidence"][0]["id"].as_str().unwrap()
    );

    let (status, _, _) = get_raw(&app, &uri, Some(&officer_token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get_raw(&app, &uri, Some(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = get_raw(&app, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = get_raw(&app, "/api/complaints/files/no-such-file", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_evidence_joins_the_record_and_the_entry() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let complaint = file_with_photo(&app, &token).await;
    let id = complaint["id"].as_str().unwrap();

    let (status, updated) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new()
            .text("note", "Recovered CCTV footage")
            .file("evidence", "cctv.mp4", "video/mp4", b"frames"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["evidence"].as_array().unwrap().len(), 2);
    let entry = &updated["updates"][0];
    assert_eq!(entry["evidence"][0]["filename"], "cctv.mp4");

    // The reporter can download evidence an officer attached.
    let uri = format!(
        "/api/complaints/files/{}",
        entry["evidence"][0]["id"].as_str().unwrap()
    );
    let (status, _, bytes) = get_raw(&app, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"frames");
}

#[tokio::test]
async fn too_many_files_are_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;

    let mut form = complaint_form("Sector 5");
    for i in 0..6 {
        form = form.file("evidence", &format!("photo-{i}.jpg"), "image/jpeg", b"jpeg");
    }
    let (status, body) = send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("evidence").is_some());

    let stored = app
        .repo
        .list_complaints(ComplaintScope::All, &ComplaintFilter::default())
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn updates_accept_fewer_files_than_filings() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let complaint = crate::common::file(&app, &token, "Sector 5").await;
    let id = complaint["id"].as_str().unwrap();

    let mut form = Form::new().text("note", "photos");
    for i in 0..4 {
        form = form.file("evidence", &format!("photo-{i}.jpg"), "image/jpeg", b"jpeg");
    }
    let (status, _) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        form,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn storage_failure_leaves_no_record() {
    let app = TestApp::with_store(Arc::new(FailingStore)).await;
    let (_, token) = app.citizen().await;

    let form = complaint_form("Sector 5").file("evidence", "scene.png", "image/png", PHOTO);
    let (status, body) = send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "StorageError");

    let stored = app
        .repo
        .list_complaints(ComplaintScope::All, &ComplaintFilter::default())
        .await
        .unwrap();
    assert!(stored.is_empty());
}
