use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use server::repo::{ComplaintScope, Repository};
use shared_types::ComplaintFilter;

use crate::common::{empty, file, get, send_json, send_multipart, Form, TestApp};

#[tokio::test]
async fn me_returns_the_profile_without_secrets() {
    let app = TestApp::new().await;
    let (user, token) = app.citizen().await;

    let (status, body) = get(&app, "/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());

    let (status, _) = get(&app, "/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_applies_present_fields() {
    let app = TestApp::new().await;
    let (user, token) = app.citizen().await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/me",
        Some(&token),
        json!({ "full_name": "Asha R Menon", "address": "12 MG Road" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["full_name"], "Asha R Menon");
    assert_eq!(body["address"], "12 MG Road");
    assert_eq!(body["phone"], user.phone);

    // Officer-only fields are ignored for citizens.
    let (_, body) = send_json(
        &app,
        "PUT",
        "/api/users/me",
        Some(&token),
        json!({ "posting_site": "Sector 5" }),
    )
    .await;
    assert!(body.get("posting_site").is_none());

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/me",
        Some(&token),
        json!({ "phone": "12-34" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("phone").is_some());
}

#[tokio::test]
async fn officer_site_change_affects_future_assignment() {
    let app = TestApp::new().await;
    let (_, citizen) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/users/me",
        Some(&officer_token),
        json!({ "posting_site": "Sector 12" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["posting_site"], "Sector 12");

    let old_site = file(&app, &citizen, "Sector 5").await;
    assert!(old_site.get("assigned_officer_id").is_none());

    let new_site = file(&app, &citizen, "Sector 12").await;
    assert_eq!(new_site["assigned_officer_id"], officer.id.to_string());

    let (status, _) = send_json(
        &app,
        "PUT",
        "/api/users/me",
        Some(&officer_token),
        json!({ "badge_number": "  " }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn account_deletion_removes_reported_complaints_and_unlinks_assignments() {
    let app = TestApp::new().await;
    let (reporter, token) = app.citizen().await;
    let (_, other) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;

    file(&app, &token, "Sector 5").await;
    file(&app, &token, "Sector 5").await;
    let kept = file(&app, &other, "Sector 5").await;
    let (status, _) = send_multipart(
        &app,
        "POST",
        "/api/complaints",
        Some(&token),
        crate::common::complaint_form("Sector 5").text("anonymous", "true"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = empty(&app, "DELETE", "/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted along with 2 complaint(s)");
    assert!(app.repo.find_user(reporter.id).await.unwrap().is_none());

    let all = app
        .repo
        .list_complaints(ComplaintScope::All, &ComplaintFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|c| c.reporter_id != Some(reporter.id)));

    let (status, _) = empty(&app, "DELETE", "/api/users/me", Some(&officer_token)).await;
    assert_eq!(status, StatusCode::OK);
    let survivor = app
        .repo
        .find_complaint(kept["id"].as_str().unwrap().parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(survivor.assigned_officer_id, None);
    assert!(app.repo.find_user(officer.id).await.unwrap().is_none());
}

#[tokio::test]
async fn inbox_lists_and_marks_read() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"]
        .as_str()
        .unwrap()
        .to_string();

    send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "Statement recorded"),
    )
    .await;

    let (status, inbox) = get(&app, "/api/users/me/notifications", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let inbox = inbox.as_array().unwrap().clone();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["category"], "case_update");
    assert_eq!(inbox[0]["read"], false);
    assert_eq!(inbox[0]["complaint_id"], id);
    assert!(inbox[0]["message"]
        .as_str()
        .unwrap()
        .contains("Statement recorded"));

    let note_id = inbox[0]["id"].as_str().unwrap();
    let uri = format!("/api/users/me/notifications/{note_id}/read");

    // Someone else's inbox entry is not found.
    let (status, _) = empty(&app, "PUT", &uri, Some(&officer_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = empty(&app, "PUT", &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, inbox) = get(&app, "/api/users/me/notifications", Some(&token)).await;
    assert_eq!(inbox[0]["read"], true);

    let missing = format!("/api/users/me/notifications/{}/read", uuid::Uuid::new_v4());
    let (status, body) = empty(&app, "PUT", &missing, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Notification not found");
}
