use axum::http::StatusCode;
use serde_json::json;
use shared_types::Role;

use crate::common::{complaint_form, file, get_raw, send_json, send_multipart, TestApp};

#[tokio::test]
async fn fir_pdf_renders_for_readers() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let (_, admin) = app.admin().await;

    let form = complaint_form("Sector 5")
        .text("nearestLandmark", "Clock \"Tower\"")
        .text("victimDetails", r#"[{"name":"Ravi","age":34,"medicalAid":true}]"#)
        .text("accusedDetails", r#"[{"name":"Unknown","status":"absconding"}]"#)
        .file("evidence", "scene.jpg", "image/jpeg", b"jpeg bytes");
    let (status, complaint) =
        send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::CREATED, "{complaint}");
    let id = complaint["id"].as_str().unwrap();

    send_json(
        &app,
        "POST",
        &format!("/api/admin/complaints/{id}/notes"),
        Some(&admin),
        json!({ "note": "Escalated to\nthe district office" }),
    )
    .await;

    for caller in [&token, &officer_token, &admin] {
        let (status, headers, body) =
            get_raw(&app, &format!("/api/complaints/{id}/fir-pdf"), Some(caller)).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
        assert_eq!(headers["content-type"], "application/pdf");
        assert!(headers["content-disposition"]
            .to_str()
            .unwrap()
            .contains("FIR-"));
        assert!(body.starts_with(b"%PDF"));
    }
}

#[tokio::test]
async fn fir_pdf_is_scoped_like_the_complaint() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, stranger) = app.seed(Role::User, "Some One", None, 0).await;
    let id = file(&app, &token, "Sector 5").await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _, _) = get_raw(&app, &format!("/api/complaints/{id}/fir-pdf"), Some(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = uuid::Uuid::new_v4();
    let (status, _, _) =
        get_raw(&app, &format!("/api/complaints/{missing}/fir-pdf"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_fir_renders_for_admins() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;
    let (status, complaint) = send_multipart(
        &app,
        "POST",
        "/api/complaints",
        None,
        complaint_form("Sector 5").text("anonymous", "true"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = complaint["id"].as_str().unwrap();

    let (status, _, body) = get_raw(
        &app,
        &format!("/api/admin/complaints/{id}/report-pdf"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn admin_report_routes_are_admin_only() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let id = file(&app, &token, "Sector 5").await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _, _) = get_raw(
        &app,
        &format!("/api/admin/complaints/{id}/report-pdf"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = get_raw(&app, "/api/admin/statistics/pdf", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn statistics_pdf_renders_with_and_without_data() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;

    let (status, headers, body) = get_raw(&app, "/api/admin/statistics/pdf", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    assert_eq!(headers["content-type"], "application/pdf");
    assert!(body.starts_with(b"%PDF"));

    let (_, token) = app.citizen().await;
    app.officer_at("Sector 5").await;
    file(&app, &token, "Sector 5").await;
    file(&app, &token, "Sector 8").await;

    let (status, _, body) = get_raw(&app, "/api/admin/statistics/pdf", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    assert!(body.starts_with(b"%PDF"));
}
