use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use server::notify::NotificationEvent;
use shared_types::Role;

use crate::common::{file, get, send_json, send_multipart, Form, TestApp};

fn officer_request(email: &str, badge: &str) -> Value {
    json!({
        "full_name": "Kiran Desai",
        "email": email,
        "phone": "9123456780",
        "national_id": "432143214321",
        "posting_site": "Sector 7",
        "badge_number": badge
    })
}

#[tokio::test]
async fn admin_provisions_a_verified_officer() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/admin/officers",
        Some(&admin),
        officer_request("kiran@police.test", "B-7001"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "officer");
    assert_eq!(body["verified"], true);
    assert_eq!(body["posting_site"], "Sector 7");
    assert_eq!(body["badge_number"], "B-7001");
    assert!(body.get("password").is_none());
    assert!(body.get("temporary_password").is_none());

    // The temporary password only travels by mail, and it works.
    let sent = app.notifier.wait_for(1).await;
    let password = sent
        .iter()
        .find_map(|(to, e)| match e {
            NotificationEvent::OfficerWelcome {
                temporary_password, ..
            } if to == "kiran@police.test" => Some(temporary_password.clone()),
            _ => None,
        })
        .expect("welcome mail was not sent");

    let (status, login) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        json!({ "email": "kiran@police.test", "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{login}");
    assert_eq!(login["user"]["role"], "officer");

    // New filings at the site are routed to the new officer.
    let (_, citizen) = app.citizen().await;
    let complaint = file(&app, &citizen, "Sector 7").await;
    assert_eq!(complaint["assigned_officer_id"], body["id"]);
}

#[tokio::test]
async fn duplicate_officer_email_or_badge_is_a_conflict() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;
    send_json(
        &app,
        "POST",
        "/api/admin/officers",
        Some(&admin),
        officer_request("kiran@police.test", "B-7001"),
    )
    .await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/admin/officers",
        Some(&admin),
        officer_request("KIRAN@police.test", "B-7002"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/admin/officers",
        Some(&admin),
        officer_request("other@police.test", "B-7001"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn officer_fields_are_validated() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;

    let mut request = officer_request("kiran@police.test", "");
    request["posting_site"] = json!("");
    let (status, body) =
        send_json(&app, "POST", "/api/admin/officers", Some(&admin), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("posting_site").is_some());
    assert!(body["field_errors"].get("badge_number").is_some());
}

#[tokio::test]
async fn admin_routes_refuse_everyone_else() {
    let app = TestApp::new().await;
    let (_, citizen) = app.citizen().await;
    let (_, officer) = app.officer_at("Sector 5").await;

    for token in [&citizen, &officer] {
        let (status, body) = send_json(
            &app,
            "POST",
            "/api/admin/officers",
            Some(token),
            officer_request("kiran@police.test", "B-7001"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin only");

        for uri in ["/api/admin/officers", "/api/admin/statistics"] {
            let (status, _) = get(&app, uri, Some(token)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }
    }

    let (status, _) = get(&app, "/api/admin/statistics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_is_read_from_the_directory_not_the_token() {
    let app = TestApp::new().await;
    let (mut demoted, token) = app.admin().await;
    demoted.role = Role::User;
    server::repo::Repository::update_user(app.repo.as_ref(), &demoted)
        .await
        .unwrap();

    let (status, _) = get(&app, "/api/admin/statistics", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn officer_roster_lists_officers_only() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;
    app.citizen().await;
    let (first, _) = app.officer_at("Sector 5").await;
    let (second, _) = app.officer_at("Sector 9").await;

    let (status, body) = get(&app, "/api/admin/officers", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id.to_string().as_str()));
    assert!(ids.contains(&second.id.to_string().as_str()));
}

#[tokio::test]
async fn statistics_summarize_the_portal() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;
    let (_, citizen) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;
    app.officer_at("Sector 9").await;

    let first = file(&app, &citizen, "Sector 5").await;
    file(&app, &citizen, "Sector 5").await;
    let unassigned = file(&app, &citizen, "Sector 42").await;

    let id = first["id"].as_str().unwrap();
    send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "Solved").text("status", "Closed"),
    )
    .await;
    let id = unassigned["id"].as_str().unwrap();
    crate::common::empty(&app, "POST", &format!("/api/complaints/{id}/withdraw"), Some(&citizen))
        .await;

    let (status, stats) = get(&app, "/api/admin/statistics", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{stats}");
    assert_eq!(stats["total_complaints"], 3);
    assert_eq!(stats["active_cases"], 1);
    assert_eq!(stats["closed_cases"], 1);
    assert_eq!(stats["withdrawn_cases"], 1);
    assert_eq!(stats["unassigned_cases"], 1);
    assert_eq!(stats["resolution_rate"], 33);
    assert_eq!(stats["total_officers"], 2);
    assert_eq!(stats["verified_officers"], 2);

    assert_eq!(
        stats["by_type"],
        json!([{ "label": "Theft", "count": 3, "percentage": 100.0 }])
    );
    let statuses: Vec<&str> = stats["by_status"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["label"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["Submitted", "Closed", "Withdrawn"]);

    let workload = stats["officer_workload"].as_array().unwrap();
    assert_eq!(workload.len(), 2);
    assert_eq!(workload[0]["officer_id"], officer.id.to_string());
    assert_eq!(workload[0]["assigned_cases"], 2);
    assert_eq!(workload[0]["open_cases"], 1);
    assert_eq!(workload[1]["assigned_cases"], 0);
}

#[tokio::test]
async fn empty_portal_statistics_are_zero() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin().await;

    let (status, stats) = get(&app, "/api/admin/statistics", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_complaints"], 0);
    assert_eq!(stats["resolution_rate"], 0);
    assert_eq!(stats["by_type"], json!([]));
    assert_eq!(stats["by_status"], json!([]));
}
