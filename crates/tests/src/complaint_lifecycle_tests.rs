use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use server::notify::NotificationEvent;
use server::repo::Repository;
use shared_types::{NotificationCategory, Role};

use crate::common::{self, complaint_form, file, get, send_json, send_multipart, Form, TestApp};

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn filing_assigns_the_officer_posted_at_the_location() {
    let app = TestApp::new().await;
    let (reporter, token) = app.citizen().await;
    let (officer, _) = app.officer_at("Sector 5").await;

    let complaint = file(&app, &token, "Sector 5").await;

    assert_eq!(complaint["status"], "Submitted");
    assert_eq!(complaint["anonymous"], false);
    assert_eq!(complaint["reporter_id"], reporter.id.to_string());
    assert_eq!(complaint["assigned_officer_id"], officer.id.to_string());
    assert_eq!(complaint["version"], 1);
    assert_eq!(complaint["updates"], json!([]));

    let inbox = app.repo.list_notifications(officer.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].category, NotificationCategory::CaseAssigned);
    assert!(!inbox[0].read);

    let sent = app.notifier.wait_for(2).await;
    assert!(sent.iter().any(|(to, e)| to == &reporter.email
        && matches!(e, NotificationEvent::ComplaintFiled { emergency: false, .. })));
    assert!(sent.iter().any(|(to, e)| to == &officer.email
        && matches!(e, NotificationEvent::CaseAssigned { .. })));
}

#[tokio::test]
async fn filing_without_a_matching_officer_stays_unassigned() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    app.officer_at("Sector 9").await;

    let complaint = file(&app, &token, "Sector 5").await;
    assert!(complaint.get("assigned_officer_id").is_none());
    assert_eq!(complaint["status"], "Submitted");
}

#[tokio::test]
async fn unverified_officers_are_never_assigned() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (mut officer, _) = app.officer_at("Sector 5").await;
    officer.verified = false;
    app.repo.update_user(&officer).await.unwrap();

    let complaint = file(&app, &token, "Sector 5").await;
    assert!(complaint.get("assigned_officer_id").is_none());
}

#[tokio::test]
async fn earliest_provisioned_officer_wins_every_time() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (senior, _) = app
        .seed(Role::Officer, "Senior Officer", Some("Sector 5"), 600)
        .await;
    app.seed(Role::Officer, "Junior Officer", Some("Sector 5"), 5).await;

    for _ in 0..3 {
        let complaint = file(&app, &token, "Sector 5").await;
        assert_eq!(complaint["assigned_officer_id"], senior.id.to_string());
    }
}

#[tokio::test]
async fn officer_filing_at_their_own_site_goes_to_a_colleague() {
    let app = TestApp::new().await;
    let (senior, senior_token) = app
        .seed(Role::Officer, "Senior Officer", Some("Sector 5"), 600)
        .await;
    let (junior, _) = app.seed(Role::Officer, "Junior Officer", Some("Sector 5"), 5).await;

    let complaint = file(&app, &senior_token, "Sector 5").await;
    assert_eq!(complaint["reporter_id"], senior.id.to_string());
    assert_eq!(complaint["assigned_officer_id"], junior.id.to_string());

    let (_, lone_token) = app.seed(Role::Officer, "Lone Officer", Some("Sector 9"), 5).await;
    let complaint = file(&app, &lone_token, "Sector 9").await;
    assert!(complaint.get("assigned_officer_id").is_none());
}

#[tokio::test]
async fn anonymous_filing_needs_no_credential_and_never_lists_for_users() {
    let app = TestApp::new().await;
    let (_, user_token) = app.citizen().await;
    let (_, admin_token) = app.admin().await;

    let (status, complaint) = send_multipart(
        &app,
        "POST",
        "/api/complaints",
        None,
        complaint_form("Sector 5").text("anonymous", "true"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{complaint}");
    assert_eq!(complaint["anonymous"], true);
    assert!(complaint.get("reporter_id").is_none());

    // Even a signed-in reporter filing anonymously is not linked.
    let (status, linked) = send_multipart(
        &app,
        "POST",
        "/api/complaints",
        Some(&user_token),
        complaint_form("Sector 5").text("anonymous", "true"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(linked.get("reporter_id").is_none());

    let (status, mine) = get(&app, "/api/complaints", Some(&user_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine, json!([]));

    let (_, all) = get(&app, "/api/complaints", Some(&admin_token)).await;
    let all = ids(&all);
    assert!(all.contains(&complaint["id"].as_str().unwrap().to_string()));
    assert!(all.contains(&linked["id"].as_str().unwrap().to_string()));
}

#[tokio::test]
async fn non_anonymous_filing_requires_a_credential() {
    let app = TestApp::new().await;
    let (status, body) =
        send_multipart(&app, "POST", "/api/complaints", None, complaint_form("Sector 5")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "AuthRequired");
}

#[tokio::test]
async fn missing_fields_are_named() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;

    let (status, body) = send_multipart(
        &app,
        "POST",
        "/api/complaints",
        Some(&token),
        Form::new().text("type", "Theft").text("date", "2026-03-01"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "ValidationError");
    for field in ["time", "location", "description"] {
        assert!(body["field_errors"].get(field).is_some(), "{field} not reported");
    }
    assert!(body["field_errors"].get("type").is_none());
}

#[tokio::test]
async fn malformed_incident_date_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;

    let form = Form::new()
        .text("type", "Theft")
        .text("date", "01/03/2026")
        .text("time", "21:15")
        .text("location", "Sector 5")
        .text("description", "Stolen");
    let (status, body) = send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("date").is_some());
}

#[tokio::test]
async fn victims_and_accused_are_kept() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;

    let form = complaint_form("Sector 5")
        .text("victimDetails", r#"[{"name":"Ravi","gender":"male","age":34}]"#)
        .text("accusedDetails", r#"[{"name":"Unknown","status":"absconding"}]"#);
    let (status, body) = send_multipart(&app, "POST", "/api/complaints", Some(&token), form).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["victims"][0]["name"], "Ravi");
    assert_eq!(body["victims"][0]["age"], "34");
    assert_eq!(body["accused"][0]["status"], "absconding");
}

#[tokio::test]
async fn emergency_filing_takes_date_and_time_from_the_clock() {
    let app = TestApp::new().await;
    let (reporter, token) = app.citizen().await;
    let (officer, _) = app.officer_at("Sector 5").await;

    let form = Form::new()
        .text("type", "Assault")
        .text("location", "Sector 5")
        .text("description", "Fight in progress");
    let (status, body) =
        send_multipart(&app, "POST", "/api/complaints/emergency", Some(&token), form).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["emergency"], true);
    assert_eq!(body["assigned_officer_id"], officer.id.to_string());
    assert_eq!(
        body["incident_date"],
        chrono::Utc::now().date_naive().to_string()
    );

    let sent = app.notifier.wait_for(2).await;
    assert!(sent.iter().any(|(to, e)| to == &officer.email
        && e.kind() == "emergency_case_assigned"));
    assert!(sent.iter().any(|(to, e)| to == &reporter.email
        && matches!(e, NotificationEvent::ComplaintFiled { emergency: true, .. })));
}

#[tokio::test]
async fn emergency_filing_requires_a_credential() {
    let app = TestApp::new().await;
    let form = Form::new()
        .text("type", "Assault")
        .text("location", "Sector 5")
        .text("description", "Fight in progress");
    let (status, _) = send_multipart(&app, "POST", "/api/complaints/emergency", None, form).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn officer_update_moves_status_and_records_the_note() {
    let app = TestApp::new().await;
    let (reporter, token) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;
    let complaint = file(&app, &token, "Sector 5").await;
    let id = complaint["id"].as_str().unwrap();

    let (status, updated) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "reviewed").text("status", "Under Review"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["status"], "Under Review");
    assert_eq!(updated["version"], 2);
    let trail = updated["updates"].as_array().unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0]["type"], "officer");
    assert_eq!(trail[0]["note"], "reviewed");
    assert_eq!(trail[0]["status"], "Under Review");
    assert_eq!(trail[0]["author_id"], officer.id.to_string());

    let inbox = app.repo.list_notifications(reporter.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].category, NotificationCategory::CaseUpdate);

    let sent = app.notifier.wait_for(3).await;
    assert!(sent.iter().any(|(to, e)| to == &reporter.email
        && matches!(e, NotificationEvent::ComplaintUpdated { status, .. } if status == "Under Review")));
}

#[tokio::test]
async fn update_requires_a_note() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("status", "Under Review"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("note").is_some());
}

#[tokio::test]
async fn outsiders_cannot_append_updates() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    app.officer_at("Sector 5").await;
    let (_, other_officer) = app.officer_at("Sector 9").await;
    let (_, stranger) = app.seed(Role::User, "Some One", None, 0).await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    for caller in [&token, &other_officer, &stranger] {
        let (status, body) = send_multipart(
            &app,
            "POST",
            &format!("/api/complaints/{id}/update"),
            Some(caller),
            Form::new().text("note", "sneaky"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "Forbidden");
    }

    let stored = app
        .repo
        .find_complaint(id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.updates.is_empty());
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn status_only_moves_forward() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/complaints/{id}/update");

    let (status, _) = send_multipart(
        &app,
        "POST",
        &uri,
        Some(&officer_token),
        Form::new().text("note", "opening").text("status", "Investigation"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for target in ["Under Review", "Submitted", "Withdrawn"] {
        let (status, body) = send_multipart(
            &app,
            "POST",
            &uri,
            Some(&officer_token),
            Form::new().text("note", "back").text("status", target),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{target}: {body}");
    }

    let (status, closed) = send_multipart(
        &app,
        "POST",
        &uri,
        Some(&officer_token),
        Form::new().text("note", "solved").text("status", "Closed"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "Closed");

    let (status, _) = send_multipart(
        &app,
        "POST",
        &uri,
        Some(&officer_token),
        Form::new().text("note", "reopen").text("status", "Investigation"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A note alone is still accepted on a closed case.
    let (status, noted) = send_multipart(
        &app,
        "POST",
        &uri,
        Some(&officer_token),
        Form::new().text("note", "property returned"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(noted["status"], "Closed");
}

#[tokio::test]
async fn unknown_status_is_a_validation_error() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "x").text("status", "Reopened"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("status").is_some());
}

#[tokio::test]
async fn audit_trail_only_grows() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let (_, admin_token) = app.admin().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (_, first) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "reviewed").text("status", "Under Review"),
    )
    .await;
    let (status, second) = send_json(
        &app,
        "POST",
        &format!("/api/admin/complaints/{id}/notes"),
        Some(&admin_token),
        json!({ "note": "escalate" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let before = first["updates"].as_array().unwrap();
    let after = second["updates"].as_array().unwrap();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after[1]["type"], "admin");
    assert_eq!(after[1]["status"], "Under Review");
}

#[tokio::test]
async fn admin_note_lands_in_the_officer_inbox_once() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (officer, _) = app.officer_at("Sector 5").await;
    let (_, admin_token) = app.admin().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let before = app.repo.list_notifications(officer.id).await.unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/admin/complaints/{id}/notes"),
        Some(&admin_token),
        json!({ "note": "Prioritise this case" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let after = app.repo.list_notifications(officer.id).await.unwrap();
    assert_eq!(after.len(), before.len() + 1);
    let notes: Vec<_> = after
        .iter()
        .filter(|n| n.category == NotificationCategory::AdminNote)
        .collect();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].read);
    assert_eq!(notes[0].complaint_id.map(|c| c.to_string()).as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn admin_update_also_reaches_the_assigned_officer() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (officer, _) = app.officer_at("Sector 5").await;
    let (_, admin_token) = app.admin().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();
    assert_eq!(app.repo.list_notifications(officer.id).await.unwrap().len(), 1);

    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&admin_token),
        Form::new().text("note", "admin says hi"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updates"][0]["type"], "admin");

    let inbox = app.repo.list_notifications(officer.id).await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert!(inbox
        .iter()
        .any(|n| n.category == NotificationCategory::AdminNote && n.message.contains("admin says hi")));

    let sent = app.notifier.wait_for(4).await;
    assert!(sent.iter().any(|(to, e)| to == &officer.email
        && matches!(e, NotificationEvent::AdminNote { note, .. } if note == "admin says hi")));
}

#[tokio::test]
async fn officer_update_does_not_raise_an_admin_note() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, _) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "on it"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let inbox = app.repo.list_notifications(officer.id).await.unwrap();
    assert!(inbox.iter().all(|n| n.category != NotificationCategory::AdminNote));
}

#[tokio::test]
async fn admin_notes_are_admin_only() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/admin/complaints/{id}/notes"),
        Some(&officer_token),
        json!({ "note": "hello" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reporter_edits_only_while_submitted() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let complaint = file(&app, &token, "Sector 5").await;
    let id = complaint["id"].as_str().unwrap();
    let edit_uri = format!("/api/complaints/{id}/edit");

    let (status, edited) = send_multipart(
        &app,
        "PUT",
        &edit_uri,
        Some(&token),
        Form::new().text("description", "Red motorcycle stolen"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{edited}");
    assert_eq!(edited["description"], "Red motorcycle stolen");
    assert_eq!(edited["version"], 2);

    send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "reviewed").text("status", "Under Review"),
    )
    .await;

    let (status, body) = send_multipart(
        &app,
        "PUT",
        &edit_uri,
        Some(&token),
        Form::new().text("description", "Changed my mind"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "Conflict");

    let (_, current) = get(&app, &format!("/api/complaints/{id}"), Some(&token)).await;
    assert_eq!(current["description"], "Red motorcycle stolen");
    assert_eq!(current["status"], "Under Review");

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/complaints/{id}/withdraw"),
        Some(&token),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_the_reporter_may_edit_or_withdraw() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let (_, stranger) = app.seed(Role::User, "Some One", None, 0).await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    for caller in [&officer_token, &stranger] {
        let (status, _) = send_multipart(
            &app,
            "PUT",
            &format!("/api/complaints/{id}/edit"),
            Some(caller),
            Form::new().text("description", "hijacked"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = common::empty(
            &app,
            "POST",
            &format!("/api/complaints/{id}/withdraw"),
            Some(caller),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn empty_edit_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/complaints/{id}/edit"),
        Some(&token),
        Form::new(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "No changes supplied");
}

#[tokio::test]
async fn location_edit_reassigns_the_case() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (first, _) = app.officer_at("Sector 5").await;
    let (second, _) = app.officer_at("Sector 9").await;
    let complaint = file(&app, &token, "Sector 5").await;
    assert_eq!(complaint["assigned_officer_id"], first.id.to_string());
    let id = complaint["id"].as_str().unwrap();

    let (status, edited) = send_multipart(
        &app,
        "PUT",
        &format!("/api/complaints/{id}/edit"),
        Some(&token),
        Form::new().text("location", "Sector 9"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{edited}");
    assert_eq!(edited["location"], "Sector 9");
    assert_eq!(edited["assigned_officer_id"], second.id.to_string());

    let inbox = app.repo.list_notifications(second.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].category, NotificationCategory::CaseAssigned);
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, body) = send_multipart(
        &app,
        "PUT",
        &format!("/api/complaints/{id}/edit"),
        Some(&token),
        Form::new()
            .text("description", "Updated")
            .text("expected_version", "7"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "Conflict");

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/complaints/{id}/withdraw"),
        Some(&token),
        json!({ "expected_version": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Withdrawn");
}

#[tokio::test]
async fn withdrawal_is_terminal() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();

    let (status, body) =
        common::empty(&app, "POST", &format!("/api/complaints/{id}/withdraw"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Withdrawn");

    let (status, _) =
        common::empty(&app, "POST", &format!("/api/complaints/{id}/withdraw"), Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "x").text("status", "Investigation"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn withdrawn_complaints_take_notes_but_not_evidence() {
    let app = TestApp::new().await;
    let (reporter, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();
    let (status, _) =
        common::empty(&app, "POST", &format!("/api/complaints/{id}/withdraw"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new()
            .text("note", "late footage")
            .file("evidence", "cctv.mp4", "video/mp4", b"frames"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{id}/update"),
        Some(&officer_token),
        Form::new().text("note", "filed away"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Withdrawn");
    assert_eq!(body["evidence"], json!([]));

    let inbox = app.repo.list_notifications(reporter.id).await.unwrap();
    assert!(inbox.iter().all(|n| n.category != NotificationCategory::CaseUpdate));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!app
        .notifier
        .sent()
        .iter()
        .any(|(_, e)| matches!(e, NotificationEvent::ComplaintUpdated { .. })));
}

#[tokio::test]
async fn reads_are_scoped_by_relationship() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (officer, officer_token) = app.officer_at("Sector 5").await;
    let (_, other_officer) = app.officer_at("Sector 9").await;
    let (_, stranger) = app.seed(Role::User, "Some One", None, 0).await;
    let (_, admin_token) = app.admin().await;
    let id = file(&app, &token, "Sector 5").await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/complaints/{id}");

    let (status, mine) = get(&app, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["assigned_officer"]["id"], officer.id.to_string());
    assert!(mine.get("reporter").is_none());

    let (status, assigned) = get(&app, &uri, Some(&officer_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(assigned.get("reporter").is_some());

    let (status, _) = get(&app, &uri, Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK);

    for caller in [&other_officer, &stranger] {
        let (status, body) = get(&app, &uri, Some(caller)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "Forbidden");
    }

    let (status, _) = get(&app, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let missing = format!("/api/complaints/{}", uuid::Uuid::new_v4());
    let (status, body) = get(&app, &missing, Some(&admin_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFound");
}

#[tokio::test]
async fn listings_filter_and_sort() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (_, officer_token) = app.officer_at("Sector 5").await;

    let first = file(&app, &token, "Sector 5").await;
    let second = file(&app, &token, "Sector 5").await;
    let first_id = first["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    send_multipart(
        &app,
        "POST",
        &format!("/api/complaints/{first_id}/update"),
        Some(&officer_token),
        Form::new().text("note", "closed").text("status", "Investigation"),
    )
    .await;

    let (_, recent) = get(&app, "/api/complaints", Some(&token)).await;
    assert_eq!(ids(&recent), vec![second_id.clone(), first_id.clone()]);

    let (_, oldest) = get(&app, "/api/complaints?sort=oldest", Some(&token)).await;
    assert_eq!(ids(&oldest), vec![first_id.clone(), second_id.clone()]);

    let (_, investigating) =
        get(&app, "/api/complaints?status=Investigation", Some(&officer_token)).await;
    assert_eq!(ids(&investigating), vec![first_id]);

    let (_, by_type) = get(&app, "/api/complaints?type=Assault", Some(&token)).await;
    assert_eq!(by_type, json!([]));

    let (status, body) = get(&app, "/api/complaints?status=Lost", Some(&token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"].get("status").is_some());
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.citizen().await;
    let (status, body) = get(&app, "/api/complaints/not-a-uuid", Some(&token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "ValidationError");
}
