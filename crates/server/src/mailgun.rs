use async_trait::async_trait;

use crate::notify::{NotificationEvent, Notifier};

// --- Environment helpers ---

fn env_required(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} is not configured"))
}

fn app_name() -> String {
    std::env::var("APP_NAME").unwrap_or_else(|_| "Crime Reporting Portal".to_string())
}

/// Mailgun HTTP API client.
#[derive(Clone)]
pub struct MailgunNotifier {
    client: reqwest::Client,
    api_key: String,
    domain: String,
    from: String,
    app_name: String,
}

impl MailgunNotifier {
    /// Reads `MAILGUN_API_KEY`, `MAILGUN_DOMAIN` and optionally `MAILGUN_FROM`.
    pub fn from_env() -> Result<Self, String> {
        let api_key = env_required("MAILGUN_API_KEY")?;
        let domain = env_required("MAILGUN_DOMAIN")?;
        let app_name = app_name();
        let from = std::env::var("MAILGUN_FROM")
            .unwrap_or_else(|_| format!("{} <noreply@{}>", app_name, domain));
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            domain,
            from,
            app_name,
        })
    }

    #[tracing::instrument(skip(self, html_body))]
    pub async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let url = format!("https://api.mailgun.net/v3/{}/messages", self.domain);

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", to),
                ("subject", subject),
                ("html", html_body),
            ])
            .send()
            .await
            .map_err(|e| format!("Mailgun request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Mailgun API error ({}): {}", status, body));
        }

        tracing::info!(to = to, subject = subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    fn transport(&self) -> &'static str {
        "mailgun"
    }

    async fn notify(&self, to: &str, event: &NotificationEvent) -> Result<(), String> {
        let (subject, html) = templates::render(event, &self.app_name);
        self.send_email(to, &subject, &html).await
    }
}

// --- Email templates ---

mod templates {
    use crate::notify::NotificationEvent;

    pub fn escape_html(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }

    fn layout(title: &str, accent: &str, body: &str, app_name: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: Arial, sans-serif; background: #f8fafc; color: #374151; padding: 20px;">
  <div style="max-width: 600px; margin: 0 auto; border: 2px solid {accent}; border-radius: 12px; overflow: hidden;">
    <h1 style="background: {accent}; color: #ffffff; margin: 0; padding: 20px; text-align: center; font-size: 22px;">{title}</h1>
    <div style="padding: 30px; line-height: 1.6;">
{body}
    </div>
    <p style="background: #f1f5f9; margin: 0; padding: 16px; text-align: center; color: #64748b; font-size: 13px;">{app_name}</p>
  </div>
</body>
</html>"#,
            title = escape_html(title),
            accent = accent,
            body = body,
            app_name = escape_html(app_name),
        )
    }

    fn row(label: &str, value: &str) -> String {
        format!(
            "      <p><strong>{}:</strong> {}</p>\n",
            label,
            escape_html(value)
        )
    }

    const BLUE: &str = "#2563eb";
    const RED: &str = "#dc2626";

    /// Subject line and HTML body for an event.
    pub fn render(event: &NotificationEvent, app_name: &str) -> (String, String) {
        match event {
            NotificationEvent::ComplaintFiled {
                case_number,
                complaint_type,
                emergency,
            } => {
                let subject = if *emergency {
                    "Emergency Complaint Submitted Successfully"
                } else {
                    "Complaint Submitted Successfully"
                };
                let body = format!(
                    "      <p>Your complaint has been recorded.</p>\n{}{}      <p>You can track its status from your dashboard.</p>\n",
                    row("Case number", case_number),
                    row("Type", complaint_type),
                );
                (subject.to_string(), layout(subject, BLUE, &body, app_name))
            }
            NotificationEvent::CaseAssigned {
                case_number,
                complaint_type,
                location,
                description,
                emergency,
            } => {
                let (subject, accent, lead) = if *emergency {
                    (
                        "EMERGENCY CASE ASSIGNED - IMMEDIATE ACTION REQUIRED",
                        RED,
                        "An emergency case has been assigned to you.",
                    )
                } else {
                    (
                        "New Case Assigned - Action Required",
                        BLUE,
                        "A new case has been assigned to you.",
                    )
                };
                let body = format!(
                    "      <p>{lead}</p>\n{}{}{}{}",
                    row("Case number", case_number),
                    row("Type", complaint_type),
                    row("Location", location),
                    row("Description", description),
                );
                (subject.to_string(), layout(subject, accent, &body, app_name))
            }
            NotificationEvent::ComplaintUpdated {
                case_number,
                status,
                note,
            } => {
                let subject = "Update on Your Complaint";
                let body = format!(
                    "      <p>There has been an update to your complaint.</p>\n{}{}{}",
                    row("Case number", case_number),
                    row("Status", status),
                    row("Update", note),
                );
                (subject.to_string(), layout(subject, BLUE, &body, app_name))
            }
            NotificationEvent::AdminNote { case_number, note } => {
                let subject = "Administrative Note on Your Case";
                let body = format!(
                    "      <p>An administrator added a note to a case assigned to you.</p>\n{}{}",
                    row("Case number", case_number),
                    row("Note", note),
                );
                (subject.to_string(), layout(subject, BLUE, &body, app_name))
            }
            NotificationEvent::OfficerWelcome {
                full_name,
                badge_number,
                posting_site,
                temporary_password,
            } => {
                let subject = format!("Welcome to {app_name}");
                let body = format!(
                    "      <p>Hello {},</p>\n      <p>An officer account has been created for you.</p>\n{}{}{}      <p>Please change your password after your first login.</p>\n",
                    escape_html(full_name),
                    row("Badge number", badge_number),
                    row("Posting site", posting_site),
                    row("Temporary password", temporary_password),
                );
                let html = layout(&subject, BLUE, &body, app_name);
                (subject, html)
            }
            NotificationEvent::Otp { code } => {
                let subject = "Your OTP Code";
                let body = format!(
                    "      <p>Use this code to verify your email address:</p>\n      <p style=\"font-size: 24px; color: {BLUE};\"><strong>{}</strong></p>\n      <p>It is valid for 10 minutes. Do not share it with anyone.</p>\n",
                    escape_html(code),
                );
                (subject.to_string(), layout(subject, BLUE, &body, app_name))
            }
        }
    }
}
