//! Outbound notification dispatch.
//!
//! Delivery is fire-and-forget: the engine hands an event to [`dispatch`],
//! which spawns the send and logs any failure. Nothing awaits delivery.

use async_trait::async_trait;
use std::sync::Arc;

/// Something worth telling a person about.
#[derive(Clone, PartialEq)]
pub enum NotificationEvent {
    /// Reporter: their complaint was recorded.
    ComplaintFiled {
        case_number: String,
        complaint_type: String,
        emergency: bool,
    },
    /// Officer: a complaint was routed to them.
    CaseAssigned {
        case_number: String,
        complaint_type: String,
        location: String,
        description: String,
        emergency: bool,
    },
    /// Reporter: an officer or admin appended an update.
    ComplaintUpdated {
        case_number: String,
        status: String,
        note: String,
    },
    /// Officer: an administrator left a note on a case assigned to them.
    AdminNote { case_number: String, note: String },
    /// New officer account with its temporary password.
    OfficerWelcome {
        full_name: String,
        badge_number: String,
        posting_site: String,
        temporary_password: String,
    },
    /// One-time verification code.
    Otp { code: String },
}

impl NotificationEvent {
    /// Stable name for logs. Never includes secrets.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::ComplaintFiled { .. } => "complaint_filed",
            NotificationEvent::CaseAssigned { emergency: true, .. } => "emergency_case_assigned",
            NotificationEvent::CaseAssigned { .. } => "case_assigned",
            NotificationEvent::ComplaintUpdated { .. } => "complaint_updated",
            NotificationEvent::AdminNote { .. } => "admin_note",
            NotificationEvent::OfficerWelcome { .. } => "officer_welcome",
            NotificationEvent::Otp { .. } => "otp",
        }
    }
}

impl std::fmt::Debug for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEvent")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn transport(&self) -> &'static str;

    async fn notify(&self, to: &str, event: &NotificationEvent) -> Result<(), String>;
}

/// Send in the background. Failures are logged and swallowed.
pub fn dispatch(notifier: Arc<dyn Notifier>, to: String, event: NotificationEvent) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&to, &event).await {
            tracing::warn!(
                error = %e,
                kind = event.kind(),
                transport = notifier.transport(),
                "Notification delivery failed"
            );
        }
    });
}

/// Writes a line per notification to the log. Used when mail is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn transport(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, to: &str, event: &NotificationEvent) -> Result<(), String> {
        tracing::info!(to, kind = event.kind(), "Notification (mail disabled)");
        Ok(())
    }
}
