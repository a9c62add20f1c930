//! Email notifications for case lifecycle events
//!
//! Notifications are strictly fire-and-forget: the case service spawns the
//! send onto a blocking thread and never waits for or propagates the result.
//! A failed send is logged and the triggering request still succeeds.
//!
//! Delivery backend is chosen at startup: SMTP when `SMTP_HOST` is set,
//! otherwise a log-only sink (the dev default).

use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info, warn};

use crate::cases::CaseStatus;
use crate::db::schemas::CaseDoc;
use crate::types::AppError;

/// A rendered notification ready to send
#[derive(Debug, Clone)]
pub struct CaseNotification {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl CaseNotification {
    /// Confirmation sent to the owner after submission
    pub fn case_submitted(to_email: &str, case: &CaseDoc) -> Self {
        Self {
            to_email: to_email.to_string(),
            subject: format!("Case received: {}", case.title),
            body: format!(
                "Your case \"{}\" has been received and assigned to {}.\n\
                 Current status: {}.\n\n\
                 You will be notified as it moves through review.",
                case.title, case.assigned_department, case.status
            ),
        }
    }

    /// Sent to the owner when an admin moves the case
    pub fn status_changed(to_email: &str, case: &CaseDoc, old_status: CaseStatus) -> Self {
        Self {
            to_email: to_email.to_string(),
            subject: format!("Case update: {}", case.title),
            body: format!(
                "Your case \"{}\" has moved from {} to {}.{}",
                case.title,
                old_status,
                case.status,
                case.resolution_notes
                    .as_deref()
                    .map(|notes| format!("\n\nResolution notes:\n{}", notes))
                    .unwrap_or_default()
            ),
        }
    }
}

/// Delivery backend for case notifications
pub trait CaseNotifier: Send + Sync {
    fn send(&self, notification: &CaseNotification) -> Result<(), AppError>;
}

/// SMTP configuration, read from the environment
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl SmtpConfig {
    /// Returns `None` when `SMTP_HOST` is unset; callers fall back to the
    /// log-only sink.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@resolvenow.local".to_string()),
        })
    }
}

/// Sends notifications over SMTP
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mut builder = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AppError::Mail(format!("SMTP relay setup failed: {}", e)))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

impl CaseNotifier for SmtpNotifier {
    fn send(&self, notification: &CaseNotification) -> Result<(), AppError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| AppError::Mail(format!("Bad from address: {}", e)))?,
            )
            .to(notification
                .to_email
                .parse()
                .map_err(|e| AppError::Mail(format!("Bad recipient address: {}", e)))?)
            .subject(&notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(&message)
            .map_err(|e| AppError::Mail(format!("SMTP send failed: {}", e)))?;

        info!(to = %notification.to_email, subject = %notification.subject, "Notification sent");
        Ok(())
    }
}

/// Log-only sink used when SMTP is not configured
pub struct LogNotifier;

impl CaseNotifier for LogNotifier {
    fn send(&self, notification: &CaseNotification) -> Result<(), AppError> {
        info!(
            to = %notification.to_email,
            subject = %notification.subject,
            "Notification (log-only): {}",
            notification.body
        );
        Ok(())
    }
}

/// Build the notifier from the environment
pub fn notifier_from_env() -> Arc<dyn CaseNotifier> {
    match SmtpConfig::from_env() {
        Some(config) => match SmtpNotifier::new(&config) {
            Ok(notifier) => {
                info!(host = %config.host, port = config.port, "SMTP notifications enabled");
                Arc::new(notifier)
            }
            Err(e) => {
                warn!("SMTP setup failed, falling back to log-only notifications: {}", e);
                Arc::new(LogNotifier)
            }
        },
        None => {
            info!("SMTP_HOST not set; notifications will be logged only");
            Arc::new(LogNotifier)
        }
    }
}

/// Send a notification without blocking the caller; failures are logged.
pub fn send_detached(notifier: Arc<dyn CaseNotifier>, notification: CaseNotification) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notifier.send(&notification) {
            error!(to = %notification.to_email, "Notification failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseType, Urgency};
    use bson::oid::ObjectId;

    fn case() -> CaseDoc {
        CaseDoc::new(
            ObjectId::new(),
            "Deposit not returned".into(),
            CaseType::Property,
            "Landlord kept the deposit".into(),
            Some(900.0),
            None,
            Urgency::High,
        )
    }

    #[test]
    fn test_submitted_notification_names_department() {
        let n = CaseNotification::case_submitted("ada@example.org", &case());
        assert_eq!(n.to_email, "ada@example.org");
        assert!(n.subject.contains("Deposit not returned"));
        assert!(n.body.contains("Property"));
        assert!(n.body.contains("Pending"));
    }

    #[test]
    fn test_status_change_notification_includes_resolution_notes() {
        let mut c = case();
        c.status = CaseStatus::Resolved;
        c.resolution_notes = Some("Deposit refunded in full".into());

        let n = CaseNotification::status_changed("ada@example.org", &c, CaseStatus::InMediation);
        assert!(n.body.contains("In Mediation"));
        assert!(n.body.contains("Resolved"));
        assert!(n.body.contains("Deposit refunded in full"));
    }

    #[test]
    fn test_log_notifier_always_succeeds() {
        let n = CaseNotification::case_submitted("ada@example.org", &case());
        assert!(LogNotifier.send(&n).is_ok());
    }
}
