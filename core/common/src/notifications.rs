// core/common/src/notifications.rs
// Account mail: recovery, password-updated and email-confirmation messages

use actix_web::http::StatusCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::TokenService;
use crate::claims::{ClaimSet, NAME_CLAIM};
use crate::config::NotificationsConfig;
use crate::error::ApiError;
use crate::templates::{
    render, ResourceCache, EMAIL_CONFIRMATION_TEMPLATE, FIRST_PASSWORD_TEMPLATE,
    PASSWORD_UPDATED_TEMPLATE,
};

// Template placeholders
pub const SENDER_COMPANY: &str = "SenderCompany";
pub const SENDER_SYSTEM: &str = "SenderSystem";
pub const USERNAME: &str = "Username";
pub const RECOVERY_URL: &str = "RecoveryUrl";
pub const TOKEN_EXPIRATION: &str = "TokenExpiration";
pub const PROCESS_ID: &str = "ProcessId";

pub const SEND_FAILURE_MESSAGE: &str =
    "An error occurred while sending an email to the specified recipients.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub name: String,
    pub email: String,
    pub subject: String,
    /// HTML.
    pub body: String,
}

/// Delivers a composed message (SMTP, HTTP mail API, queue, ...).
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

pub struct AccountMailer<T: MailTransport> {
    transport: T,
    tokens: TokenService,
    resources: Arc<ResourceCache>,
    config: NotificationsConfig,
}

impl<T: MailTransport> AccountMailer<T> {
    pub fn new(
        transport: T,
        tokens: TokenService,
        resources: Arc<ResourceCache>,
        config: NotificationsConfig,
    ) -> Self {
        Self {
            transport,
            tokens,
            resources,
            config,
        }
    }

    /// Welcome mail with a link to set the first password.
    pub async fn send_recovery_mail(
        &self,
        name: &str,
        username: &str,
        email: &str,
    ) -> Result<(), ApiError> {
        let recovery_url = self.recovery_url(username)?;
        let expiration = self.token_expiration_hours();
        let params = [
            (SENDER_COMPANY, self.config.sender_company.as_str()),
            (SENDER_SYSTEM, self.config.sender_system.as_str()),
            (USERNAME, email),
            (RECOVERY_URL, recovery_url.as_str()),
            (TOKEN_EXPIRATION, expiration.as_str()),
        ];
        let subject = format!(
            "[no-reply] Welcome to your {} account",
            self.config.sender_system
        );

        self.send_template(name, email, FIRST_PASSWORD_TEMPLATE, &params, subject)
            .await
    }

    pub async fn send_password_updated_mail(&self, name: &str, email: &str) -> Result<(), ApiError> {
        let params = [
            (SENDER_COMPANY, self.config.sender_company.as_str()),
            (SENDER_SYSTEM, self.config.sender_system.as_str()),
        ];
        let subject = format!(
            "[no-reply] Your {} password has changed",
            self.config.sender_system
        );

        self.send_template(name, email, PASSWORD_UPDATED_TEMPLATE, &params, subject)
            .await
    }

    pub async fn send_email_confirmation(
        &self,
        name: &str,
        username: &str,
        email: &str,
        process_id: &str,
    ) -> Result<(), ApiError> {
        let recovery_url = self.recovery_url(username)?;
        let expiration = self.token_expiration_hours();
        let params = [
            (SENDER_COMPANY, self.config.sender_company.as_str()),
            (PROCESS_ID, process_id),
            (SENDER_SYSTEM, self.config.sender_system.as_str()),
            (USERNAME, email),
            (RECOVERY_URL, recovery_url.as_str()),
            (TOKEN_EXPIRATION, expiration.as_str()),
        ];
        let subject = format!(
            "[no-reply] Confirmation of enrollment {} to {}",
            process_id, self.config.sender_system
        );

        self.send_template(name, email, EMAIL_CONFIRMATION_TEMPLATE, &params, subject)
            .await
    }

    fn recovery_url(&self, username: &str) -> Result<String, ApiError> {
        let claims = ClaimSet::new().with(NAME_CLAIM, username);
        let token = self.tokens.create(
            &claims,
            self.config.recovery_token_expiration,
            &self.tokens.symmetric_key(),
        )?;
        Ok(format!("{}{}", self.config.recovery_page_url, token))
    }

    // Whole hours, truncated.
    fn token_expiration_hours(&self) -> String {
        (self.config.recovery_token_expiration / 3600).to_string()
    }

    async fn send_template(
        &self,
        name: &str,
        email: &str,
        template_name: &str,
        params: &[(&str, &str)],
        subject: String,
    ) -> Result<(), ApiError> {
        let template = self.resources.get_resource(template_name)?;
        let message = Email {
            name: name.to_string(),
            email: email.to_string(),
            subject,
            body: render(&template, params),
        };

        if let Err(err) = self.transport.send(&message).await {
            error!(
                recipient = %message.email,
                subject = %message.subject,
                error = ?err,
                "{}", SEND_FAILURE_MESSAGE
            );
            return Err(ApiError::general(
                StatusCode::INTERNAL_SERVER_ERROR,
                SEND_FAILURE_MESSAGE,
            ));
        }

        info!(recipient = %message.email, subject = %message.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::TokenConfig;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, email: &Email) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp connection refused");
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn tokens() -> TokenService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap(),
        ));
        TokenService::new(
            TokenConfig {
                secret: "mail-test-secret".to_string(),
                default_token_expiration: 600,
                rsa_private_key_path: None,
                rsa_public_key_path: None,
            },
            clock,
        )
    }

    fn config() -> NotificationsConfig {
        NotificationsConfig {
            sender_company: "Acme Corp".to_string(),
            sender_system: "Payroll".to_string(),
            mail_sender: "no-reply@acme.test".to_string(),
            recovery_page_url: "https://payroll.acme.test/recover?token=".to_string(),
            confirmation_page_url: "https://payroll.acme.test/confirm?token=".to_string(),
            recovery_token_expiration: 7200 + 1800,
        }
    }

    fn mailer(fail: bool) -> AccountMailer<RecordingTransport> {
        AccountMailer::new(
            RecordingTransport {
                fail,
                ..Default::default()
            },
            tokens(),
            Arc::new(ResourceCache::with_defaults()),
            config(),
        )
    }

    #[test]
    fn test_recovery_mail_contents() {
        let mailer = mailer(false);
        tokio_test::block_on(mailer.send_recovery_mail("Ana", "ana", "ana@acme.test")).unwrap();

        let sent = mailer.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let email = &sent[0];
        assert_eq!(email.name, "Ana");
        assert_eq!(email.email, "ana@acme.test");
        assert!(email.subject.contains("Payroll"));
        assert!(email.body.contains("Acme Corp"));
        assert!(email.body.contains("ana@acme.test"));
        assert!(email.body.contains("expires in 2 hours"));
        assert!(!email.body.contains("{RecoveryUrl}"));
    }

    #[test]
    fn test_recovery_link_carries_name_token() {
        let mailer = mailer(false);
        tokio_test::block_on(mailer.send_recovery_mail("Ana", "ana", "ana@acme.test")).unwrap();

        let sent = mailer.transport.sent.lock().unwrap();
        let prefix = "https://payroll.acme.test/recover?token=";
        let start = sent[0].body.find(prefix).unwrap() + prefix.len();
        let token: String = sent[0].body[start..]
            .chars()
            .take_while(|c| *c != '"')
            .collect();

        let service = tokens();
        let decoded = service.decode_token(&token, &service.symmetric_key()).unwrap();
        assert_eq!(decoded.claims.name(), Some("ana"));
        assert_eq!(decoded.claims.keys().count(), 1);
        assert_eq!((decoded.expires_at - decoded.issued_at).num_seconds(), 9000);
    }

    #[test]
    fn test_password_updated_mail() {
        let mailer = mailer(false);
        tokio_test::block_on(mailer.send_password_updated_mail("Ana", "ana@acme.test")).unwrap();

        let sent = mailer.transport.sent.lock().unwrap();
        assert!(sent[0].subject.contains("password has changed"));
        assert!(sent[0].body.contains("Payroll"));
    }

    #[test]
    fn test_email_confirmation_includes_process_id() {
        let mailer = mailer(false);
        tokio_test::block_on(mailer.send_email_confirmation(
            "Ana",
            "ana",
            "ana@acme.test",
            "PRC-2024-77",
        ))
        .unwrap();

        let sent = mailer.transport.sent.lock().unwrap();
        assert!(sent[0].subject.contains("PRC-2024-77"));
        assert!(sent[0].body.contains("PRC-2024-77"));
    }

    #[test]
    fn test_transport_failure_is_general_500() {
        let mailer = mailer(true);
        let err = tokio_test::block_on(mailer.send_password_updated_mail("Ana", "ana@acme.test"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GeneralApplication);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), SEND_FAILURE_MESSAGE);
    }
}
