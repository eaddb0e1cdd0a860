use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::config::SmtpConfig;

/// What a one-time code is for; decides subject and wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind<'a> {
    EmailVerification { username: &'a str },
    PasswordReset,
}

/// Outbound channel for one-time codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str, kind: CodeKind<'_>) -> anyhow::Result<()>;
}

struct Rendered {
    subject: &'static str,
    text: String,
    html: String,
}

fn render(code: &str, kind: CodeKind<'_>) -> Rendered {
    match kind {
        CodeKind::EmailVerification { username } => Rendered {
            subject: "Email Verification Code",
            text: format!("Hello {username},\n\nYour email verification code is {code}\n"),
            html: format!(
                "<p>Hello {username},</p>\
                 <p>Your email verification code is</p>\
                 <p style=\"font-size:28px;font-weight:bold;letter-spacing:4px\">{code}</p>"
            ),
        },
        CodeKind::PasswordReset => Rendered {
            subject: "Password reset Code",
            text: format!("Your reset password code is {code}\n"),
            html: format!(
                "<p>Your reset password code is</p>\
                 <p style=\"font-size:28px;font-weight:bold;letter-spacing:4px\">{code}</p>\
                 <p>If you did not ask for a password reset you can ignore this email.</p>"
            ),
        },
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// STARTTLS relay with username/password auth.
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("configure smtp relay {}", config.host))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_code(&self, to: &str, code: &str, kind: CodeKind<'_>) -> anyhow::Result<()> {
        let rendered = render(code, kind);
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>().context("invalid from address")?)
            .to(to.parse::<Mailbox>().context("invalid recipient address")?)
            .subject(rendered.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(rendered.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(rendered.html),
                    ),
            )
            .context("build email message")?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %to, subject = rendered.subject, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %to, error = %e, "smtp send failed");
                Err(anyhow::Error::new(e).context("smtp send"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_mail_greets_user_and_carries_code() {
        let r = render("482913", CodeKind::EmailVerification { username: "anna" });
        assert_eq!(r.subject, "Email Verification Code");
        assert!(r.text.contains("anna"));
        assert!(r.text.contains("482913"));
        assert!(r.html.contains("482913"));
    }

    #[test]
    fn reset_mail_carries_code() {
        let r = render("100000", CodeKind::PasswordReset);
        assert_eq!(r.subject, "Password reset Code");
        assert!(r.text.contains("100000"));
    }
}
