use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?.port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()> {
        let body = format!(
            "Welcome to Paragonik!\n\n\
             Confirm your email address by opening the link below:\n\n\
             {link}\n\n\
             If you did not create this account, ignore this message.\n"
        );
        let email = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(to.parse().context("parse recipient address")?)
            .subject("Verify your Paragonik account")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        self.transport
            .send(email)
            .await
            .context("smtp send verification email")?;
        Ok(())
    }
}

/// Used when SMTP is not configured: the link still has to reach the
/// operator somehow, so it goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()> {
        info!(%to, %link, "smtp not configured, verification link logged only");
        Ok(())
    }
}
