use std::path::PathBuf;

/// SMTP settings for the verification mailer. Absent in local setups,
/// in which case the mailer only logs the verification link.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub cookie_secure: bool,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "public/uploads".into())
            .into();
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into());

        // Secure cookies everywhere except explicit local development.
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or_else(|_| {
                std::env::var("APP_ENV")
                    .map(|v| v == "production")
                    .unwrap_or(false)
            });

        let smtp = std::env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Paragonik <no-reply@paragonik.local>".into()),
        });

        Ok(Self {
            database_url,
            upload_dir,
            public_base_url,
            cookie_secure,
            smtp,
        })
    }
}
