use crate::domain::entities::StatusLabels;
use crate::infrastructure::providers::SmtpSettings;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub attachment_dir: String,
    pub smtp: Option<SmtpSettings>,
    pub status_labels: StatusLabels,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
    pub timeline_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://deskline.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort("SERVER_PORT"))?;

        let attachment_dir =
            env::var("ATTACHMENT_DIR").unwrap_or_else(|_| "./attachments".to_string());

        let smtp = match env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty()) {
            Some(host) => {
                let from = env::var("SMTP_FROM").map_err(|_| ConfigError::MissingSmtpFrom)?;
                let port = env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort("SMTP_PORT"))?;
                Some(SmtpSettings {
                    host,
                    port,
                    username: env::var("SMTP_USERNAME").ok(),
                    password: env::var("SMTP_PASSWORD").ok(),
                    from,
                    starttls: env::var("SMTP_STARTTLS")
                        .map(|v| v != "false" && v != "0")
                        .unwrap_or(true),
                })
            }
            None => None,
        };

        let status_labels = match env::var("STATUS_LABELS") {
            Ok(raw) => StatusLabels::parse(&raw).map_err(ConfigError::InvalidStatusLabels)?,
            Err(_) => StatusLabels::default(),
        };

        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let service_name = env::var("SERVICE_NAME").unwrap_or_else(|_| "deskline".to_string());

        let metrics_port = env::var("METRICS_PORT")
            .unwrap_or_else(|_| "9000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort("METRICS_PORT"))?;

        let timeline_channel_capacity = env::var("TIMELINE_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "64".to_string())
            .parse()
            .unwrap_or(64);

        Ok(Config {
            database_url,
            server_host,
            server_port,
            attachment_dir,
            smtp,
            status_labels,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
            timeline_channel_capacity,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number in {0}")]
    InvalidPort(&'static str),

    #[error("SMTP_FROM must be set when SMTP_HOST is configured")]
    MissingSmtpFrom,

    #[error("Invalid STATUS_LABELS: {0}")]
    InvalidStatusLabels(String),
}
