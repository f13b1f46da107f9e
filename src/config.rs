use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::code::{DEFAULT_CODE_LENGTH, DEFAULT_CODE_PREFIX};
use crate::render::image::DEFAULT_IMAGE_RENDERER_URL;
use crate::services::transaction_service::DEFAULT_MAX_CODE_ATTEMPTS;
use crate::validation::TRANSACTION_CODE_MAX_LEN;

pub const DEFAULT_SHOP_NAME: &str = "Neon Electronics";
/// Receipt dates are printed in shop-local time, WIB by default.
pub const DEFAULT_RECEIPT_UTC_OFFSET_HOURS: i32 = 7;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub admin_api_key: String,
    pub image_renderer_url: String,
    pub invoice_service_url: Option<String>,
    pub shop_name: String,
    pub receipt_utc_offset_hours: i32,
    pub render_attempt_timeout_secs: u64,
    pub provider_failure_threshold: u32,
    pub provider_reset_secs: u64,
    pub code_prefix: String,
    pub code_length: usize,
    pub max_code_attempts: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            admin_api_key: env::var("ADMIN_API_KEY").context("ADMIN_API_KEY is required")?,
            image_renderer_url: env::var("IMAGE_RENDERER_URL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_RENDERER_URL.to_string()),
            invoice_service_url: env::var("INVOICE_SERVICE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            shop_name: env::var("RECEIPT_SHOP_NAME").unwrap_or_else(|_| DEFAULT_SHOP_NAME.to_string()),
            receipt_utc_offset_hours: parse_or(
                "RECEIPT_UTC_OFFSET_HOURS",
                DEFAULT_RECEIPT_UTC_OFFSET_HOURS,
            )?,
            render_attempt_timeout_secs: parse_or("RENDER_ATTEMPT_TIMEOUT_SECS", 15)?,
            provider_failure_threshold: parse_or("PROVIDER_FAILURE_THRESHOLD", 3)?,
            provider_reset_secs: parse_or("PROVIDER_RESET_SECS", 60)?,
            code_prefix: env::var("CODE_PREFIX").unwrap_or_else(|_| DEFAULT_CODE_PREFIX.to_string()),
            code_length: parse_or("CODE_LENGTH", DEFAULT_CODE_LENGTH)?,
            max_code_attempts: parse_or("MAX_CODE_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.admin_api_key.trim().is_empty() {
            anyhow::bail!("ADMIN_API_KEY is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.render_attempt_timeout_secs == 0 {
            anyhow::bail!("RENDER_ATTEMPT_TIMEOUT_SECS must be greater than 0");
        }
        if self.provider_failure_threshold == 0 {
            anyhow::bail!("PROVIDER_FAILURE_THRESHOLD must be greater than 0");
        }
        if !(4..=32).contains(&self.code_length) {
            anyhow::bail!("CODE_LENGTH must be between 4 and 32");
        }
        if self.code_prefix.is_empty()
            || !self
                .code_prefix
                .chars()
                .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
        {
            anyhow::bail!("CODE_PREFIX must be non-empty uppercase letters and digits");
        }
        // prefix, '-', random part
        if self.code_prefix.len() + 1 + self.code_length > TRANSACTION_CODE_MAX_LEN {
            anyhow::bail!(
                "CODE_PREFIX and CODE_LENGTH together exceed {} characters",
                TRANSACTION_CODE_MAX_LEN
            );
        }
        if !(-12..=14).contains(&self.receipt_utc_offset_hours) {
            anyhow::bail!("RECEIPT_UTC_OFFSET_HOURS must be between -12 and 14");
        }
        if self.max_code_attempts == 0 {
            anyhow::bail!("MAX_CODE_ATTEMPTS must be greater than 0");
        }

        url::Url::parse(&self.image_renderer_url)
            .context("IMAGE_RENDERER_URL is not a valid URL")?;
        if let Some(invoice_url) = &self.invoice_service_url {
            url::Url::parse(invoice_url).context("INVOICE_SERVICE_URL is not a valid URL")?;
        }

        Ok(())
    }

    pub fn render_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.render_attempt_timeout_secs)
    }

    pub fn provider_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_reset_secs)
    }

    pub fn receipt_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.receipt_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
