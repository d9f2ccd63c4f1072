//! Credential store backing the authenticated API client.
//!
//! Tokens live in `<config dir>/entigraph/credentials.json`. `ENTIGRAPH_TOKEN`
//! takes precedence over the store, which is convenient for CI.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{config::Config, server};

pub const TOKEN_ENV: &str = "ENTIGRAPH_TOKEN";

/// Tokens expiring within this window are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now + Duration::seconds(REFRESH_MARGIN_SECS))
    }
}

pub struct AuthManager;

impl AuthManager {
    /// Bearer token for API calls, refreshed through the token endpoint when
    /// it is about to expire.
    pub async fn get_cli_token() -> Result<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                debug!("Using token from {}", TOKEN_ENV);
                return Ok(token);
            }
        }

        let creds = Self::load()?
            .ok_or_else(|| anyhow!("Not logged in. Run `entigraph auth login` first"))?;
        let now = Utc::now();
        if !creds.needs_refresh(now) {
            return Ok(creds.access_token);
        }

        match creds.refresh_token.as_deref() {
            Some(refresh_token) => {
                let config = Config::load()?;
                info!("Access token expiring, refreshing");
                let res = server::refresh_access_token(
                    &config.api_url,
                    refresh_token,
                    config.trust_invalid_server_cert,
                    config.request_retries,
                )
                .await
                .context("Failed to refresh access token")?;
                let refreshed = Credentials::new(
                    res.access_token,
                    res.refresh_token.or(creds.refresh_token.clone()),
                    res.expires_in,
                );
                Self::save(&refreshed)?;
                Ok(refreshed.access_token)
            }
            None if creds.is_expired(now) => Err(anyhow!(
                "Access token expired. Run `entigraph auth login` again"
            )),
            None => Ok(creds.access_token),
        }
    }

    pub fn login(token: String, refresh_token: Option<String>, expires_in: Option<i64>) -> Result<()> {
        let creds = Credentials::new(token, refresh_token, expires_in);
        Self::save(&creds)?;
        println!("Logged in. Credentials stored in {:?}", Self::credentials_path()?);
        Ok(())
    }

    pub fn logout() -> Result<()> {
        let path = Self::credentials_path()?;
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove credentials")?;
        }
        println!("Logged out");
        Ok(())
    }

    pub fn status() -> Result<()> {
        if std::env::var(TOKEN_ENV).is_ok_and(|t| !t.is_empty()) {
            println!("Authenticated via {}", TOKEN_ENV);
            return Ok(());
        }
        match Self::load()? {
            None => println!("Not logged in"),
            Some(creds) => match creds.expires_at {
                Some(at) if creds.is_expired(Utc::now()) && creds.refresh_token.is_none() => {
                    println!("Token expired at {}", at.to_rfc3339())
                }
                Some(at) => println!("Logged in, token expires at {}", at.to_rfc3339()),
                None => println!("Logged in, token has no expiry"),
            },
        }
        Ok(())
    }

    fn load() -> Result<Option<Credentials>> {
        let path = Self::credentials_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credentials")?;
        let creds = serde_json::from_str(&contents).context("Failed to parse credentials")?;
        Ok(Some(creds))
    }

    /// Written through a temp file in the same directory and renamed into place.
    fn save(creds: &Credentials) -> Result<()> {
        let path = Self::credentials_path()?;
        let dir = path.parent().context("Failed to get credentials directory")?;
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;

        let contents = serde_json::to_vec_pretty(creds).context("Failed to serialize credentials")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).context("Failed to create temp file")?;
        tmp.write_all(&contents).context("Failed to write credentials")?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .context("Failed to store credentials")?;
        Ok(())
    }

    fn credentials_path() -> Result<PathBuf> {
        Ok(Config::config_dir()?.join("credentials.json"))
    }
}
