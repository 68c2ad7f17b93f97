//! HashiCorp Vault KV v2 backend.
//!
//! Writes the batch as the data of one KV v2 secret over the HTTP API.
//! Enable with `--features vault`.
//!
//! ## Usage
//!
//! ```toml
//! [write]
//! backend = "vault"
//! path = "secret/data/flux/prod"
//!
//! [vault]
//! address = "https://vault.example.com:8200"
//! auth_method = "token"
//! ```
//!
//! Token auth checks `token_env`, `token_file`, `VAULT_TOKEN`, then
//! `~/.vault-token`. AppRole auth logs in with `role_id` and `secret_id`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{Backend, CommitToken};
use crate::core::batch::Secrets;
use crate::core::config::{VaultAuth, VaultConfig};
use crate::core::resolver::Reference;
use crate::error::{ConfigError, ResolveError, Result, StoreError};

const NAME: &str = "vault";
const ADDR_ENV: &str = "VAULT_ADDR";
const TOKEN_ENV: &str = "VAULT_TOKEN";
const TOKEN_HEADER: &str = "X-Vault-Token";

pub struct VaultKv {
    path: String,
    client: VaultClient,
}

impl VaultKv {
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if no address is configured or
    /// AppRole auth lacks its credentials.
    pub fn new(path: &str, config: &VaultConfig) -> Result<Self> {
        Ok(Self {
            path: path.trim_matches('/').to_string(),
            client: VaultClient::from_config(config)?,
        })
    }
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    data: &'a Secrets,
}

#[derive(Deserialize)]
struct WriteResponse {
    data: WriteData,
}

#[derive(Deserialize)]
struct WriteData {
    version: u64,
}

#[derive(Serialize)]
struct AppRoleLogin<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

impl Backend for VaultKv {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        trace!(path = %self.path, "writing to Vault");

        let rt = super::runtime()
            .map_err(|e| commit_failed(format!("failed to create runtime: {}", e)))?;

        let version = rt
            .block_on(async {
                let token = self.client.token().await?;
                let response = self
                    .client
                    .http
                    .post(self.client.url(&self.path))
                    .header(TOKEN_HEADER, token.as_str())
                    .json(&WriteRequest { data: secrets })
                    .send()
                    .await
                    .map_err(|e| format!("writing {}: {}", self.path, e))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(format!("writing {}: {} {}", self.path, status, body.trim()));
                }

                response
                    .json::<WriteResponse>()
                    .await
                    .map(|r| r.data.version)
                    .map_err(|e| format!("reading write response: {}", e))
            })
            .map_err(commit_failed)?;

        debug!(path = %self.path, version, "wrote Vault secret");
        Ok(CommitToken::new(version.to_string()))
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String {
        format!(
            "ref+vault://{}?version={}#/{}/{}/{}",
            self.path, token, namespace, name, key
        )
    }
}

/// Fetch the stored document a reference points at, rendered as YAML.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if Vault has no such secret or version,
/// and `ResolveError::Unavailable` for any other failure.
pub fn fetch(reference: &Reference, config: &VaultConfig) -> Result<Zeroizing<String>> {
    let client = VaultClient::from_config(config)?;
    let path = reference.location.trim_matches('/');

    trace!(path, "reading from Vault");

    let rt = super::runtime().map_err(|e| unavailable(format!("failed to create runtime: {}", e)))?;

    let data = rt
        .block_on(async {
            let token = client.token().await?;
            let mut request = client
                .http
                .get(client.url(path))
                .header(TOKEN_HEADER, token.as_str());
            if let Some(version) = reference.query("version").filter(|v| !v.is_empty()) {
                request = request.query(&[("version", version)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| format!("reading {}: {}", path, e))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(format!("reading {}: {} {}", path, status, body.trim()));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map(Some)
                .map_err(|e| format!("reading response: {}", e))
        })
        .map_err(unavailable)?
        .and_then(secret_data)
        .ok_or_else(|| ResolveError::NotFound {
            reference: reference.raw.clone(),
        })?;

    serde_yaml::to_string(&data)
        .map(Zeroizing::new)
        .map_err(|e| unavailable(format!("rendering secret data: {}", e)))
}

/// The secret payload of a read response.
///
/// KV v2 nests it as `data.data` next to `data.metadata`. KV v1 returns it
/// directly as `data`.
fn secret_data(mut body: serde_json::Value) -> Option<serde_json::Value> {
    let mut data = body.get_mut("data")?.take();
    if data.get("metadata").is_some() {
        if let Some(inner) = data.get_mut("data") {
            data = inner.take();
        }
    }
    (!data.is_null()).then_some(data)
}

struct VaultClient {
    address: String,
    config: VaultConfig,
    http: reqwest::Client,
}

impl VaultClient {
    fn from_config(config: &VaultConfig) -> Result<Self> {
        let address = config
            .address
            .clone()
            .or_else(|| std::env::var(ADDR_ENV).ok().filter(|a| !a.is_empty()))
            .ok_or(ConfigError::MissingField {
                field: "Vault address (--vault-addr or VAULT_ADDR)",
            })?;

        if config.auth_method == VaultAuth::Approle {
            if config.role_id.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField {
                    field: "vault.role_id for approle auth",
                }
                .into());
            }
            if config.secret_id.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField {
                    field: "vault.secret_id for approle auth",
                }
                .into());
            }
        }

        // local dev servers run with self-signed certificates
        let insecure = address.contains("127.0.0.1");
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "Vault address",
                reason: e.to_string(),
            })?;

        Ok(Self {
            address: address.trim_end_matches('/').to_string(),
            config: config.clone(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path)
    }

    async fn token(&self) -> std::result::Result<Zeroizing<String>, String> {
        match self.config.auth_method {
            VaultAuth::Token => self.static_token(),
            VaultAuth::Approle => self.approle_login().await,
        }
    }

    fn static_token(&self) -> std::result::Result<Zeroizing<String>, String> {
        if let Some(var) = &self.config.token_env {
            return std::env::var(var)
                .ok()
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new)
                .ok_or_else(|| {
                    format!(
                        "token_env configured to read the Vault token from {}, but it isn't set",
                        var
                    )
                });
        }

        if let Some(file) = &self.config.token_file {
            return read_token_file(file);
        }

        if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            return Ok(Zeroizing::new(token));
        }

        dirs::home_dir()
            .map(|home| home.join(".vault-token"))
            .filter(|p| p.exists())
            .ok_or_else(|| "no Vault token: set VAULT_TOKEN or write ~/.vault-token".to_string())
            .and_then(|p| read_token_file(&p))
    }

    async fn approle_login(&self) -> std::result::Result<Zeroizing<String>, String> {
        let login = AppRoleLogin {
            role_id: self.config.role_id.as_deref().unwrap_or_default(),
            secret_id: self.config.secret_id.as_deref().unwrap_or_default(),
        };

        let response = self
            .http
            .post(self.url("auth/approle/login"))
            .json(&login)
            .send()
            .await
            .map_err(|e| format!("approle login: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("approle login: {}", status));
        }

        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| format!("approle login response: {}", e))?
            .auth
            .map(|a| Zeroizing::new(a.client_token))
            .ok_or_else(|| "approle login returned no auth info".to_string())
    }
}

fn read_token_file(path: &Path) -> std::result::Result<Zeroizing<String>, String> {
    std::fs::read_to_string(path)
        .map(|t| Zeroizing::new(t.trim().to_string()))
        .map_err(|e| format!("reading token file {}: {}", path.display(), e))
}

fn commit_failed(reason: String) -> crate::error::Error {
    StoreError::CommitFailed {
        backend: NAME,
        reason,
    }
    .into()
}

fn unavailable(reason: String) -> crate::error::Error {
    ResolveError::Unavailable {
        scheme: NAME,
        reason,
    }
    .into()
}
