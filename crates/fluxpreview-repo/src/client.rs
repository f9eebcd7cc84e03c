//! Repository transport
//!
//! Credentials are scoped to the repository's origin: they are attached to
//! a request only when the target shares scheme, host and port with the
//! repository URL, unless the entry opts into `pass_credentials_all`.
//! Redirects are followed by hand so the same check applies to every hop.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use url::Url;

use crate::config::RepositoryEntry;
use crate::error::{REQUEST_TIMEOUT_SECS, RepoError, Result};

const MAX_REDIRECTS: u32 = 10;

/// Fetches raw repository content
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Bytes of `<url>/index.yaml`
    async fn fetch_index(&self, entry: &RepositoryEntry) -> Result<Vec<u8>>;

    /// Bytes of a chart archive at an absolute URL
    async fn fetch_chart(&self, entry: &RepositoryEntry, url: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) client with per-repository TLS settings
#[derive(Default)]
pub struct HttpClient {
    /// Built clients by repository name; TLS settings differ per entry
    clients: DashMap<String, reqwest::Client>,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, entry: &RepositoryEntry) -> Result<reqwest::Client> {
        if let Some(client) = self.clients.get(&entry.name) {
            return Ok(client.clone());
        }

        let tls_error = |message: String| RepoError::InvalidTls {
            name: entry.name.clone(),
            message,
        };

        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(entry.insecure_skip_tls_verify);

        if let Some(ca) = &entry.tls.ca {
            let cert = reqwest::Certificate::from_pem(ca.as_bytes())
                .map_err(|e| tls_error(format!("CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        match (&entry.tls.cert, &entry.tls.key) {
            (Some(cert), Some(key)) => {
                let pem = format!("{}\n{}", cert.trim_end(), key.trim_end());
                let identity = reqwest::Identity::from_pem(pem.as_bytes())
                    .map_err(|e| tls_error(format!("client certificate: {}", e)))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(tls_error(
                    "client certificate and key must be provided together".to_string(),
                ));
            }
        }

        let client = builder.build().map_err(|e| tls_error(e.to_string()))?;
        self.clients.insert(entry.name.clone(), client.clone());
        Ok(client)
    }

    async fn get(&self, entry: &RepositoryEntry, url: &str) -> Result<Vec<u8>> {
        let client = self.client_for(entry)?;
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let mut request = client.get(&current);
            if sends_credentials(entry, &current) {
                if let Some(username) = &entry.username {
                    request = request.basic_auth(username, entry.password.as_deref());
                }
            } else if entry.username.is_some() {
                tracing::debug!(url = %current, repo = %entry.name, "Credentials withheld from foreign origin");
            }

            let response = request
                .send()
                .await
                .map_err(|e| RepoError::from_reqwest(&current, e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| RepoError::NetworkError {
                        url: current.clone(),
                        message: "redirect without Location header".to_string(),
                    })?;
                current = Url::parse(&current)
                    .and_then(|base| base.join(location))
                    .map(String::from)
                    .map_err(|e| RepoError::InvalidRepositoryUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?;
                continue;
            }

            if !status.is_success() {
                return Err(RepoError::HttpError {
                    url: current,
                    status: status.as_u16(),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| RepoError::from_reqwest(&current, e))?;
            return Ok(bytes.to_vec());
        }

        Err(RepoError::TooManyRedirects {
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl RepositoryClient for HttpClient {
    async fn fetch_index(&self, entry: &RepositoryEntry) -> Result<Vec<u8>> {
        let url = entry.index_url();
        tracing::debug!(repo = %entry.name, url = %url, "Downloading repository index");
        self.get(entry, &url).await
    }

    async fn fetch_chart(&self, entry: &RepositoryEntry, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(repo = %entry.name, url = %url, "Downloading chart archive");
        self.get(entry, url).await
    }
}

fn sends_credentials(entry: &RepositoryEntry, target: &str) -> bool {
    entry.pass_credentials_all || same_origin(&entry.url, target)
}

/// Same scheme, host and port
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host() == b.host()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}
