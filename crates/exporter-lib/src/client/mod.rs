//! REST client for an array's management API
//!
//! [`ArrayClient`] wraps one array's [`SessionManager`] and the process-wide
//! [`RequestBudget`]. Every call holds a budget permit, re-authenticates once
//! on 401/302, and turns any other non-success status into
//! [`ClientError::Status`].

mod budget;
mod resources;
mod session;

pub use budget::{BudgetPermit, RequestBudget, DEFAULT_REQUEST_LIMIT};
pub use resources::{ReportEntity, ReportInterval};
pub use session::{Session, SessionManager, AUTH_COOKIE, LOGIN_PATH, TOKEN_HEADER};

use crate::error::{ClientError, Result};
use crate::models::Target;
use crate::observability::ExporterMetrics;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{redirect, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Total time allowed for one upstream call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Time allowed to establish the TCP/TLS connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used for array calls.
///
/// Arrays ship self-signed certificates, so verification is disabled.
/// Redirects are not followed: a 302 to the login page means the session expired.
pub fn build_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(client)
}

/// Outcome of a single send, before any retry decision
enum Attempt {
    Success(Value),
    SessionExpired { status: u16, body: String },
}

/// Client for one array
pub struct ArrayClient {
    target: Target,
    base_url: Url,
    http: reqwest::Client,
    session: SessionManager,
    budget: RequestBudget,
    metrics: ExporterMetrics,
}

impl ArrayClient {
    /// Client talking to `https://<ip>/api/rest/`
    pub fn new(target: Target, budget: RequestBudget) -> Result<Self> {
        let base_url = format!("https://{}/api/rest/", target.ip);
        Self::with_base_url(target, budget, &base_url)
    }

    /// Client talking to an explicit REST base URL
    pub fn with_base_url(target: Target, budget: RequestBudget, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = build_http_client()?;
        let session = SessionManager::new(&target, &base_url, http.clone())?;

        Ok(Self {
            target,
            base_url,
            http,
            session,
            budget,
            metrics: ExporterMetrics::new(),
        })
    }

    pub fn ip(&self) -> &str {
        &self.target.ip
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Establish a session eagerly (used at startup)
    pub async fn login(&self) -> Result<Session> {
        let _permit = self.budget.acquire().await?;
        self.session.authenticate().await
    }

    /// Issue one call against `<base>/<path>` and decode the JSON response.
    ///
    /// A 401 or 302 triggers a single re-login followed by exactly one retry.
    /// An empty success body decodes to an empty array.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let _permit = self.budget.acquire().await?;
        let url = self.base_url.join(path)?;

        let session = self.session.current().await;
        let (status, body_text) = match self.send(&method, &url, body, &session).await? {
            Attempt::Success(value) => return Ok(value),
            Attempt::SessionExpired { status, body } => (status, body),
        };

        debug!(ip = %self.ip(), path = %path, status = status, "Session rejected, re-authenticating");
        let fresh = self.session.refresh(&session).await?;

        match self.send(&method, &url, body, &fresh).await? {
            Attempt::Success(value) => Ok(value),
            Attempt::SessionExpired { status, body } => {
                warn!(ip = %self.ip(), path = %path, status = status, "Array rejected the refreshed session");
                Err(ClientError::Auth {
                    ip: self.target.ip.clone(),
                    status,
                    body: if body.is_empty() { body_text } else { body },
                })
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        session: &Session,
    ) -> Result<Attempt> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = match session.apply(request).send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.inc_upstream_request(self.ip(), "error");
                warn!(ip = %self.ip(), url = %url, error = %e, "Request to array failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        self.metrics.inc_upstream_request(self.ip(), status.as_str());

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::PARTIAL_CONTENT => {
                let text = response.text().await?;
                if text.trim().is_empty() {
                    return Ok(Attempt::Success(Value::Array(Vec::new())));
                }
                Ok(Attempt::Success(serde_json::from_str(&text)?))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FOUND => Ok(Attempt::SessionExpired {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status {
                    ip: self.target.ip.clone(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
