//! Authenticated session handling for one array
//!
//! The array hands out a token header and an `auth_cookie` on login; both must
//! accompany every later call. Sessions expire silently, which the array
//! signals with 401 (or a 302 to its login page); the client then calls
//! [`SessionManager::refresh`] and retries once.

use crate::error::{ClientError, Result};
use crate::models::Target;
use crate::observability::{ExporterMetrics, StructuredLogger};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{RequestBuilder, StatusCode};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// Response header carrying the session token
pub const TOKEN_HEADER: &str = "DELL-EMC-TOKEN";
/// Cookie set by the login endpoint
pub const AUTH_COOKIE: &str = "auth_cookie";
/// Login endpoint, relative to the REST base URL
pub const LOGIN_PATH: &str = "login_session";

/// Token and cookie captured from one successful login
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: String,
    cookie: String,
    /// Number of logins performed before this session; 0 means never logged in
    generation: u64,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_established(&self) -> bool {
        self.generation > 0
    }

    /// Attach the session credentials to a request
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        if !self.is_established() {
            return request;
        }
        request
            .header(TOKEN_HEADER, &self.token)
            .header(COOKIE, format!("{}={}", AUTH_COOKIE, self.cookie))
    }
}

/// Owns the session of a single array
pub struct SessionManager {
    ip: String,
    user: String,
    password: String,
    login_url: Url,
    http: reqwest::Client,
    current: RwLock<Session>,
    /// Serializes refreshes so a burst of 401s produces a single login
    refresh_lock: Mutex<()>,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
}

impl SessionManager {
    pub fn new(target: &Target, base_url: &Url, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            ip: target.ip.clone(),
            user: target.user.clone(),
            password: target.password.clone(),
            login_url: base_url.join(LOGIN_PATH)?,
            http,
            current: RwLock::new(Session::default()),
            refresh_lock: Mutex::new(()),
            metrics: ExporterMetrics::new(),
            logger: StructuredLogger::new(target.ip.clone()),
        })
    }

    /// Snapshot of the session currently in use
    pub async fn current(&self) -> Session {
        self.current.read().await.clone()
    }

    /// Log in with basic auth and store the resulting session.
    ///
    /// Never retries; the caller decides what to do with an [`ClientError::Auth`].
    pub async fn authenticate(&self) -> Result<Session> {
        let response = self
            .http
            .get(self.login_url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let token = response
                    .headers()
                    .get(TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let cookie = response
                    .cookies()
                    .find(|c| c.name() == AUTH_COOKIE)
                    .map(|c| c.value().to_string())
                    .unwrap_or_default();

                if token.is_empty() {
                    warn!(ip = %self.ip, "Login succeeded without a session token header");
                }

                let mut current = self.current.write().await;
                let session = Session {
                    token,
                    cookie,
                    generation: current.generation + 1,
                };
                *current = session.clone();
                drop(current);

                if session.generation > 1 {
                    self.metrics.inc_relogins(&self.ip);
                    self.logger.log_relogin(&self.ip, session.generation);
                } else {
                    info!(ip = %self.ip, "Logged in to array");
                }
                Ok(session)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(ip = %self.ip, status = status.as_u16(), "Array rejected login");
                Err(ClientError::Auth {
                    ip: self.ip.clone(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Replace `stale` with a fresh session.
    ///
    /// If another request already refreshed the session since `stale` was
    /// taken, the newer session is returned without logging in again.
    pub async fn refresh(&self, stale: &Session) -> Result<Session> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.current().await;
        if current.generation != stale.generation {
            debug!(ip = %self.ip, "Session already refreshed by a concurrent request");
            return Ok(current);
        }

        warn!(ip = %self.ip, "Authentication token is invalid, logging in again");
        self.authenticate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::build_http_client;
    use mockito::Server;

    fn manager(server: &Server) -> SessionManager {
        let target = Target::new("10.0.0.1", "admin", "secret", "v3");
        let base = Url::parse(&format!("{}/api/rest/", server.url())).unwrap();
        SessionManager::new(&target, &base, build_http_client().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_captures_token_and_cookie() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("GET", "/api/rest/login_session")
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .with_status(200)
            .with_header(TOKEN_HEADER, "token-1")
            .with_header("set-cookie", "auth_cookie=cookie-1; Path=/; Secure")
            .with_body("[]")
            .create_async()
            .await;

        let sessions = manager(&server);
        let session = sessions.authenticate().await.unwrap();

        assert_eq!(session.token(), "token-1");
        assert_eq!(session.cookie(), "cookie-1");
        assert_eq!(session.generation(), 1);
        assert_eq!(sessions.current().await, session);
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate_accepts_created() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/rest/login_session")
            .with_status(201)
            .with_header(TOKEN_HEADER, "token-2")
            .create_async()
            .await;

        let session = manager(&server).authenticate().await.unwrap();
        assert_eq!(session.token(), "token-2");
        assert_eq!(session.cookie(), "");
    }

    #[tokio::test]
    async fn test_authenticate_failure_carries_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/rest/login_session")
            .with_status(403)
            .with_body("bad credentials")
            .create_async()
            .await;

        let sessions = manager(&server);
        let err = sessions.authenticate().await.unwrap_err();

        match err {
            ClientError::Auth { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!sessions.current().await.is_established());
    }

    #[tokio::test]
    async fn test_refresh_skips_login_when_already_refreshed() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("GET", "/api/rest/login_session")
            .with_status(200)
            .with_header(TOKEN_HEADER, "token-3")
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server);
        let stale = sessions.current().await;

        let first = sessions.refresh(&stale).await.unwrap();
        let second = sessions.refresh(&stale).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.generation(), 1);
        login.assert_async().await;
    }

    #[test]
    fn test_unestablished_session_adds_no_headers() {
        let http = reqwest::Client::new();
        let request = Session::default()
            .apply(http.get("http://localhost/"))
            .build()
            .unwrap();
        assert!(request.headers().get(TOKEN_HEADER).is_none());
        assert!(request.headers().get(COOKIE).is_none());
    }

    fn relogins_for(ip: &str) -> f64 {
        prometheus::gather()
            .iter()
            .filter(|f| f.get_name() == "powerstore_exporter_relogins_total")
            .flat_map(|f| f.get_metric().iter())
            .filter(|m| m.get_label().iter().any(|l| l.get_value() == ip))
            .map(|m| m.get_counter().get_value())
            .sum()
    }

    #[tokio::test]
    async fn test_only_refreshes_count_as_relogins() {
        let ip = "10.0.0.77";
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/rest/login_session")
            .with_status(200)
            .with_header(TOKEN_HEADER, "token-4")
            .create_async()
            .await;

        let target = Target::new(ip, "admin", "secret", "v3");
        let base = Url::parse(&format!("{}/api/rest/", server.url())).unwrap();
        let sessions = SessionManager::new(&target, &base, build_http_client().unwrap()).unwrap();

        let first = sessions.authenticate().await.unwrap();
        assert_eq!(relogins_for(ip), 0.0);

        sessions.refresh(&first).await.unwrap();
        assert_eq!(relogins_for(ip), 1.0);
    }
}
