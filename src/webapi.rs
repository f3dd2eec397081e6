/// Client for the appliance's session-authenticated Web API.
use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result, SESSION_EXPIRED_CODE};

const USER_AGENT: &str = concat!("syno-vm/", env!("CARGO_PKG_VERSION"));

const AUTH_PATH: &str = "/webapi/auth.cgi";
const ENTRY_PATH: &str = "/webapi/entry.cgi";
const AUTH_API: &str = "SYNO.API.Auth";
const AUTH_VERSION: &str = "3";
const SESSION_NAME: &str = "VMM";

/// Fixed timeout for every HTTP round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per call: the first request plus one retry after re-login.
const MAX_CALL_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: i64,
}

impl ApiResponse {
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }

    pub fn is_session_expired(&self) -> bool {
        !self.success && self.error_code() == Some(SESSION_EXPIRED_CODE)
    }

    /// The data payload of a successful response, or an `Api` error.
    pub fn into_data(self) -> Result<HashMap<String, Value>> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(Error::Api {
                code: self.error_code().unwrap_or(0),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Unauthenticated,
    Authenticated { sid: String },
}

/// A login exchanges the account credentials for a session id (`sid`) that
/// is attached to every later call. When a call reports that the session
/// has expired the client logs in again and retries that call once.
pub struct WebApiClient {
    base_url: String,
    http: reqwest::Client,
    username: String,
    password: String,
    state: SessionState,
}

impl WebApiClient {
    /// Client for `https://<host>:<port>`.
    ///
    /// Certificate verification is disabled because appliances ship with
    /// self-signed certificates.
    pub fn new<H, U, P>(host: H, port: u16, username: U, password: P) -> Result<Self>
    where
        H: AsRef<str>,
        U: Into<String>,
        P: Into<String>,
    {
        let base_url = format!("https://{}:{}", host.as_ref(), port);
        Self::with_base_url(base_url, username, password)
    }

    pub fn with_base_url<B, U, P>(base_url: B, username: U, password: P) -> Result<Self>
    where
        B: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            username: username.into(),
            password: password.into(),
            state: SessionState::Unauthenticated,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { sid } => Some(sid),
            SessionState::Unauthenticated => None,
        }
    }

    pub async fn login(&mut self) -> Result<()> {
        let params = [
            ("api", AUTH_API),
            ("version", AUTH_VERSION),
            ("method", "login"),
            ("account", self.username.as_str()),
            ("passwd", self.password.as_str()),
            ("session", SESSION_NAME),
            ("format", "cookie"),
        ];

        debug!("Logging in to {} as {}", self.base_url, self.username);
        let response = self.get(AUTH_PATH, &params).await?;
        if !response.success {
            return Err(Error::Authentication {
                reason: format!("login rejected for {}", self.username),
                code: Some(response.error_code().unwrap_or(0)),
            });
        }

        let sid = response
            .data
            .as_ref()
            .and_then(|data| data.get("sid"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::authentication("login response did not include a session id"))?;

        self.state = SessionState::Authenticated {
            sid: sid.to_string(),
        };
        info!("Logged in to {} as {}", self.base_url, self.username);
        Ok(())
    }

    /// End the session. The session id is dropped even if the request fails.
    pub async fn logout(&mut self) -> Result<()> {
        let sid = match std::mem::replace(&mut self.state, SessionState::Unauthenticated) {
            SessionState::Authenticated { sid } => sid,
            SessionState::Unauthenticated => return Ok(()),
        };

        let params = [
            ("api", AUTH_API),
            ("version", AUTH_VERSION),
            ("method", "logout"),
            ("session", SESSION_NAME),
            ("_sid", sid.as_str()),
        ];
        self.get(AUTH_PATH, &params).await?;
        debug!("Logged out of {}", self.base_url);
        Ok(())
    }

    async fn session(&mut self) -> Result<String> {
        if let SessionState::Authenticated { sid } = &self.state {
            return Ok(sid.clone());
        }
        self.login().await?;
        self.session_id()
            .map(str::to_string)
            .ok_or_else(|| Error::authentication("no session after login"))
    }

    /// Call `api`/`method` at `version` on the entry endpoint.
    ///
    /// A session-expired response triggers one re-login and one retry; the
    /// retry's response is returned whatever it contains.
    pub async fn call_api(
        &mut self,
        api: &str,
        method: &str,
        version: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            let sid = self.session().await?;

            let mut query = vec![
                ("api", api),
                ("method", method),
                ("version", version),
                ("_sid", sid.as_str()),
            ];
            query.extend_from_slice(params);

            debug!("Calling {}.{} v{} (attempt {})", api, method, version, attempt);
            let response = self.get(ENTRY_PATH, &query).await?;

            if !response.is_session_expired() {
                return Ok(response);
            }

            self.state = SessionState::Unauthenticated;
            if attempt >= MAX_CALL_ATTEMPTS {
                warn!("{}.{} failed: session expired again after re-login", api, method);
                return Ok(response);
            }
            info!("Session expired, logging in again");
            attempt += 1;
        }
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(params).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
