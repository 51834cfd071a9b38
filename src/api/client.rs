use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::measure::{PoolMeasure, SurveyPayload};

/// Production endpoint of the Flipr cloud API.
pub const BASE_URL: &str = "https://apis.goflipr.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum FliprError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Flipr API returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Sign-in rejected: {0}")]
    Auth(String),

    #[error("Unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Client is not signed in")]
    NotSignedIn,
}

pub type Result<T> = std::result::Result<T, FliprError>;

/// Blocking REST client for the Flipr cloud API.
///
/// Credentials are exchanged for a bearer token once via [`sign_in`];
/// the token is not refreshed afterwards.
///
/// [`sign_in`]: FliprClient::sign_in
pub struct FliprClient {
    base_url: String,
    email: String,
    password: String,
    token: Option<String>,
    http: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModuleInfo {
    serial: String,
}

impl FliprClient {
    pub fn new(email: &str, password: &str) -> Result<Self> {
        Self::with_base_url(BASE_URL, email, password)
    }

    pub fn with_base_url(base_url: &str, email: &str, password: &str) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(FliprClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            password: password.to_string(),
            token: None,
            http,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange the configured credentials for a bearer token.
    pub fn sign_in(&mut self) -> Result<()> {
        info!("Signing in to Flipr API as {}", self.email);

        let resp = self
            .http
            .post(self.api_url("/oauth2/token"))
            .form(&[
                ("grant_type", "password"),
                ("username", self.email.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(FliprError::Auth(format!("{status}: {body}")));
        }

        let token: TokenResponse = resp.json()?;
        self.token = Some(token.access_token);
        info!("Flipr sign-in succeeded");
        Ok(())
    }

    fn authed_get(&self, path: &str) -> Result<Response> {
        let token = self.token.as_ref().ok_or(FliprError::NotSignedIn)?;

        let resp = self
            .http
            .get(self.api_url(path))
            .bearer_auth(token)
            .send()?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(FliprError::Api { status, body });
        }

        Ok(resp)
    }

    /// List the serials of every Flipr module bound to the account.
    pub fn search_flipr_ids(&self) -> Result<Vec<String>> {
        let modules: Vec<ModuleInfo> = self.authed_get("/modules")?.json()?;
        let ids: Vec<String> = modules.into_iter().map(|m| m.serial).collect();
        info!("Account has {} Flipr module(s): {:?}", ids.len(), ids);
        Ok(ids)
    }

    /// Fetch the latest pool survey for one Flipr device.
    pub fn get_pool_measure_latest(&self, flipr_id: &str) -> Result<PoolMeasure> {
        debug!("Fetching latest pool measure for Flipr {}", flipr_id);

        let body = self
            .authed_get(&format!("/modules/{flipr_id}/survey/last"))?
            .text()?;
        let raw: SurveyPayload = serde_json::from_str(&body)?;
        let measure = PoolMeasure::from(raw);

        debug!(
            "Flipr {}: chlorine {} mV, pH {}, {} °C, redox {} mV at {}",
            flipr_id,
            measure.chlorine,
            measure.ph,
            measure.temperature,
            measure.red_ox,
            measure.date_time
        );
        Ok(measure)
    }
}
