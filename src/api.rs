// API client module: a small blocking HTTP client for the patient
// management service. One call, one request; nothing is retried or cached.

use crate::error::{PmsError, Result};
use crate::model::{today, NewPatient, Patient, PatientPayload, SearchFilter};
use crate::session::Session;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client bound to one base URL and, once logged in, one bearer
/// token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// Login request payload.
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Login response. Only the token matters to the client.
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub access_token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("pms-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(ApiClient {
            client,
            base_url,
            token,
        })
    }

    /// Client for the server and token recorded in `session`.
    pub fn from_session(session: &Session) -> Result<Self> {
        ApiClient::new(session.base_url(), session.access_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(t) = &self.token {
            let mut val = HeaderValue::from_str(&format!("Bearer {}", t)).map_err(|_| {
                PmsError::invalid("stored access token is not a valid header value")
            })?;
            val.set_sensitive(true);
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    /// Start a request against `{base_url}{path}` with the bearer header
    /// attached when a token is present.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path);
        debug!(%method, %url, authenticated = self.has_token(), "sending request");
        Ok(self.client.request(method, url).headers(self.auth_headers()?))
    }

    /// Send and turn any non-2xx status into `PmsError::Http`.
    fn send(&self, req: RequestBuilder) -> Result<Response> {
        let res = req.send()?;
        let status = res.status();
        if !status.is_success() {
            let url = res.url().clone();
            let body = res.text().unwrap_or_default();
            warn!(%status, %url, "request rejected");
            return Err(PmsError::Http { status, body });
        }
        Ok(res)
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let text = self.send(req)?.text()?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like `send_json`, but an empty body decodes as `T::default()`.
    fn send_json_or_default<T: DeserializeOwned + Default>(
        &self,
        req: RequestBuilder,
    ) -> Result<T> {
        let text = self.send(req)?.text()?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// POST /auth/login. Returns the issued token; persisting it is the
    /// caller's job.
    pub fn login(&self, identifier: &str, password: &str) -> Result<String> {
        if identifier.trim().is_empty() || password.is_empty() {
            return Err(PmsError::invalid("login needs a username and a password"));
        }
        let body = AuthRequest {
            username: identifier.trim().to_string(),
            password: password.to_string(),
        };
        let req = self.request(Method::POST, "/auth/login")?.json(&body);
        let resp: AuthResponse = self.send_json(req)?;
        if resp.access_token.trim().is_empty() {
            return Err(PmsError::Decode(serde_json::Error::custom(
                "login response carried an empty access_token",
            )));
        }
        Ok(resp.access_token)
    }

    /// GET /api/patients
    pub fn list_patients(&self) -> Result<Vec<Patient>> {
        let req = self.request(Method::GET, "/api/patients")?;
        self.send_json(req)
    }

    /// GET /api/patients/search. Exactly one of `name` / `email` must be
    /// given; otherwise fails before touching the network.
    pub fn search_patients(&self, name: Option<&str>, email: Option<&str>) -> Result<Vec<Patient>> {
        let filter = SearchFilter::from_options(name, email)?;
        self.search(&filter)
    }

    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Patient>> {
        let req = self
            .request(Method::GET, "/api/patients/search")?
            .query(&[("query", filter.query()), ("flag", filter.flag())]);
        self.send_json(req)
    }

    /// First patient whose search by email matches, if any.
    pub fn get_patient_by_email(&self, email: &str) -> Result<Option<Patient>> {
        let matches = self.search_patients(None, Some(email))?;
        Ok(matches.into_iter().next())
    }

    /// POST /api/patients. `registeredDate` is always today's local date.
    pub fn create_patient(&self, patient: NewPatient) -> Result<Patient> {
        patient.validate()?;
        let payload = patient.into_payload(today());
        let req = self.request(Method::POST, "/api/patients")?.json(&payload);
        self.send_json_or_default(req)
    }

    /// PUT /api/patients/update-by-email. `payload` is expected to be
    /// already merged with the current record.
    pub fn update_patient_by_email(
        &self,
        email: &str,
        payload: &PatientPayload,
    ) -> Result<Patient> {
        let email = required("email", email)?;
        let req = self
            .request(Method::PUT, "/api/patients/update-by-email")?
            .query(&[("email", email)])
            .json(payload);
        self.send_json_or_default(req)
    }

    /// DELETE /api/patients/{id}
    pub fn delete_patient_by_id(&self, id: &str) -> Result<()> {
        let id = required("id", id)?;
        if id.contains(['/', '?', '#']) {
            return Err(PmsError::invalid(format!("`{id}` is not a patient id")));
        }
        let req = self.request(Method::DELETE, &format!("/api/patients/{id}"))?;
        self.send(req)?;
        Ok(())
    }

    /// DELETE /api/patients/delete-by-email
    pub fn delete_patient_by_email(&self, email: &str) -> Result<()> {
        let email = required("email", email)?;
        let req = self
            .request(Method::DELETE, "/api/patients/delete-by-email")?
            .query(&[("email", email)]);
        self.send(req)?;
        Ok(())
    }

    /// GET /api/analytics/status, passed through untouched.
    pub fn analytics_status(&self) -> Result<serde_json::Value> {
        let req = self.request(Method::GET, "/api/analytics/status")?;
        self.send_json_or_default(req)
    }
}

fn required<'a>(label: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PmsError::invalid(format!("{label} must not be empty")));
    }
    Ok(value)
}
