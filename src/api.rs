// API client module: a small blocking HTTP client for the AboutMy.email
// API. It covers the four operations the tools need: submitting a message,
// fetching its status, uploading branding content and publishing it.

use crate::error::{Error, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Production endpoint for message submission.
pub const DEFAULT_SERVER: &str = "https://api.aboutmy.email/api/v1";
/// Endpoint that serves white-label branding management.
pub const BRANDING_SERVER: &str = "https://whitelabel.aboutmy.email/api/v1";

pub const ENV_SERVER: &str = "MYEMAIL_SERVER";
pub const ENV_APIKEY: &str = "MYEMAIL_APIKEY";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client holding a reqwest client, the API base URL and an
/// optional API key sent as a bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

/// A message submission. `payload` is the complete raw message.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submit {
    pub from: String,
    pub to: String,
    pub ip: String,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtputf8: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubmitSuccess {
    pub id: String,
}

/// Processing status of a submitted message. Sent both as the body of
/// GET /emails/{id} and as the body of progress callbacks.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatusResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl StatusResult {
    /// The result page, once processing has finished.
    pub fn finished_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn messages(&self) -> &[String] {
        self.messages.as_deref().unwrap_or_default()
    }
}

/// Body returned after branding content has been staged.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

/// Error body the API uses for 400, 404 and 500 responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiMessage {
    pub message: String,
}

/// A file to be staged, already read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl UploadFile {
    /// Read `path`, naming the upload after its base name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(UploadFile { name, contents })
    }
}

/// A non-success answer from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub status: StatusCode,
    pub message: Option<ApiMessage>,
    pub body: String,
}

/// What an API call produced, keyed on the HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    /// HTTP 429; the caller may retry.
    Throttled,
    Failed(Failure),
}

impl<T> Outcome<T> {
    /// Collapse anything but success into `Error::Rejected`.
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Success(t) => Ok(t),
            Outcome::Throttled => Err(Error::Rejected {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: None,
            }),
            Outcome::Failed(f) => Err(Error::Rejected {
                status: f.status,
                message: f.message.map(|m| m.message),
            }),
        }
    }
}

/// Status, body and content-type flag of a response that has been read.
struct RawReply {
    status: StatusCode,
    is_json: bool,
    body: String,
}

impl RawReply {
    fn read(res: Response) -> Result<Self> {
        let status = res.status();
        let is_json = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let body = res.text()?;
        debug!(%status, bytes = body.len(), "received response");
        Ok(RawReply {
            status,
            is_json,
            body,
        })
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_json {
            return Err(Error::UnexpectedResponse(format!(
                "expected JSON body, got: {}",
                self.body
            )));
        }
        serde_json::from_str(&self.body).map_err(|e| Error::UnexpectedResponse(e.to_string()))
    }

    fn into_outcome<T>(self, success: impl FnOnce(&RawReply) -> Result<T>) -> Result<Outcome<T>> {
        match self.status {
            StatusCode::OK => Ok(Outcome::Success(success(&self)?)),
            StatusCode::TOO_MANY_REQUESTS => Ok(Outcome::Throttled),
            status => {
                let message = if self.is_json {
                    serde_json::from_str::<ApiMessage>(&self.body).ok()
                } else {
                    None
                };
                Ok(Outcome::Failed(Failure {
                    status,
                    message,
                    body: self.body,
                }))
            }
        }
    }
}

impl ApiClient {
    /// Create a client for `server`, falling back to [`DEFAULT_SERVER`]
    /// when it is empty. An empty `api_key` sends no Authorization header.
    pub fn new(server: &str, api_key: &str) -> Result<Self> {
        let server = if server.is_empty() {
            DEFAULT_SERVER
        } else {
            server
        };
        let base_url = Url::parse(server).map_err(|source| Error::InvalidServer {
            url: server.to_string(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidServer {
                url: server.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        let client = Client::builder()
            .user_agent(concat!("aboutmyemail/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ApiClient {
            client,
            base_url,
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
        })
    }

    /// Create a client configured from `MYEMAIL_SERVER` and
    /// `MYEMAIL_APIKEY`, either of which may be unset.
    pub fn from_env() -> Result<Self> {
        let server = std::env::var(ENV_SERVER).unwrap_or_default();
        let api_key = std::env::var(ENV_APIKEY).unwrap_or_default();
        Self::new(&server, &api_key)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let val = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| Error::InvalidApiKey)?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    /// POST /emails. A successful submission returns the id to follow.
    pub fn submit_email(&self, req: &Submit) -> Result<Outcome<SubmitSuccess>> {
        let url = self.endpoint(&["emails"]);
        debug!(%url, from = %req.from, to = %req.to, "submitting email");
        let res = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(SUBMIT_TIMEOUT)
            .json(req)
            .send()?;
        RawReply::read(res)?.into_outcome(RawReply::json)
    }

    /// GET /emails/{id}.
    pub fn email_status(&self, id: &str) -> Result<Outcome<StatusResult>> {
        let url = self.endpoint(&["emails", id]);
        debug!(%url, "fetching status");
        let res = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(STATUS_TIMEOUT)
            .send()?;
        RawReply::read(res)?.into_outcome(RawReply::json)
    }

    /// POST /style/content as multipart/form-data, one `filename` part per
    /// file.
    pub fn upload_content(&self, files: &[UploadFile]) -> Result<Outcome<UploadResult>> {
        let url = self.endpoint(&["style", "content"]);
        let mut form = multipart::Form::new();
        for file in files {
            let part = multipart::Part::bytes(file.contents.clone())
                .file_name(file.name.clone())
                .mime_str("application/octet-stream")?;
            form = form.part("filename", part);
        }
        debug!(%url, files = files.len(), "uploading branding content");
        let res = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()?;
        RawReply::read(res)?.into_outcome(|reply| {
            // Any 200 means the files were accepted; only a JSON body is decoded.
            if !reply.is_json || reply.body.trim().is_empty() {
                Ok(UploadResult::default())
            } else {
                reply.json()
            }
        })
    }

    /// POST /style/publish, promoting staged branding to production.
    pub fn publish_style(&self) -> Result<Outcome<()>> {
        let url = self.endpoint(&["style", "publish"]);
        debug!(%url, "publishing branding");
        let res = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(PUBLISH_TIMEOUT)
            .send()?;
        RawReply::read(res)?.into_outcome(|_| Ok(()))
    }
}
