use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use crate::config::StatusDbConfig;
use crate::error::FlowcellError;
use crate::reconcile::{Document, DocumentStore, ID_FIELD, REV_FIELD, StoredDocument};

#[derive(Debug, Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
}

/// CouchDB-compatible document store: documents are looked up through a
/// `name` view and written with revision checks.
#[derive(Clone)]
pub struct StatusDbClient {
    client: Client,
    database_url: String,
    view_url: String,
    username: String,
    password: String,
}

impl StatusDbClient {
    pub fn new(config: &StatusDbConfig) -> Result<Self, FlowcellError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("fc-upload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;

        let database_url = format!(
            "{}://{}:{}/{}",
            config.scheme, config.url, config.port, config.database
        );
        let view_url = view_url(&database_url, &config.view)?;
        Ok(Self {
            client,
            database_url,
            view_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    fn handle_status(response: Response) -> Result<Response, FlowcellError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "status database request failed".to_string());
        Err(FlowcellError::StoreStatus { status, message })
    }

    /// Only used for reads; writes are sent once.
    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, FlowcellError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(FlowcellError::StoreHttp(err.to_string()));
                }
            }
        }
    }
}

impl DocumentStore for StatusDbClient {
    fn find_by_name(&self, name: &str) -> Result<Vec<StoredDocument>, FlowcellError> {
        let key = serde_json::to_string(name)
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;
        let response = self.send_with_retries(|| {
            self.authorized(self.client.get(&self.view_url))
                .query(&[("key", key.as_str())])
        })?;
        let response = Self::handle_status(response)?;
        let view: ViewResponse = response
            .json()
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;

        view.rows
            .into_iter()
            .map(|row| match row.value {
                Value::Object(raw) => StoredDocument::from_raw(raw),
                _ => Err(FlowcellError::format(
                    "status database view",
                    "row value is not a document",
                )),
            })
            .collect()
    }

    fn create(&self, document: &Document) -> Result<String, FlowcellError> {
        let response = self
            .authorized(self.client.post(&self.database_url))
            .json(document)
            .send()
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let written: WriteResponse = response
            .json()
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;
        tracing::info!(id = %written.id, "created document");
        Ok(written.id)
    }

    fn replace(&self, id: &str, rev: &str, document: &Document) -> Result<(), FlowcellError> {
        let mut body = document.clone();
        body.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        body.insert(REV_FIELD.to_string(), Value::String(rev.to_string()));

        let url = format!("{}/{}", self.database_url, encode_id(id));
        let response = self
            .authorized(self.client.put(&url))
            .json(&body)
            .send()
            .map_err(|err| FlowcellError::StoreHttp(err.to_string()))?;
        if response.status() == StatusCode::CONFLICT {
            return Err(FlowcellError::RevisionConflict {
                id: id.to_string(),
                rev: rev.to_string(),
            });
        }
        Self::handle_status(response)?;
        tracing::info!(id, "replaced document");
        Ok(())
    }
}

/// `design/view` becomes `<db>/_design/design/_view/view`.
fn view_url(database_url: &str, view: &str) -> Result<String, FlowcellError> {
    let (design, name) = view
        .split_once('/')
        .filter(|(design, name)| !design.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            FlowcellError::ConfigParse(format!("view must look like <design>/<view>: {view}"))
        })?;
    Ok(format!("{database_url}/_design/{design}/_view/{name}"))
}

fn encode_id(id: &str) -> String {
    id.bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
