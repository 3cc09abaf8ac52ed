//! CKAN Action API (v3) client.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::catalog::{
    CatalogApi, CatalogError, Dataset, DatasetPayload, NewOrganization, Organization, Resource,
    ResourcePayload,
};
use crate::sanitize::redact_url;

/// Maximum length of a response body quoted in an error.
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

pub struct CkanClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl CkanClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Transient(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.base_url, action)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", key.expose_secret()),
            None => request,
        }
    }

    fn post<T: DeserializeOwned>(&self, action: &str, body: &Value) -> Result<T, CatalogError> {
        debug!(action, url = %redact_url(&self.base_url), "CKAN request");
        let request = self.authorized(self.http.post(self.action_url(action)).json(body));
        decode(action, send(request)?)
    }

    /// `Ok(None)` when the entity does not exist.
    fn show<T: DeserializeOwned>(&self, action: &str, id: &str) -> Result<Option<T>, CatalogError> {
        match self.post(action, &json!({ "id": id })) {
            Ok(value) => Ok(Some(value)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn upload<T: DeserializeOwned>(
        &self,
        action: &str,
        mut form: multipart::Form,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<T, CatalogError> {
        form = form
            .text("name", payload.name.clone())
            .text("url_type", "upload");
        for (key, value) in &payload.fields {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }
        form = form
            .file("upload", upload)
            .map_err(|e| CatalogError::Upload {
                path: upload.to_path_buf(),
                message: e.to_string(),
            })?;

        debug!(action, url = %redact_url(&self.base_url), "CKAN upload");
        let request = self.authorized(self.http.post(self.action_url(action)).multipart(form));
        decode(action, send(request)?)
    }
}

fn send(request: RequestBuilder) -> Result<Response, CatalogError> {
    request
        .send()
        .map_err(|e| CatalogError::Transient(format!("Request failed: {}", e)))
}

fn decode<T: DeserializeOwned>(action: &str, response: Response) -> Result<T, CatalogError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| CatalogError::Transient(format!("Failed to read response: {}", e)))?;

    let parsed: Option<ActionResponse> = serde_json::from_str(&body).ok();

    if !status.is_success() {
        let message = parsed
            .as_ref()
            .and_then(|r| r.error.as_ref())
            .map(error_message)
            .unwrap_or_else(|| truncate(&body));
        return Err(classify(status, format!("{}: {}", action, message)));
    }

    let parsed = parsed.ok_or_else(|| {
        CatalogError::Decode(format!("{}: response is not JSON: {}", action, truncate(&body)))
    })?;
    if !parsed.success {
        let message = parsed
            .error
            .as_ref()
            .map(error_message)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(CatalogError::Validation(format!("{}: {}", action, message)));
    }

    serde_json::from_value(parsed.result)
        .map_err(|e| CatalogError::Decode(format!("{}: {}", action, e)))
}

/// HTTP status → error category.
pub fn classify(status: StatusCode, message: String) -> CatalogError {
    match status.as_u16() {
        401 | 403 => CatalogError::Authorization(message),
        404 => CatalogError::NotFound(message),
        408 | 429 => CatalogError::Transient(message),
        400..=499 => CatalogError::Validation(message),
        _ => CatalogError::Transient(message),
    }
}

fn error_message(error: &Value) -> String {
    match error.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => truncate(&error.to_string()),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

impl CatalogApi for CkanClient {
    fn status(&self) -> Result<(), CatalogError> {
        let _: Value = self.post("status_show", &json!({}))?;
        Ok(())
    }

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
        self.show("organization_show", name)
    }

    fn organization_create(&self, org: &NewOrganization) -> Result<Organization, CatalogError> {
        let body = serde_json::to_value(org).map_err(|e| CatalogError::Decode(e.to_string()))?;
        self.post("organization_create", &body)
    }

    fn package_show(&self, name: &str) -> Result<Option<Dataset>, CatalogError> {
        self.show("package_show", name)
    }

    fn package_create(&self, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
        let body =
            serde_json::to_value(payload).map_err(|e| CatalogError::Decode(e.to_string()))?;
        self.post("package_create", &body)
    }

    fn package_update(&self, id: &str, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
        let mut body =
            serde_json::to_value(payload).map_err(|e| CatalogError::Decode(e.to_string()))?;
        body["id"] = Value::String(id.to_string());
        // Patch, so resources and fields we do not manage are left alone
        self.post("package_patch", &body)
    }

    fn resource_find(&self, dataset_id: &str, name: &str) -> Result<Option<Resource>, CatalogError> {
        let dataset: Option<Dataset> = self.show("package_show", dataset_id)?;
        let dataset =
            dataset.ok_or_else(|| CatalogError::NotFound(format!("dataset {}", dataset_id)))?;
        Ok(dataset.resources.into_iter().find(|r| r.name == name))
    }

    fn resource_create(
        &self,
        dataset_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError> {
        let form = multipart::Form::new().text("package_id", dataset_id.to_string());
        self.upload("resource_create", form, payload, upload)
    }

    fn resource_update(
        &self,
        resource_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError> {
        let form = multipart::Form::new().text("id", resource_id.to_string());
        self.upload("resource_patch", form, payload, upload)
    }
}
