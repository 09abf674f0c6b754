use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failure surfaced by the PostgREST data API. The status code is kept
/// because some of them are domain-meaningful to callers (404, 409).
#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SupabaseError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SupabaseError::Api { status, .. } => Some(*status),
            SupabaseError::Transport(_) => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    /// Body of the failed response, useful for inspecting which database
    /// constraint rejected a write.
    pub fn message(&self) -> &str {
        match self {
            SupabaseError::Api { message, .. } => message,
            SupabaseError::Transport(_) => "",
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.service_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.service_key)) {
            headers.insert(AUTHORIZATION, bearer);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(prefer_value) = prefer {
            headers.insert("Prefer", HeaderValue::from_static(prefer_value));
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>)
                            -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_prefer(method, path, body, None).await
    }

    /// Same as `request`, with a `Prefer` header for writes that need the
    /// stored representation back (`return=representation`).
    pub async fn request_with_prefer<T>(&self, method: Method, path: &str,
                                        body: Option<Value>, prefer: Option<&'static str>)
                                        -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(prefer);

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(SupabaseError::Api {
                status,
                message: error_text,
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Fire a request and discard the response body. PostgREST answers
    /// DELETE and representation-less writes with 204 and an empty body,
    /// which must not go through the JSON decoder.
    pub async fn execute(&self, method: Method, path: &str, body: Option<Value>)
                         -> Result<(), SupabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(None);

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(SupabaseError::Api {
                status,
                message: error_text,
            });
        }

        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
