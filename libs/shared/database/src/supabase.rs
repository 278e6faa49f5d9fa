use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Non-success answer from PostgREST, kept typed so callers can tell a
/// unique-constraint violation (409) from other failures via `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {body}")]
pub struct SupabaseApiError {
    pub status: StatusCode,
    pub body: String,
}

impl SupabaseApiError {
    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Service calls fall back to the anon key as bearer, like the dashboard does.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", bearer)) {
            headers.insert(AUTHORIZATION, value);
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(anyhow!(SupabaseApiError { status, body: error_text }));
        }

        // PostgREST answers 204 for return=minimal writes
        let text = response.text().await?;
        let data = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)?
        } else {
            serde_json::from_str::<T>(&text)?
        };
        Ok(data)
    }

    /// Write returning the affected rows (`Prefer: return=representation`).
    /// An empty vector means the filter matched nothing.
    pub async fn write_returning<T>(&self, method: Method, path: &str,
                                    auth_token: Option<&str>, body: Value)
                                    -> Result<Vec<T>>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(method, path, auth_token, Some(body), Some(headers)).await
    }

    /// Calls a Postgres function exposed under `/rest/v1/rpc/{function}`.
    pub async fn rpc<T>(&self, function: &str, auth_token: Option<&str>, args: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(args)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[tokio::test]
    async fn test_write_returning_sends_prefer_header() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/things"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&server)
            .await;

        let rows: Vec<Value> = client_for(&server)
            .write_returning(Method::PATCH, "/rest/v1/things?id=eq.1", None, json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_status_is_downcastable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/things"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Value>(Method::POST, "/rest/v1/things", None, Some(json!({})))
            .await
            .unwrap_err();
        let api_error = err.downcast_ref::<SupabaseApiError>().unwrap();
        assert!(api_error.is_conflict());
    }

    #[tokio::test]
    async fn test_empty_body_deserializes_to_unit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/noop"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result: Option<Value> = client_for(&server)
            .rpc("noop", None, json!({}))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
