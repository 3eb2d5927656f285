use crate::credentials::{FileTokenStore, TokenStore};
use crate::error::ClientError;
use crate::response::{Envelope, ErrorBody};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;
use util::config::AppConfig;

/// Handle to the issuer/verifier API.
///
/// Cheap to clone: the HTTP pool and token store are shared.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Creates a client rooted at `base_url` (e.g. `http://localhost:5000/api`).
    pub fn new(
        base_url: &str,
        http: Client,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::Url(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Url(format!("{base_url}: not a base URL")));
        }
        Ok(Self { http, base, tokens })
    }

    /// Builds a client from the global configuration with a file-backed token.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let http = util::http::build_client(config.request_timeout_secs)?;
        let tokens = Arc::new(FileTokenStore::new(&config.token_file));
        Self::new(&config.api_url, http, tokens)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Appends path segments to the base, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        let builder = self.http.request(method, url);
        Ok(match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    pub(crate) async fn get<T>(&self, segments: &[&str]) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Envelope,
    {
        self.send(self.request(Method::GET, segments)?).await
    }

    pub(crate) async fn delete<T>(&self, segments: &[&str]) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Envelope,
    {
        self.send(self.request(Method::DELETE, segments)?).await
    }

    pub(crate) async fn with_body<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Envelope,
        B: Serialize + ?Sized,
    {
        self.send(self.request(method, segments)?.json(body)).await
    }

    /// Sends the request and unwraps the envelope.
    ///
    /// Non-2xx statuses become [`ClientError::Status`] carrying the issuer's
    /// message when the body has one; a 2xx body without `success: true`
    /// becomes [`ClientError::Rejected`].
    async fn send<T>(&self, builder: RequestBuilder) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Envelope,
    {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
            tracing::debug!(status = status.as_u16(), %message, "issuer returned error status");
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: T = serde_json::from_slice(&body)?;
        if !parsed.succeeded() {
            let message = parsed
                .message()
                .unwrap_or("request was not successful")
                .to_owned();
            return Err(ClientError::Rejected(message));
        }
        Ok(parsed)
    }
}
