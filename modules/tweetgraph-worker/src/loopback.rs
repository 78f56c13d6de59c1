use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the LoopBack ticket API. Shared by the ticket store and the
/// API delivery sink.
#[derive(Clone)]
pub struct LoopbackClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl LoopbackClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .request(Method::GET, path)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        decode(path, resp).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let resp = self
            .request(Method::POST, path)
            .query(query)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;
        decode(path, resp).await
    }

    /// POST and ignore the response body beyond its status.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;
        check_status(path, resp).await?;
        Ok(())
    }

    /// PATCH and ignore the response body beyond its status.
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self
            .request(Method::PATCH, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("PATCH {path} failed"))?;
        check_status(path, resp).await?;
        Ok(())
    }
}

async fn check_status(path: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{path} returned {status}: {body}");
    }
    Ok(resp)
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T> {
    let resp = check_status(path, resp).await?;
    let bytes = resp.bytes().await.with_context(|| format!("reading {path} body"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("decoding {path} response"))
}
