use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single request/response operations against a key-value store.
///
/// Transport problems are returned as `Err`; a store that answers but refuses
/// the request yields `Ok(false)` or `Ok(None)`.
#[allow(async_fn_in_trait)]
pub trait KvStore {
    async fn health(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn get_json(&self, key: &str) -> Result<Option<Value>>;

    async fn set_json(&self, key: &str, value: &Value, ttl_seconds: Option<u64>)
        -> Result<bool>;
}

/// HTTP client for a Volt server.
#[derive(Clone, Debug)]
pub struct VoltClient {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct SetBody<'a, T: Serialize + ?Sized> {
    value: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct ValueBody<T> {
    value: T,
}

impl VoltClient {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("{} cannot be used as a base URL", base_url));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be used as a base URL", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            return Ok(None);
        }
        let body: ValueBody<T> = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed response body from {}", url))?;
        Ok(Some(body.value))
    }

    async fn store<T: Serialize + ?Sized>(
        &self,
        url: Url,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        let body = SetBody { value, ttl_seconds };
        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        response.bytes().await?;
        Ok(status == StatusCode::OK)
    }
}

impl KvStore for VoltClient {
    async fn health(&self) -> bool {
        let Ok(url) = self.url(&["health"]) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.fetch(self.url(&["kv", key])?).await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<bool> {
        self.store(self.url(&["kv", key])?, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let response = self.client.delete(self.url(&["kv", key])?).send().await?;
        let status = response.status();
        response.bytes().await?;
        Ok(status == StatusCode::OK)
    }

    async fn get_json(&self, key: &str) -> Result<Option<Value>> {
        self.fetch(self.url(&["json", key])?).await
    }

    async fn set_json(
        &self,
        key: &str,
        value: &Value,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        self.store(self.url(&["json", key])?, value, ttl_seconds)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> VoltClient {
        VoltClient::new(Url::parse(base).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn builds_key_urls_under_base_path() {
        let c = client("http://localhost:3000");
        assert_eq!(
            c.url(&["kv", "benchmark:string:10:0"]).unwrap().as_str(),
            "http://localhost:3000/kv/benchmark:string:10:0"
        );

        let nested = client("http://localhost:3000/volt/");
        assert_eq!(
            nested.url(&["json", "a"]).unwrap().as_str(),
            "http://localhost:3000/volt/json/a"
        );
    }

    #[test]
    fn escapes_path_separators_in_keys() {
        let c = client("http://localhost:3000");
        assert_eq!(
            c.url(&["kv", "a/b"]).unwrap().as_str(),
            "http://localhost:3000/kv/a%2Fb"
        );
    }

    #[test]
    fn set_body_omits_absent_ttl() {
        let body = SetBody {
            value: "x",
            ttl_seconds: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"value":"x"}"#);

        let body = SetBody {
            value: "x",
            ttl_seconds: Some(60),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"value":"x","ttl_seconds":60}"#
        );
    }

    #[tokio::test]
    async fn unreachable_target_is_unhealthy() {
        let c = client("http://127.0.0.1:9");
        assert!(!c.health().await);
    }
}
