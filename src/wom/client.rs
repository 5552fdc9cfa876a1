use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::models::{ApiError, GroupDetails, GroupGainsEntry, PlayerGains};
use crate::config::WomSettings;
use crate::error::{BotError, Result};
use crate::policy::{retry, RetryPolicy};

/// Thin client for the Wise Old Man API.
///
/// Every request has a timeout and goes through the retry wrapper.
pub struct WomClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry_policy: RetryPolicy,
    page_size: u32,
}

impl WomClient {
    pub fn new(settings: &WomSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| BotError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            retry_policy: RetryPolicy::with_attempts(settings.retries),
            page_size: settings.page_size,
        })
    }

    /// Roster snapshot with every membership and its role
    pub async fn get_group_details(&self, group_id: u64) -> Result<GroupDetails> {
        self.get_json(&format!("/groups/{}", group_id), &[]).await
    }

    /// One page of group gains
    pub async fn get_group_gains(
        &self,
        group_id: u64,
        metric: &str,
        period: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<GroupGainsEntry>> {
        self.get_json(
            &format!("/groups/{}/gained", group_id),
            &[
                ("metric", metric.to_string()),
                ("period", period.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    /// Every page of group gains, flattened in API order
    pub async fn get_all_group_gains(
        &self,
        group_id: u64,
        metric: &str,
        period: &str,
    ) -> Result<Vec<GroupGainsEntry>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .get_group_gains(group_id, metric, period, self.page_size, offset)
                .await?;
            let fetched = page.len() as u32;
            all.extend(page);
            debug!("Fetched {} gains at offset {}", fetched, offset);

            if fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        info!("Fetched {} gains records for group {}", all.len(), group_id);
        Ok(all)
    }

    pub async fn get_player_gains(&self, username: &str, period: &str) -> Result<PlayerGains> {
        self.get_json(
            &format!("/players/{}/gained", urlencoding::encode(username)),
            &[("period", period.to_string())],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        retry(self.retry_policy, &format!("GET {}", path), || {
            self.send_once(&url, query)
        })
        .await
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut request = self.http_client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(BotError::from);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Map a failed response to the matching error
fn status_error(status: StatusCode, body: &str) -> BotError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => BotError::WomRateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BotError::WomTimeout,
        _ => {
            let message = serde_json::from_str::<ApiError>(body)
                .map(|e| e.message)
                .unwrap_or_else(|_| body.to_string());
            BotError::WomService {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            BotError::WomRateLimited
        ));
        assert!(matches!(
            status_error(StatusCode::GATEWAY_TIMEOUT, ""),
            BotError::WomTimeout
        ));
        match status_error(StatusCode::NOT_FOUND, r#"{"message":"Group not found."}"#) {
            BotError::WomService { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Group not found.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        match status_error(StatusCode::BAD_GATEWAY, "upstream down") {
            BotError::WomService { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_new_trims_base_url() {
        let settings: WomSettings = serde_json::from_str(
            r#"{ "group_id": 1, "base_url": "https://api.example.test/v2/", "retries": 2 }"#,
        )
        .unwrap();
        let client = WomClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "https://api.example.test/v2");
        assert_eq!(client.retry_policy.attempts, 2);
    }
}
