//! Typed client for the parking transaction feed.
//!
//! Two operations, matching the first and third pipeline tasks: a plain
//! availability probe against the endpoint, and a `$top`-limited fetch of the
//! latest transaction batch.

use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use meterflow_config::ApiConfig;

use crate::error::{EtlError, Result};

/// Query parameter limiting the number of records returned.
const TOP_PARAM: &str = "$top";

/// Client for the transaction feed endpoint.
#[derive(Debug, Clone)]
pub struct MeterApi {
    http: reqwest::Client,
    base_url: Url,
}

impl MeterApi {
    /// Build a client from the `[api]` config section.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| EtlError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, base_url })
    }

    /// The endpoint this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Probe the endpoint. Succeeds on any 2xx response.
    pub async fn is_available(&self) -> Result<()> {
        self.http
            .get(self.base_url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch up to `limit` transaction records.
    ///
    /// Returns the raw JSON objects unchanged; the payload is handed to the
    /// transform stage through the pipeline context, and trimming it here
    /// would move the mapping out of that stage. The body is only validated
    /// to be a JSON array.
    pub async fn fetch_transactions(&self, limit: u32) -> Result<Vec<serde_json::Value>> {
        let response = self
            .http
            .get(self.base_url.clone())
            .query(&[(TOP_PARAM, limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let records: Vec<serde_json::Value> = serde_json::from_str(&body)
            .map_err(|e| EtlError::MalformedResponse(e.to_string()))?;

        debug!(count = records.len(), "fetched transaction batch");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            record_limit: 50,
            timeout_secs: 5,
        }
    }

    fn sample_body() -> serde_json::Value {
        json!([{
            "parkingTransactionKey": 1,
            "startDtm": "2022-08-01T09:15:00",
            "endDtm": "2022-08-01T10:15:00",
            "transactionAmt": "1.50",
            "paymentTypeName": "CASH",
            "transactionStatusCode": "OK",
            "maxHoursCnt": "2",
            "meterTypeDsc": "SINGLE SPACE",
            "dollarPerHourRate": "1.50",
            "activeStatusInd": "Y",
            "metroAreaName": "DOWNTOWN"
        }])
    }

    #[test]
    fn rejects_unparsable_url() {
        let err = MeterApi::new(&test_config("not a url")).unwrap_err();
        assert!(matches!(err, EtlError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn is_available_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        api.is_available().await.unwrap();
    }

    #[tokio::test]
    async fn is_available_fails_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        assert!(api.is_available().await.is_err());
    }

    #[tokio::test]
    async fn fetch_sends_top_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param(TOP_PARAM, "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        let records = api.fetch_transactions(25).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["paymentTypeName"], "CASH");
    }

    #[tokio::test]
    async fn fetch_rejects_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        let err = api.fetch_transactions(50).await.unwrap_err();
        assert!(matches!(err, EtlError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fetch_surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        assert!(matches!(
            api.fetch_transactions(50).await.unwrap_err(),
            EtlError::Http(_)
        ));
    }

    #[tokio::test]
    async fn fetch_accepts_empty_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let api = MeterApi::new(&test_config(&server.uri())).unwrap();
        let records = api.fetch_transactions(50).await.unwrap();
        assert!(records.is_empty());
    }
}
