use reqwest::Client as HttpClient;
use reqwest::Url;
use tracing::{debug, warn};

use crate::models::history::{HistoryQuery, HistoryResponse, PriceRecord};
use crate::utils::errors::HistoryError;

/// Longest body prefix echoed into debug logs
const BODY_LOG_LIMIT: usize = 512;

/// Client for the historical price backend
pub struct HistoryClient {
    http_client: HttpClient,
    base_url: String,
}

impl HistoryClient {
    pub const ENDPOINT: &'static str = "/api/historical-data";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Full request URL with the query parameters encoded
    pub fn request_url(&self, query: &HistoryQuery) -> Result<Url, HistoryError> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, Self::ENDPOINT),
            &[
                ("symbol", query.symbol.as_str()),
                ("start_date", query.start_date.as_str()),
                ("end_date", query.end_date.as_str()),
            ],
        )
        .map_err(|e| HistoryError::Request(format!("Invalid backend URL: {}", e)))
    }

    /// GET /api/historical-data
    ///
    /// The body is read as text first so it can be logged, then parsed.
    ///
    /// # Returns
    /// * `Ok(Vec<PriceRecord>)` - At least one record
    /// * `Err(HistoryError)` - Transport, application, empty-result or parse failure
    pub async fn fetch_historical_data(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceRecord>, HistoryError> {
        let url = self.request_url(query)?;
        debug!("Fetching data from URL: {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| HistoryError::Request(e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| HistoryError::Request(format!("Failed to read response body: {}", e)))?;
        debug!("Response body: {}", truncate(&body, BODY_LOG_LIMIT));

        if !status.is_success() {
            // The backend reports its own failures as {"error": ...} with a 4xx/5xx
            if let Ok(HistoryResponse::Failure { error }) = serde_json::from_str(&body) {
                return Err(HistoryError::Application(error));
            }
            warn!("Backend returned {} without an error payload", status);
            return Err(HistoryError::Transport(status.as_u16()));
        }

        let records = parse_history_body(&body)?;
        debug!(
            "Received {} records, first entries: {:?}",
            records.len(),
            &records[..records.len().min(5)]
        );
        Ok(records)
    }
}

/// Discriminate a response body into records or a failure
pub fn parse_history_body(body: &str) -> Result<Vec<PriceRecord>, HistoryError> {
    let response: HistoryResponse =
        serde_json::from_str(body).map_err(|e| HistoryError::Parse(e.to_string()))?;

    match response {
        HistoryResponse::Failure { error } => Err(HistoryError::Application(error)),
        HistoryResponse::Records(records) if records.is_empty() => Err(HistoryError::EmptyResult),
        HistoryResponse::Records(records) => Ok(records),
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(symbol: &str, start: &str, end: &str) -> HistoryQuery {
        HistoryQuery {
            symbol: symbol.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    #[test]
    fn test_request_url_encodes_parameters() {
        let client = HistoryClient::new("http://localhost:5000/");
        let url = client
            .request_url(&query("BRK&B", "2024-01-01", "2024-02-01"))
            .unwrap();

        assert_eq!(url.path(), "/api/historical-data");
        assert!(url.as_str().contains("symbol=BRK%26B"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("symbol".to_string(), "BRK&B".to_string()),
                ("start_date".to_string(), "2024-01-01".to_string()),
                ("end_date".to_string(), "2024-02-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_url_carries_defaulted_end_date() {
        use crate::models::history::HistoryInputs;

        let today = chrono::Utc::now().date_naive();
        let query = HistoryInputs::from_args(&["AAPL", "2024-01-01"])
            .into_query(today)
            .unwrap();
        let url = HistoryClient::new("http://localhost:5000")
            .request_url(&query)
            .unwrap();

        assert!(url
            .as_str()
            .contains(&format!("end_date={}", today.format("%Y-%m-%d"))));
    }

    #[test]
    fn test_parse_error_payload() {
        let err = parse_history_body(r#"{"error": "invalid symbol"}"#).unwrap_err();
        assert!(matches!(err, HistoryError::Application(_)));
        assert_eq!(err.alert_message(), "Failed to fetch data: invalid symbol");
    }

    #[test]
    fn test_parse_empty_array() {
        let err = parse_history_body("[]").unwrap_err();
        assert!(matches!(err, HistoryError::EmptyResult));
        assert!(err
            .alert_message()
            .contains("No data available for the specified date range"));
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert!(matches!(parse_history_body("not json"), Err(HistoryError::Parse(_))));
        assert!(matches!(parse_history_body(r#"{"rows": []}"#), Err(HistoryError::Parse(_))));
        assert!(matches!(
            parse_history_body(r#"[{"Date": "01/02/2024", "Close": 1.0}]"#),
            Err(HistoryError::Parse(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/historical-data"))
            .and(query_param("symbol", "AAPL"))
            .and(query_param("start_date", "2024-01-01"))
            .and(query_param("end_date", "2024-01-31"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"Date": "2024-01-02", "Close": 185.64, "Daily_Return": null},
                    {"Date": "2024-01-03", "Close": 184.25, "Daily_Return": -0.0075}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = HistoryClient::new(server.uri());
        let records = client
            .fetch_historical_data(&query("AAPL", "2024-01-01", "2024-01-31"))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].close, Some(184.25));
    }

    #[tokio::test]
    async fn test_fetch_surfaces_backend_error_on_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/historical-data"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error": "No symbol provided"}"#),
            )
            .mount(&server)
            .await;

        let err = HistoryClient::new(server.uri())
            .fetch_historical_data(&query("X", "2024-01-01", "2024-01-31"))
            .await
            .unwrap_err();

        assert_eq!(err.alert_message(), "Failed to fetch data: No symbol provided");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = HistoryClient::new(server.uri())
            .fetch_historical_data(&query("AAPL", "2024-01-01", "2024-01-31"))
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::Transport(503)));
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_fetch_error_payload_with_ok_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"error": "invalid symbol"}"#),
            )
            .mount(&server)
            .await;

        let err = HistoryClient::new(server.uri())
            .fetch_historical_data(&query("ZZZZ", "2024-01-01", "2024-01-31"))
            .await
            .unwrap_err();

        assert_eq!(err.alert_message(), "Failed to fetch data: invalid symbol");
    }
}
