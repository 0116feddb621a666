use thiserror::Error;

/// Everything that can stop a history refresh.
///
/// None of these are retried. The chart keeps whatever it showed before.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Please enter a stock symbol")]
    MissingSymbol,

    #[error("Please enter a start date")]
    MissingStartDate,

    #[error("HTTP error! status: {0}")]
    Transport(u16),

    #[error("Request failed: {0}")]
    Request(String),

    /// The backend answered with `{"error": ...}`
    #[error("{0}")]
    Application(String),

    #[error("No data available for the specified date range")]
    EmptyResult,

    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

impl HistoryError {
    /// Taxonomy class, used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryError::MissingSymbol | HistoryError::MissingStartDate => "input_validation",
            HistoryError::Transport(_) | HistoryError::Request(_) => "transport",
            HistoryError::Application(_) => "application",
            HistoryError::EmptyResult => "empty_result",
            HistoryError::Parse(_) => "parse",
            HistoryError::Chart(_) => "chart",
        }
    }

    /// Text shown to the user in the alert embed
    pub fn alert_message(&self) -> String {
        match self {
            HistoryError::MissingSymbol | HistoryError::MissingStartDate => self.to_string(),
            _ => format!("Failed to fetch data: {}", self),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("No closing prices available to chart")]
    NoPriceData,

    #[error("Failed to render chart: {0}")]
    Render(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Extract clean error message from Discord API error strings
///
/// Strips HTTP noise from messages like
/// "HTTP request failed: 400 Bad Request: Cannot send an empty message"
/// and returns only "Cannot send an empty message".
pub fn extract_clean_error(error_msg: &str) -> String {
    if error_msg.contains("HTTP request failed:") {
        if let Some(last_colon) = error_msg.rfind(": ") {
            return error_msg[last_colon + 2..].trim().to_string();
        }
    }
    error_msg.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_alerts_are_verbatim() {
        assert_eq!(HistoryError::MissingSymbol.alert_message(), "Please enter a stock symbol");
        assert_eq!(HistoryError::MissingStartDate.alert_message(), "Please enter a start date");
    }

    #[test]
    fn test_fetch_alerts_are_prefixed() {
        assert_eq!(
            HistoryError::Application("invalid symbol".to_string()).alert_message(),
            "Failed to fetch data: invalid symbol"
        );
        assert_eq!(
            HistoryError::EmptyResult.alert_message(),
            "Failed to fetch data: No data available for the specified date range"
        );
        assert_eq!(
            HistoryError::Transport(502).alert_message(),
            "Failed to fetch data: HTTP error! status: 502"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(HistoryError::MissingSymbol.kind(), "input_validation");
        assert_eq!(HistoryError::Request("timed out".into()).kind(), "transport");
        assert_eq!(HistoryError::from(ChartError::NoPriceData).kind(), "chart");
    }

    #[test]
    fn test_extract_clean_error() {
        assert_eq!(
            extract_clean_error("HTTP request failed: 400 Bad Request: Cannot send an empty message"),
            "Cannot send an empty message"
        );
        assert_eq!(extract_clean_error("plain failure"), "plain failure");
    }
}
