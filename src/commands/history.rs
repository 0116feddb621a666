use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serenity::all::{CreateAttachment, CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::model::channel::Message;
use serenity::prelude::Context;
use tokio::sync::Mutex;

use crate::api::history::HistoryClient;
use crate::models::history::{HistoryInputs, HistoryQuery, HistorySummary};
use crate::services::page_service::HistoryPage;
use crate::utils::errors::{ChartError, HistoryError};
use crate::utils::extract_clean_error;

/// A redrawn chart ready to post
struct RefreshedChart {
    query: HistoryQuery,
    label: String,
    png: Vec<u8>,
    summary: Option<HistorySummary>,
}

/// Refresh the channel's chart: `<command> <symbol> <start_date> [end_date]`
pub async fn execute(
    ctx: &Context,
    msg: &Message,
    page: Arc<Mutex<HistoryPage>>,
    args: &[&str],
) -> Result<(), String> {
    tracing::info!("📈 Refresh requested in channel {} with args: {:?}", msg.channel_id, args);

    let refreshed = match refresh(ctx, msg, &page, args).await {
        Ok(Some(refreshed)) => refreshed,
        Ok(None) => return Ok(()),
        Err(e) => {
            tracing::error!(kind = e.kind(), "Error fetching historical data: {}", e);
            return Err(e.alert_message());
        }
    };

    let filename = attachment_name(&refreshed.query);
    let attachment = CreateAttachment::bytes(refreshed.png, filename.clone());

    let mut embed = CreateEmbed::default()
        .title(format!("📈 {}", refreshed.label))
        .image(format!("attachment://{}", filename))
        .footer(CreateEmbedFooter::new(format!(
            "{} → {}",
            refreshed.query.start_date, refreshed.query.end_date
        )))
        .color(0x4bc0c0);

    if let Some(summary) = &refreshed.summary {
        embed = embed
            .field("Points", summary.points.to_string(), true)
            .field(
                "Range",
                format!("{} → {}", summary.first_date, summary.last_date),
                true,
            )
            .field("Last Close", format_number(summary.last_close, ""), true)
            .field("Change", format_number(summary.change_pct, "%"), true)
            .field("Avg Daily Return", format_number(summary.avg_daily_return_pct, "%"), true);
    }

    let message = CreateMessage::default().embed(embed).add_file(attachment);
    msg.channel_id
        .send_message(ctx, message)
        .await
        .map_err(|e| format!("Failed to send chart: {}", extract_clean_error(&e.to_string())))?;

    tracing::info!("✓ Chart for {} posted to channel {}", refreshed.query.symbol, msg.channel_id);
    Ok(())
}

/// Look up the backend client and run the refresh for this channel's page
async fn refresh(
    ctx: &Context,
    msg: &Message,
    page: &Arc<Mutex<HistoryPage>>,
    args: &[&str],
) -> Result<Option<RefreshedChart>, HistoryError> {
    let client = {
        let data = ctx.data.read().await;
        data.get::<crate::HistoryApi>()
            .cloned()
            .ok_or_else(|| HistoryError::Request("History client not initialized".to_string()))?
    };

    if let Err(e) = msg.channel_id.broadcast_typing(ctx.http.as_ref()).await {
        tracing::warn!("Failed to broadcast typing: {}", e);
    }

    refresh_page(
        &client,
        page,
        HistoryInputs::from_args(args),
        Utc::now().date_naive(),
    )
    .await
}

/// Validate, fetch and update the chart.
///
/// `Ok(None)` means a newer refresh started while this one was in flight;
/// its outcome, success or failure, is dropped.
async fn refresh_page(
    client: &HistoryClient,
    page: &Arc<Mutex<HistoryPage>>,
    inputs: HistoryInputs,
    today: NaiveDate,
) -> Result<Option<RefreshedChart>, HistoryError> {
    let query = inputs.into_query(today)?;

    let token = {
        let mut page = page.lock().await;
        let token = page.begin_request();
        tracing::debug!(
            "Request {} on channel {} for {} ({} → {})",
            token,
            page.channel_id,
            query.symbol,
            query.start_date,
            query.end_date
        );
        token
    };

    let fetched = client.fetch_historical_data(&query).await;

    let mut page = page.lock().await;
    if !page.is_current(token) {
        match &fetched {
            Ok(_) => tracing::info!(
                "Dropping stale response for {} (request {} superseded)",
                query.symbol,
                token
            ),
            Err(e) => tracing::info!(
                "Dropping stale failure for {} (request {} superseded): {}",
                query.symbol,
                token,
                e
            ),
        }
        return Ok(None);
    }
    let records = fetched?;

    page.chart.update_chart(&records, &query.symbol)?;
    let png = page
        .chart
        .canvas()
        .frame()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ChartError::Render("canvas produced no frame".to_string()))?;

    Ok(Some(RefreshedChart {
        label: page.chart.state().label.clone(),
        summary: HistorySummary::from_records(&records),
        query,
        png,
    }))
}

/// Discord only resolves `attachment://` names made of plain characters
fn attachment_name(query: &HistoryQuery) -> String {
    let raw = format!("{}_{}_{}", query.symbol, query.start_date, query.end_date);
    let safe: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}.png", safe)
}

fn format_number(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::AppConfig;
    use crate::models::chart::ChartState;
    use crate::services::page_service::PageRegistry;

    fn history_page() -> Arc<Mutex<HistoryPage>> {
        let config = Arc::new(AppConfig {
            discord_token: "token".to_string(),
            api_base_url: "http://localhost:5000".to_string(),
            history_channels: Some(HashSet::from([42])),
            refresh_command: Some("$history".to_string()),
            chart_width: 640,
            chart_height: 480,
        });
        PageRegistry::new(config).page_for(42).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    async fn assert_chart_untouched(page: &Arc<Mutex<HistoryPage>>) {
        let page = page.lock().await;
        assert_eq!(page.chart.state(), &ChartState::default());
        assert!(page.chart.canvas().frame().is_none());
    }

    /// Wait until the backend has seen the request, so its token is issued
    async fn wait_for_request(server: &MockServer) {
        while server
            .received_requests()
            .await
            .map_or(true, |requests| requests.is_empty())
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_backend_error_leaves_chart_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/historical-data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"error": "invalid symbol"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HistoryClient::new(server.uri());
        let page = history_page();
        let err = refresh_page(
            &client,
            &page,
            HistoryInputs::from_args(&["ZZZZ", "2024-01-01", "2024-02-01"]),
            today(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, HistoryError::Application(ref m) if m == "invalid symbol"));
        assert_eq!(err.alert_message(), "Failed to fetch data: invalid symbol");
        assert_chart_untouched(&page).await;
    }

    #[tokio::test]
    async fn test_empty_result_leaves_chart_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let page = history_page();
        let err = refresh_page(
            &HistoryClient::new(server.uri()),
            &page,
            HistoryInputs::from_args(&["AAPL", "1990-01-01", "1990-01-02"]),
            today(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, HistoryError::EmptyResult));
        assert_chart_untouched(&page).await;
    }

    #[tokio::test]
    async fn test_missing_symbol_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(0)
            .mount(&server)
            .await;

        let page = history_page();
        let err = refresh_page(
            &HistoryClient::new(server.uri()),
            &page,
            HistoryInputs::from_args(&[]),
            today(),
        )
        .await
        .err()
        .unwrap();

        assert_eq!(err.alert_message(), "Please enter a stock symbol");
        assert_chart_untouched(&page).await;
    }

    async fn superseded_refresh(body: &str) -> (Result<bool, HistoryError>, Arc<Mutex<HistoryPage>>) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/historical-data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(HistoryClient::new(server.uri()));
        let page = history_page();
        let in_flight = {
            let client = Arc::clone(&client);
            let page = Arc::clone(&page);
            tokio::spawn(async move {
                refresh_page(
                    &client,
                    &page,
                    HistoryInputs::from_args(&["AAPL", "2024-01-01", "2024-02-01"]),
                    today(),
                )
                .await
                .map(|refreshed| refreshed.is_some())
            })
        };

        wait_for_request(&server).await;
        page.lock().await.begin_request();

        let outcome = in_flight.await.unwrap();
        (outcome, page)
    }

    #[tokio::test]
    async fn test_superseded_response_is_dropped() {
        let (outcome, page) = superseded_refresh(
            r#"[{"Date": "2024-01-02", "Close": 185.64}, {"Date": "2024-01-03", "Close": 184.25}]"#,
        )
        .await;

        assert!(matches!(outcome, Ok(false)));
        assert_chart_untouched(&page).await;
    }

    #[tokio::test]
    async fn test_superseded_failure_is_not_reported() {
        let (outcome, page) = superseded_refresh(r#"{"error": "invalid symbol"}"#).await;

        assert!(matches!(outcome, Ok(false)));
        assert_chart_untouched(&page).await;
    }

    #[test]
    fn test_attachment_name_is_sanitized() {
        let query = HistoryQuery {
            symbol: "BRK/B".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-02-01".to_string(),
        };
        assert_eq!(attachment_name(&query), "BRK_B_2024-01-01_2024-02-01.png");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(Some(12.5), "%"), "12.50%");
        assert_eq!(format_number(None, ""), "n/a");
    }
}
