use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::commands::HELP_COMMAND;
use crate::config::AppConfig;
use crate::services::chart_service::{ChartController, PngCanvas};

/// Monotonic request counter; only the newest request may touch the chart
#[derive(Debug, Default)]
pub struct RequestTokens {
    latest: u64,
}

impl RequestTokens {
    /// Start a new request, superseding every earlier one
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, token: u64) -> bool {
        token == self.latest
    }
}

/// One historical-data view: its chart and the command that refreshes it
pub struct HistoryPage {
    pub channel_id: u64,
    pub chart: ChartController<PngCanvas>,
    refresh_command: Option<String>,
    tokens: RequestTokens,
}

impl HistoryPage {
    /// Whether `command` is this page's bound refresh command
    pub fn accepts(&self, command: &str) -> bool {
        self.refresh_command.as_deref() == Some(command)
    }

    pub fn begin_request(&mut self) -> u64 {
        self.tokens.issue()
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.tokens.is_current(token)
    }
}

/// Lazily initialized history pages keyed by channel id
pub struct PageRegistry {
    config: Arc<AppConfig>,
    pages: HashMap<u64, Arc<Mutex<HistoryPage>>>,
}

impl PageRegistry {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            pages: HashMap::new(),
        }
    }

    pub fn is_history_view(&self, channel_id: u64) -> bool {
        match &self.config.history_channels {
            Some(channels) => channels.contains(&channel_id),
            None => true,
        }
    }

    /// Whether `command` needs a history page at all; anything else is chatter
    pub fn handles(&self, command: &str) -> bool {
        command == HELP_COMMAND || self.config.refresh_command.as_deref() == Some(command)
    }

    /// The channel's page, initializing it on first sight.
    /// Returns `None` for channels that are not history views.
    pub fn page_for(&mut self, channel_id: u64) -> Option<Arc<Mutex<HistoryPage>>> {
        if !self.is_history_view(channel_id) {
            debug!("Channel {} is not a historical data view", channel_id);
            return None;
        }

        let config = &self.config;
        let page = self
            .pages
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(initialize_page(config, channel_id))));
        Some(Arc::clone(page))
    }
}

/// Bind the refresh command (if any) and build the chart
fn initialize_page(config: &AppConfig, channel_id: u64) -> HistoryPage {
    info!("Initializing historical data page for channel {}", channel_id);

    match &config.refresh_command {
        Some(command) => info!("Refresh command {} bound for channel {}", command, channel_id),
        None => error!(
            "Refresh command not configured; channel {} chart is read-only",
            channel_id
        ),
    }

    HistoryPage {
        channel_id,
        chart: ChartController::create_chart(PngCanvas::new(config.chart_width, config.chart_height)),
        refresh_command: config.refresh_command.clone(),
        tokens: RequestTokens::default(),
    }
}
