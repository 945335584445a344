use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_SHUTDOWN_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_PAGE_PAUSE: Duration = Duration::from_millis(10);
pub const DEFAULT_TICK_PAGE_PAUSE: Duration = Duration::from_millis(100);
pub const DEFAULT_COLD_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Tuning for batch commits and reload throttling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainConfig {
    /// Maximum number of updates sent in one bulk write
    pub page_size: usize,
    /// How many times a shutdown page is retried after its first attempt
    pub shutdown_retries: u32,
    /// Delay between attempts at the same shutdown page
    pub retry_delay: Duration,
    /// Pause between pages of the shutdown drain
    pub shutdown_page_pause: Duration,
    /// Pause between pages of the tick drain
    pub tick_page_pause: Duration,
    /// Minimum age of loaded state before a throttled reload re-fetches it
    pub cold_window: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        DrainConfig {
            page_size: DEFAULT_PAGE_SIZE,
            shutdown_retries: DEFAULT_SHUTDOWN_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            shutdown_page_pause: DEFAULT_SHUTDOWN_PAGE_PAUSE,
            tick_page_pause: DEFAULT_TICK_PAGE_PAUSE,
            cold_window: DEFAULT_COLD_WINDOW,
        }
    }
}

impl DrainConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        // A zero page size would never make progress
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_shutdown_retries(mut self, retries: u32) -> Self {
        self.shutdown_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_shutdown_page_pause(mut self, pause: Duration) -> Self {
        self.shutdown_page_pause = pause;
        self
    }

    pub fn with_tick_page_pause(mut self, pause: Duration) -> Self {
        self.tick_page_pause = pause;
        self
    }

    pub fn with_cold_window(mut self, cold_window: Duration) -> Self {
        self.cold_window = cold_window;
        self
    }

    /// No pauses or backoff at all; useful in tests
    pub fn without_delays(self) -> Self {
        self.with_retry_delay(Duration::ZERO)
            .with_shutdown_page_pause(Duration::ZERO)
            .with_tick_page_pause(Duration::ZERO)
    }
}
