//! Application State

use std::sync::Arc;
use std::time::Duration;

use fund_backtest::PriceProvider;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Price-series source (fetch script, HTTP service, or mock)
    pub provider: Arc<dyn PriceProvider>,

    /// Bound on one request's fetch or simulation
    pub request_timeout: Duration,
}
