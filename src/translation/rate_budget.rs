/*!
 * Fixed-window token budget.
 *
 * Tokens and effective time are accumulated per exchange. When a full minute
 * of effective time has passed the window rolls over. When the configured
 * limit is reached inside a window the caller must cool down before the next
 * request.
 */

use std::time::Duration;

/// Length of one accounting window in milliseconds
pub const WINDOW_MS: u64 = 60_000;

/// Default pause once the limit is reached inside a window
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(61);

/// What the caller must do after recording an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAction {
    /// Keep going
    Continue,
    /// A full window elapsed and the counters were reset
    WindowRolledOver,
    /// The limit was hit; sleep for the given duration. Counters are already reset.
    Cooldown(Duration),
}

/// Token accounting over a fixed 60 second window
#[derive(Debug, Clone)]
pub struct RateBudget {
    tokens_in_window: u64,
    elapsed_ms_in_window: u64,
    /// Tokens allowed per window; zero or negative means unlimited
    limit: i64,
    cooldown: Duration,
}

impl RateBudget {
    /// Create a budget allowing `limit` tokens per minute (`<= 0` for unlimited)
    pub fn new(limit: i64) -> Self {
        Self::with_cooldown(limit, DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(limit: i64, cooldown: Duration) -> Self {
        Self {
            tokens_in_window: 0,
            elapsed_ms_in_window: 0,
            limit,
            cooldown,
        }
    }

    /// A budget that never asks for a cooldown
    pub fn unlimited() -> Self {
        Self::new(-1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit <= 0
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn tokens_in_window(&self) -> u64 {
        self.tokens_in_window
    }

    pub fn elapsed_ms_in_window(&self) -> u64 {
        self.elapsed_ms_in_window
    }

    /// Account for one exchange.
    ///
    /// # Arguments
    /// * `tokens` - Total tokens consumed by the exchange
    /// * `effective_ms` - Response latency plus the inter-request delay
    ///
    /// # Returns
    /// * `BudgetAction` - Rollover is checked before the limit
    pub fn record(&mut self, tokens: u64, effective_ms: u64) -> BudgetAction {
        self.tokens_in_window += tokens;
        self.elapsed_ms_in_window += effective_ms;

        if self.elapsed_ms_in_window >= WINDOW_MS {
            self.reset();
            return BudgetAction::WindowRolledOver;
        }

        if self.limit > 0 && self.tokens_in_window >= self.limit as u64 {
            self.reset();
            return BudgetAction::Cooldown(self.cooldown);
        }

        BudgetAction::Continue
    }

    /// Clear both counters
    pub fn reset(&mut self) {
        self.tokens_in_window = 0;
        self.elapsed_ms_in_window = 0;
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
