//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::width::WidthPolicy;

/// Default number of history rows kept above the primary screen.
pub const DEFAULT_SCROLLBACK_CAPACITY: usize = 1000;

/// Default time budget for an OSC/DCS/PM/APC/SOS string.
pub const DEFAULT_STRING_TIMEOUT: Duration = Duration::from_secs(20);

/// Default byte limit for an OSC/DCS/PM/APC/SOS string.
pub const DEFAULT_MAX_STRING_LEN: usize = 100_000;

/// Tunables for [`crate::terminal::Terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// History rows retained; `0` disables scrollback.
    pub scrollback_capacity: usize,
    /// A string sequence older than this is abandoned.
    pub string_timeout: Duration,
    /// A string sequence longer than this is abandoned.
    pub max_string_len: usize,
    pub width_policy: WidthPolicy,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_capacity: DEFAULT_SCROLLBACK_CAPACITY,
            string_timeout: DEFAULT_STRING_TIMEOUT,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            width_policy: WidthPolicy::Standard,
        }
    }
}

impl TerminalConfig {
    #[must_use]
    pub fn with_scrollback_capacity(mut self, capacity: usize) -> Self {
        self.scrollback_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_string_timeout(mut self, timeout: Duration) -> Self {
        self.string_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }

    #[must_use]
    pub fn with_width_policy(mut self, policy: WidthPolicy) -> Self {
        self.width_policy = policy;
        self
    }
}
