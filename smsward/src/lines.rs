//! Configured phone lines and receiving-number resolution.

use serde::Deserialize;

/// One phone line (SIM) the device carries
#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    /// Zero-based slot index
    pub slot: u32,
    /// The line's own number
    pub number: String,
    /// Carrier name, informational only
    #[serde(default)]
    pub carrier: Option<String>,
}

/// Registry of configured lines
///
/// The platform's SMS broadcast does not say which line received a message,
/// so the receiving number can only be attributed when exactly one line is
/// configured. Multi-line devices always resolve to unknown.
#[derive(Debug, Clone, Default)]
pub struct LineRegistry {
    lines: Vec<LineConfig>,
}

impl LineRegistry {
    #[must_use]
    pub fn new(lines: Vec<LineConfig>) -> Self {
        Self { lines }
    }

    /// Resolve the receiving number for a message observed on `slot`
    #[must_use]
    pub fn receiver_for(&self, _slot: u32) -> Option<String> {
        match self.lines.as_slice() {
            [only] if !only.number.is_empty() => Some(only.number.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_multi_line(&self) -> bool {
        self.lines.len() > 1
    }
}
