//! Locale-free digit grouping for console output.
//!
//! `23458286` renders as `23,458,286` with the default grouping. The grouping is
//! an explicit value so output never depends on process locale.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberGrouping {
    pub separator: char,
    /// Digits per group; 0 disables grouping.
    pub group_width: usize,
}

impl Default for NumberGrouping {
    fn default() -> Self {
        Self {
            separator: ',',
            group_width: 3,
        }
    }
}

impl NumberGrouping {
    /// Format an unsigned integer with separators every `group_width` digits.
    #[must_use]
    pub fn format_u64(&self, value: u64) -> String {
        let digits = value.to_string();
        if self.group_width == 0 || digits.len() <= self.group_width {
            return digits;
        }
        let mut out = String::with_capacity(digits.len() + digits.len() / self.group_width);
        let lead = digits.len() % self.group_width;
        for (i, ch) in digits.chars().enumerate() {
            if i != 0 && (i + self.group_width - lead) % self.group_width == 0 {
                out.push(self.separator);
            }
            out.push(ch);
        }
        out
    }

    /// Format a signed integer; the sign is kept outside the grouped digits.
    #[must_use]
    pub fn format_i64(&self, value: i64) -> String {
        let grouped = self.format_u64(value.unsigned_abs());
        if value < 0 {
            format!("-{grouped}")
        } else {
            grouped
        }
    }

    /// Format a microsecond duration as whole microseconds (truncated).
    #[must_use]
    pub fn format_micros(&self, micros: f64) -> String {
        if !micros.is_finite() {
            return String::from("n/a");
        }
        self.format_i64(micros.trunc() as i64)
    }
}
