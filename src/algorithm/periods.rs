//! Period assignment
//!
//! Maps a calendar month to the analysis window it belongs to. Windows are
//! checked once at construction; lookups after that are a linear scan over a
//! handful of windows.

use crate::error::{AbsenceError, Result};
use crate::models::period::{PeriodWindow, YearMonth};

/// Validated, ordered set of analysis windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSplitter {
    windows: Vec<PeriodWindow>,
}

impl PeriodSplitter {
    /// Build a splitter, requiring ordered, contiguous, non-overlapping
    /// windows with unique labels. Only the last window may be open-ended.
    pub fn new(windows: &[PeriodWindow]) -> Result<Self> {
        if windows.is_empty() {
            return Err(AbsenceError::InvalidConfig(
                "at least one period window is required".to_string(),
            ));
        }

        for (i, window) in windows.iter().enumerate() {
            if window.label.trim().is_empty() {
                return Err(AbsenceError::InvalidConfig(format!(
                    "period {} has an empty label",
                    i + 1
                )));
            }
            if windows[..i].iter().any(|w| w.label == window.label) {
                return Err(AbsenceError::InvalidConfig(format!(
                    "period label {} is used twice",
                    window.label
                )));
            }
            match window.end {
                Some(end) if end < window.start => {
                    return Err(AbsenceError::InvalidConfig(format!(
                        "period {window} ends before it starts"
                    )));
                }
                None if i + 1 < windows.len() => {
                    return Err(AbsenceError::InvalidConfig(format!(
                        "only the last period may be open-ended, not {}",
                        window.label
                    )));
                }
                _ => {}
            }
        }

        for pair in windows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            // prev.end is Some for every non-last window, checked above
            if let Some(end) = prev.end.filter(|end| end.next() != next.start) {
                return Err(AbsenceError::InvalidConfig(format!(
                    "periods {} and {} are not contiguous ({} then {})",
                    prev.label, next.label, end, next.start
                )));
            }
        }

        Ok(Self {
            windows: windows.to_vec(),
        })
    }

    /// Label of the window containing `ym`
    pub fn label_for(&self, ym: YearMonth) -> Result<&str> {
        self.windows
            .iter()
            .find(|w| w.contains(ym))
            .map(|w| w.label.as_str())
            .ok_or(AbsenceError::UnboundedDate {
                year: ym.year,
                month: ym.month,
            })
    }

    /// Window labels in calendar order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.windows.iter().map(|w| w.label.as_str())
    }

    #[must_use]
    pub fn windows(&self) -> &[PeriodWindow] {
        &self.windows
    }
}
