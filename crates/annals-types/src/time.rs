//! Simulation-time ordering key.
//!
//! Simulation time advances one month per tick. A [`MonthStamp`] counts
//! months since year 0, January: stamp 0 is year 0 month 1, stamp 12 is
//! year 1 month 1. Many events usually share one stamp.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Number of months in a simulation year.
pub const MONTHS_PER_YEAR: i64 = 12;

/// Months elapsed since year 0, January.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct MonthStamp(pub i64);

impl MonthStamp {
    /// Build a stamp from a year and a 1-based month.
    ///
    /// Returns `None` if `month` is outside `1..=12` or the result overflows.
    pub fn from_year_month(year: i64, month: u8) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        year.checked_mul(MONTHS_PER_YEAR)?
            .checked_add(i64::from(month).checked_sub(1)?)
            .map(Self)
    }

    /// Simulation year of this stamp.
    pub const fn year(self) -> i64 {
        self.0.div_euclid(MONTHS_PER_YEAR)
    }

    /// 1-based simulation month of this stamp.
    pub fn month(self) -> u8 {
        // rem_euclid(12) is always in 0..12, so the conversion cannot fail.
        u8::try_from(self.0.rem_euclid(MONTHS_PER_YEAR))
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Return the inner month count.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for MonthStamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Year {}, Month {}", self.year(), self.month())
    }
}

impl From<i64> for MonthStamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
