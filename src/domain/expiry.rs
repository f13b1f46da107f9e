//! Expiry arithmetic for active and warranty periods.
//!
//! Expiry dates are computed once, when a transaction is created. Whether a
//! period has lapsed is derived at read time from the stored expiry and the
//! current instant; nothing here is persisted.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Calendar unit of a period duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

impl DurationUnit {
    pub const ALL: [&'static str; 3] = ["days", "weeks", "months"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Weeks => "weeks",
            DurationUnit::Months => "months",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown duration unit '{0}'")]
pub struct UnknownUnit(pub String);

impl FromStr for DurationUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(DurationUnit::Days),
            "weeks" => Ok(DurationUnit::Weeks),
            "months" => Ok(DurationUnit::Months),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpiryError {
    #[error("{amount} {unit} from {start} is outside the representable date range")]
    OutOfRange {
        start: DateTime<Utc>,
        amount: i64,
        unit: DurationUnit,
    },
}

/// Adds `amount` units to `start` using calendar arithmetic.
///
/// Month addition clamps to the last day of the target month when the start
/// day does not exist there: Jan 31 + 1 month is Feb 28 (Feb 29 in leap
/// years). Time of day is preserved. Negative amounts move backwards.
pub fn compute_expiry(
    start: DateTime<Utc>,
    amount: i64,
    unit: DurationUnit,
) -> Result<DateTime<Utc>, ExpiryError> {
    let out_of_range = || ExpiryError::OutOfRange {
        start,
        amount,
        unit,
    };

    let result = match unit {
        DurationUnit::Days => add_days(start, amount),
        DurationUnit::Weeks => amount.checked_mul(7).and_then(|days| add_days(start, days)),
        DurationUnit::Months => add_months(start, amount),
    };

    result.ok_or_else(out_of_range)
}

fn add_days(start: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        start.checked_add_days(magnitude)
    } else {
        start.checked_sub_days(magnitude)
    }
}

fn add_months(start: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        start.checked_add_months(magnitude)
    } else {
        start.checked_sub_months(magnitude)
    }
}

/// Read-time status of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PeriodStatus {
    Active {
        #[serde(rename = "remainingDays")]
        remaining_days: i64,
    },
    Expired,
}

impl PeriodStatus {
    /// A period is expired strictly after its expiry instant. At exactly the
    /// expiry instant it is still active with zero remaining days.
    pub fn derive(now: DateTime<Utc>, expiry: DateTime<Utc>) -> Self {
        if now > expiry {
            return PeriodStatus::Expired;
        }

        let remaining_ms = (expiry - now).num_milliseconds();
        PeriodStatus::Active {
            remaining_days: (remaining_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, PeriodStatus::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[test]
    fn days_advance_calendar_days() {
        let start = at(2024, 2, 27);
        assert_eq!(compute_expiry(start, 3, DurationUnit::Days).unwrap(), at(2024, 3, 1));
        assert_eq!(compute_expiry(start, 0, DurationUnit::Days).unwrap(), start);
    }

    #[test]
    fn weeks_equal_seven_days() {
        let start = at(2023, 12, 20);
        for n in [1, 2, 5, 52] {
            assert_eq!(
                compute_expiry(start, n, DurationUnit::Weeks).unwrap(),
                compute_expiry(start, n * 7, DurationUnit::Days).unwrap()
            );
        }
    }

    #[test]
    fn months_clamp_to_end_of_month() {
        assert_eq!(
            compute_expiry(at(2023, 1, 31), 1, DurationUnit::Months).unwrap(),
            at(2023, 2, 28)
        );
        assert_eq!(
            compute_expiry(at(2024, 1, 31), 1, DurationUnit::Months).unwrap(),
            at(2024, 2, 29)
        );
        assert_eq!(
            compute_expiry(at(2024, 3, 31), 1, DurationUnit::Months).unwrap(),
            at(2024, 4, 30)
        );
    }

    #[test]
    fn months_roll_over_year_boundary() {
        assert_eq!(
            compute_expiry(at(2024, 11, 15), 3, DurationUnit::Months).unwrap(),
            at(2025, 2, 15)
        );
        assert_eq!(
            compute_expiry(at(2024, 6, 1), 12, DurationUnit::Months).unwrap(),
            at(2025, 6, 1)
        );
    }

    #[test]
    fn negative_amounts_move_backwards() {
        assert_eq!(
            compute_expiry(at(2024, 3, 1), -1, DurationUnit::Days).unwrap(),
            at(2024, 2, 29)
        );
        assert_eq!(
            compute_expiry(at(2024, 3, 31), -1, DurationUnit::Months).unwrap(),
            at(2024, 2, 29)
        );
    }

    #[test]
    fn overflow_is_reported() {
        let result = compute_expiry(at(2024, 1, 1), i64::MAX, DurationUnit::Weeks);
        assert!(matches!(result, Err(ExpiryError::OutOfRange { .. })));

        let result = compute_expiry(at(2024, 1, 1), i64::MAX, DurationUnit::Months);
        assert!(result.is_err());
    }

    #[test]
    fn unit_parses_lowercase_names() {
        assert_eq!("weeks".parse::<DurationUnit>().unwrap(), DurationUnit::Weeks);
        assert!("Weeks".parse::<DurationUnit>().is_err());
        assert!("years".parse::<DurationUnit>().is_err());
    }

    #[test]
    fn status_rounds_remaining_days_up() {
        let now = at(2024, 5, 1);
        assert_eq!(
            PeriodStatus::derive(now, now + Duration::hours(1)),
            PeriodStatus::Active { remaining_days: 1 }
        );
        assert_eq!(
            PeriodStatus::derive(now, now + Duration::days(2)),
            PeriodStatus::Active { remaining_days: 2 }
        );
        assert_eq!(
            PeriodStatus::derive(now, now + Duration::days(2) + Duration::seconds(1)),
            PeriodStatus::Active { remaining_days: 3 }
        );
    }

    #[test]
    fn status_boundary_is_not_expired() {
        let expiry = at(2024, 5, 1);
        assert_eq!(
            PeriodStatus::derive(expiry, expiry),
            PeriodStatus::Active { remaining_days: 0 }
        );
        assert!(PeriodStatus::derive(expiry + Duration::milliseconds(1), expiry).is_expired());
    }

    #[test]
    fn status_is_deterministic() {
        let now = at(2024, 5, 1);
        let expiry = at(2024, 5, 20);
        assert_eq!(PeriodStatus::derive(now, expiry), PeriodStatus::derive(now, expiry));
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let json = serde_json::to_value(PeriodStatus::Active { remaining_days: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "active", "remainingDays": 4}));
        let json = serde_json::to_value(PeriodStatus::Expired).unwrap();
        assert_eq!(json, serde_json::json!({"state": "expired"}));
    }
}
