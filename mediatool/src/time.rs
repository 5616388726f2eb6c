// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Time units for media timestamps.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unit of a media timestamp.
///
/// Conversions between units are exact integer arithmetic: converting to a
/// finer unit multiplies, converting to a coarser unit truncates toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds.
    pub const fn nanos(self) -> i128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Converts `value`, expressed in `from`, into this unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the result does not fit in an `i64`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mediatool::TimeUnit;
    ///
    /// # fn main() -> Result<(), mediatool::Error> {
    /// assert_eq!(TimeUnit::Milliseconds.convert(1_500_000, TimeUnit::Microseconds)?, 1_500);
    /// assert_eq!(TimeUnit::Nanoseconds.convert(3, TimeUnit::Microseconds)?, 3_000);
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert(self, value: i64, from: TimeUnit) -> Result<i64> {
        let converted = i128::from(value) * from.nanos() / self.nanos();
        i64::try_from(converted).map_err(|_| {
            Error::InvalidArgument(format!(
                "{value} {from} does not fit in {self} as a 64-bit value"
            ))
        })
    }

    /// Short symbol used in logs and parsed by [`FromStr`].
    pub fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ns" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "µs" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "seconds" => Ok(TimeUnit::Seconds),
            "min" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hours" => Ok(TimeUnit::Hours),
            "d" | "days" => Ok(TimeUnit::Days),
            other => Err(Error::InvalidArgument(format!("unknown time unit \"{other}\""))),
        }
    }
}
