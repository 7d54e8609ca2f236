//! UTC datetime utilities without timezone dependencies.
//!
//! Provides a lightweight `DateTimeUtc` struct for the dates an HTTP file
//! server needs: `Last-Modified` / `If-Modified-Since` headers (IMF-fixdate)
//! and the clock shown in build status lines.
//!
//! # Examples
//!
//! ```ignore
//! let dt = DateTimeUtc::from_unix(784_111_777);
//! assert_eq!(dt.to_rfc2822(), "Sun, 06 Nov 1994 08:49:37 GMT");
//! assert_eq!(DateTimeUtc::parse_http(&dt.to_rfc2822()), Some(dt));
//! ```

use anyhow::{Result, bail};
use std::time::{SystemTime, UNIX_EPOCH};

const WEEKDAYS: [&str; 7] = ["Sat", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// UTC datetime without timezone complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeUtc {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTimeUtc {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Convert seconds since the Unix epoch (civil-from-days).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_unix(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;

        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Self::new(
            year as u16,
            month as u8,
            day as u8,
            (rem / 3600) as u8,
            ((rem / 60) % 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Convert a `SystemTime`, clamping pre-epoch values to the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    /// Seconds since the Unix epoch (days-from-civil).
    #[allow(clippy::cast_sign_loss)]
    pub fn to_unix(self) -> u64 {
        let (y, m) = if self.month <= 2 {
            (i64::from(self.year) - 1, i64::from(self.month) + 9)
        } else {
            (i64::from(self.year), i64::from(self.month) - 3)
        };
        let era = y.div_euclid(400);
        let yoe = y - era * 400;
        let doy = (153 * m + 2) / 5 + i64::from(self.day) - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let days = era * 146_097 + doe - 719_468;

        let secs = days * 86_400
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second);
        secs.max(0) as u64
    }

    /// Parse an IMF-fixdate header value: `Sun, 06 Nov 1994 08:49:37 GMT`.
    ///
    /// The obsolete RFC 850 and asctime forms are not accepted; callers treat
    /// an unparsable `If-Modified-Since` as absent.
    pub fn parse_http(s: &str) -> Option<Self> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 29 || &bytes[3..5] != b", " || &bytes[25..] != b" GMT" {
            return None;
        }
        if bytes[7] != b' ' || bytes[11] != b' ' || bytes[16] != b' ' {
            return None;
        }
        if bytes[19] != b':' || bytes[22] != b':' {
            return None;
        }

        let day = parse_u8(&bytes[5..7])?;
        let month_name = std::str::from_utf8(&bytes[8..11]).ok()?;
        let month = MONTHS.iter().position(|m| *m == month_name)? as u8 + 1;
        let year = parse_u16(&bytes[12..16])?;
        let hour = parse_u8(&bytes[17..19])?;
        let minute = parse_u8(&bytes[20..22])?;
        let second = parse_u8(&bytes[23..25])?;

        let dt = Self::new(year, month, day, hour, minute, second);
        dt.validate().ok()?;
        Some(dt)
    }

    #[allow(clippy::trivially_copy_pass_by_ref)] // Method style is more idiomatic
    pub fn validate(&self) -> Result<()> {
        let Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        } = *self;

        if !(1..=12).contains(&month) {
            bail!("month is invalid: {month}");
        }

        let max_days = Self::days_in_month(year, month);
        if day == 0 || day > max_days {
            bail!("day is invalid: {day}");
        }
        if hour > 23 {
            bail!("hour is invalid: {hour}");
        }
        if minute > 59 {
            bail!("minute is invalid: {minute}");
        }
        if second > 59 {
            bail!("second is invalid: {second}");
        }

        Ok(())
    }

    #[inline]
    #[allow(clippy::manual_is_multiple_of)] // Manual impl for const fn
    const fn is_leap_year(year: u16) -> bool {
        year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
    }

    #[inline]
    const fn days_in_month(year: u16, month: u8) -> u8 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if Self::is_leap_year(year) => 29,
            2 => 28,
            _ => 0,
        }
    }

    /// Format as IMF-fixdate, the form HTTP date headers use.
    pub fn to_rfc2822(self) -> String {
        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            WEEKDAYS[self.weekday_index()],
            self.day,
            MONTHS[(self.month - 1) as usize],
            self.year,
            self.hour,
            self.minute,
            self.second
        )
    }

    /// `HH:MM:SS`
    pub fn to_clock(self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    // Zeller's congruence, 0 = Saturday
    #[inline]
    #[allow(clippy::cast_sign_loss)] // Result of % 7 is always 0-6
    fn weekday_index(self) -> usize {
        let (y, m) = if self.month < 3 {
            (i32::from(self.year) - 1, i32::from(self.month) + 12)
        } else {
            (i32::from(self.year), i32::from(self.month))
        };
        let d = i32::from(self.day);
        ((d + (13 * (m + 1)) / 5 + y + y / 4 - y / 100 + y / 400) % 7) as usize
    }
}

/// Parse 2-digit ASCII number
#[inline]
fn parse_u8(bytes: &[u8]) -> Option<u8> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = bytes[0].wrapping_sub(b'0');
    let d2 = bytes[1].wrapping_sub(b'0');
    if d1 > 9 || d2 > 9 {
        return None;
    }
    Some(d1 * 10 + d2)
}

/// Parse 4-digit ASCII number
#[inline]
fn parse_u16(bytes: &[u8]) -> Option<u16> {
    if bytes.len() != 4 {
        return None;
    }
    let mut result = 0u16;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        result = result * 10 + u16::from(d);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unix_known_date() {
        let dt = DateTimeUtc::from_unix(784_111_777);
        assert_eq!(dt, DateTimeUtc::new(1994, 11, 6, 8, 49, 37));
        assert_eq!(dt.to_rfc2822(), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_from_unix_epoch() {
        let dt = DateTimeUtc::from_unix(0);
        assert_eq!(dt.to_rfc2822(), "Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[test]
    fn test_unix_conversion_is_stable() {
        for secs in [0, 951_782_400, 1_700_000_000, 4_107_542_399] {
            assert_eq!(DateTimeUtc::from_unix(secs).to_unix(), secs);
        }
    }

    #[test]
    fn test_leap_day() {
        // 2000-02-29 00:00:00
        let dt = DateTimeUtc::from_unix(951_782_400);
        assert_eq!(dt, DateTimeUtc::new(2000, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_parse_http() {
        let dt = DateTimeUtc::parse_http("Tue, 14 Nov 2023 22:13:20 GMT").unwrap();
        assert_eq!(dt.to_unix(), 1_700_000_000);
    }

    #[test]
    fn test_parse_http_rejects_other_forms() {
        assert_eq!(DateTimeUtc::parse_http("Sunday, 06-Nov-94 08:49:37 GMT"), None);
        assert_eq!(DateTimeUtc::parse_http("Sun Nov  6 08:49:37 1994"), None);
        assert_eq!(DateTimeUtc::parse_http("Sun, 06 Foo 1994 08:49:37 GMT"), None);
        assert_eq!(DateTimeUtc::parse_http("Sun, 31 Feb 1994 08:49:37 GMT"), None);
        assert_eq!(DateTimeUtc::parse_http(""), None);
    }

    #[test]
    fn test_to_clock() {
        assert_eq!(DateTimeUtc::new(2024, 6, 15, 4, 5, 6).to_clock(), "04:05:06");
    }

    #[test]
    fn test_validate_invalid_day() {
        assert!(DateTimeUtc::new(2024, 4, 31, 12, 0, 0).validate().is_err());
        assert!(DateTimeUtc::new(2023, 2, 29, 12, 0, 0).validate().is_err());
        assert!(DateTimeUtc::new(2024, 2, 29, 12, 0, 0).validate().is_ok());
    }
}
