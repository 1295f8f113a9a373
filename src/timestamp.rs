//! MS-DOS timestamp handling.
//!
//! ZIP headers store modification times as MS-DOS date/time pairs:
//! - local time with no time zone
//! - years 1980 through 2107
//! - two-second resolution
//!
//! This crate treats DOS times as UTC when converting to and from
//! [`SystemTime`], which is what most ZIP writers on Unix do.
//!
//! # Example
//!
//! ```rust
//! use zipsession::Timestamp;
//!
//! let ts = Timestamp::from_parts(2024, 2, 29, 13, 45, 31).unwrap();
//! assert_eq!(ts.second(), 30); // rounded down to even seconds
//! assert_eq!(Timestamp::from_dos(ts.dos_date(), ts.dos_time()), Some(ts));
//! ```

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// First year representable in a DOS date.
pub const DOS_EPOCH_YEAR: u16 = 1980;

/// Last year representable in a DOS date (7-bit year offset).
pub const DOS_MAX_YEAR: u16 = DOS_EPOCH_YEAR + 127;

const SECS_PER_DAY: i64 = 86_400;

/// Unix time of [`Timestamp::DOS_EPOCH`].
const DOS_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// A ZIP entry modification time.
///
/// Ordering follows calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Timestamp {
    /// 1980-01-01 00:00:00, the earliest DOS time.
    pub const DOS_EPOCH: Timestamp = Timestamp {
        year: DOS_EPOCH_YEAR,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Creates a timestamp from calendar fields.
    ///
    /// Seconds are rounded down to the DOS two-second resolution. Returns
    /// `None` if any field is out of range or the year cannot be stored.
    pub fn from_parts(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        if !(DOS_EPOCH_YEAR..=DOS_MAX_YEAR).contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second: second & !1,
        })
    }

    /// Decodes a DOS date/time pair as stored in ZIP headers.
    pub fn from_dos(date: u16, time: u16) -> Option<Self> {
        Self::from_parts(
            DOS_EPOCH_YEAR + (date >> 9),
            ((date >> 5) & 0x0F) as u8,
            (date & 0x1F) as u8,
            (time >> 11) as u8,
            ((time >> 5) & 0x3F) as u8,
            ((time & 0x1F) * 2) as u8,
        )
    }

    /// Creates a timestamp from Unix seconds, treating DOS time as UTC.
    ///
    /// Returns `None` outside the DOS range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let days = secs.div_euclid(SECS_PER_DAY);
        let rem = secs.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        let year = u16::try_from(year).ok()?;
        Self::from_parts(
            year,
            month,
            day,
            (rem / 3600) as u8,
            ((rem % 3600) / 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Creates a timestamp from a `SystemTime`, clamping to the DOS range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(_) => return Self::DOS_EPOCH,
        };
        if secs < DOS_EPOCH_UNIX_SECS {
            return Self::DOS_EPOCH;
        }
        Self::from_unix_secs(secs).unwrap_or_else(Self::max_value)
    }

    /// The current time, as written for entries added without an explicit time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// 2107-12-31 23:59:58, the latest DOS time.
    pub fn max_value() -> Self {
        Self {
            year: DOS_MAX_YEAR,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 58,
        }
    }

    /// Returns seconds since the Unix epoch, treating DOS time as UTC.
    pub fn as_unix_secs(&self) -> i64 {
        let days = days_from_civil(self.year as i64, self.month, self.day);
        days * SECS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        // Every DOS time is after 1970, so the offset is never negative.
        UNIX_EPOCH + Duration::from_secs(self.as_unix_secs().max(0) as u64)
    }

    /// Packed DOS date field.
    pub fn dos_date(&self) -> u16 {
        ((self.year - DOS_EPOCH_YEAR) << 9) | ((self.month as u16) << 5) | self.day as u16
    }

    /// Packed DOS time field.
    pub fn dos_time(&self) -> u16 {
        ((self.hour as u16) << 11) | ((self.minute as u16) << 5) | (self.second as u16 / 2)
    }

    /// Calendar year.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Month, 1-12.
    pub fn month(&self) -> u8 {
        self.month
    }

    /// Day of month, 1-31.
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Hour, 0-23.
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute, 0-59.
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Second, always even.
    pub fn second(&self) -> u8 {
        self.second
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::DOS_EPOCH
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> SystemTime {
        ts.as_system_time()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

// Howard Hinnant's days_from_civil / civil_from_days.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_epoch() {
        let ts = Timestamp::DOS_EPOCH;
        assert_eq!(ts.as_unix_secs(), 315_532_800);
        assert_eq!(ts.dos_date(), 0x0021);
        assert_eq!(ts.dos_time(), 0);
        assert_eq!(Timestamp::default(), ts);
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(Timestamp::from_parts(1979, 12, 31, 0, 0, 0).is_none());
        assert!(Timestamp::from_parts(2108, 1, 1, 0, 0, 0).is_none());
        assert!(Timestamp::from_parts(2023, 2, 29, 0, 0, 0).is_none());
        assert!(Timestamp::from_parts(2024, 2, 29, 0, 0, 0).is_some());
        assert!(Timestamp::from_parts(2024, 13, 1, 0, 0, 0).is_none());
        assert!(Timestamp::from_parts(2024, 1, 1, 24, 0, 0).is_none());
    }

    #[test]
    fn test_two_second_resolution() {
        let ts = Timestamp::from_parts(2020, 6, 15, 10, 20, 59).unwrap();
        assert_eq!(ts.second(), 58);
    }

    #[test]
    fn test_dos_round_trip() {
        let ts = Timestamp::from_parts(2021, 11, 3, 17, 4, 42).unwrap();
        let back = Timestamp::from_dos(ts.dos_date(), ts.dos_time()).unwrap();
        assert_eq!(ts, back);
        assert_eq!(back.to_string(), "2021-11-03 17:04:42");
    }

    #[test]
    fn test_unix_conversion() {
        // 2009-02-13 23:31:30 UTC
        let ts = Timestamp::from_unix_secs(1_234_567_890).unwrap();
        assert_eq!(
            (ts.year(), ts.month(), ts.day(), ts.hour(), ts.minute(), ts.second()),
            (2009, 2, 13, 23, 31, 30)
        );
        assert_eq!(ts.as_unix_secs(), 1_234_567_890);
        assert!(Timestamp::from_unix_secs(0).is_none());
    }

    #[test]
    fn test_system_time_clamps() {
        assert_eq!(Timestamp::from_system_time(UNIX_EPOCH), Timestamp::DOS_EPOCH);
        let seventies = UNIX_EPOCH + Duration::from_secs(200_000_000);
        assert_eq!(Timestamp::from_system_time(seventies), Timestamp::DOS_EPOCH);
        let before = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(Timestamp::from_system_time(before), Timestamp::DOS_EPOCH);
        let epoch = UNIX_EPOCH + Duration::from_secs(DOS_EPOCH_UNIX_SECS as u64);
        assert_eq!(Timestamp::from_system_time(epoch), Timestamp::DOS_EPOCH);
        let far = UNIX_EPOCH + Duration::from_secs(10_000_000_000);
        assert_eq!(Timestamp::from_system_time(far), Timestamp::max_value());
    }

    #[test]
    fn test_ordering() {
        let a = Timestamp::from_parts(2020, 1, 1, 0, 0, 0).unwrap();
        let b = Timestamp::from_parts(2020, 1, 1, 0, 0, 2).unwrap();
        assert!(a < b);
    }
}
