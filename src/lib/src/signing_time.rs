//! Calendar timestamps carried by the PKCS#9 signing-time attribute.
//!
//! The attribute is an ASN.1 `Time` CHOICE, so both encodings are handled:
//!
//! - `UTCTime`: `YYMMDDhhmm[ss]Z`, two-digit years below 50 land in the 2000s,
//!   everything else in the 1900s.
//! - `GeneralizedTime`: `YYYYMMDDhhmm[ss]Z`.
//!
//! Only the `Z` (UTC) designator is accepted. Parsing never allocates.

use crate::error::TimeFormatError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use std::fmt;

/// `chrono` format of the reference timestamps accepted on the command line.
pub const REFERENCE_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// A UTC calendar timestamp.
///
/// Fields are declared most-significant first, so the derived ordering is
/// calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigningTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl SigningTime {
    /// Build a timestamp, rejecting impossible calendar values.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, TimeFormatError> {
        if NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).is_none() {
            return Err(TimeFormatError::InvalidTimeFormat("date out of range"));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(TimeFormatError::InvalidTimeFormat("time of day out of range"));
        }
        Ok(SigningTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Parse the content octets of an ASN.1 `UTCTime`.
    pub fn from_utc_time(s: &str) -> Result<Self, TimeFormatError> {
        let bytes = s.as_bytes();
        let yy = two_digits(bytes, 0)? as u16;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        Self::parse_tail(year, bytes, 2)
    }

    /// Parse the content octets of an ASN.1 `GeneralizedTime`.
    pub fn from_generalized_time(s: &str) -> Result<Self, TimeFormatError> {
        let bytes = s.as_bytes();
        let year = two_digits(bytes, 0)? as u16 * 100 + two_digits(bytes, 2)? as u16;
        Self::parse_tail(year, bytes, 4)
    }

    fn parse_tail(year: u16, bytes: &[u8], pos: usize) -> Result<Self, TimeFormatError> {
        let month = two_digits(bytes, pos)?;
        let day = two_digits(bytes, pos + 2)?;
        let hour = two_digits(bytes, pos + 4)?;
        let minute = two_digits(bytes, pos + 6)?;
        let mut pos = pos + 8;

        let second = if bytes.get(pos).is_some_and(u8::is_ascii_digit) {
            let second = two_digits(bytes, pos)?;
            pos += 2;
            second
        } else {
            0
        };

        if bytes.get(pos..) != Some(b"Z".as_slice()) {
            return Err(TimeFormatError::InvalidTimeFormat(
                "expected a single trailing UTC designator",
            ));
        }

        Self::new(year, month, day, hour, minute, second)
    }

    /// Parse a reference timestamp in `MM/DD/YYYY HH:mm:SS` form.
    pub fn parse_reference(s: &str) -> Result<Self, TimeFormatError> {
        let naive = NaiveDateTime::parse_from_str(s.trim(), REFERENCE_FORMAT)
            .map_err(|_| TimeFormatError::InvalidTimeFormat("expected MM/DD/YYYY HH:mm:SS"))?;
        Self::try_from(naive)
    }

    /// Render in the `MM/DD/YYYY HH:mm:SS` reference form.
    pub fn to_reference_string(&self) -> String {
        format!(
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute, self.second
        )
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
    }

    /// Seconds since the Unix epoch, or `None` for pre-1970 timestamps.
    pub fn unix_timestamp(&self) -> Option<u64> {
        let naive = self.to_naive()?;
        u64::try_from(Utc.from_utc_datetime(&naive).timestamp()).ok()
    }
}

impl TryFrom<NaiveDateTime> for SigningTime {
    type Error = TimeFormatError;

    fn try_from(value: NaiveDateTime) -> Result<Self, Self::Error> {
        let year = u16::try_from(value.year())
            .ok()
            .filter(|y| *y <= 9999)
            .ok_or(TimeFormatError::InvalidTimeFormat("year out of range"))?;
        Self::new(
            year,
            value.month() as u8,
            value.day() as u8,
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
        )
    }
}

impl fmt::Display for SigningTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn two_digits(bytes: &[u8], at: usize) -> Result<u8, TimeFormatError> {
    match (bytes.get(at), bytes.get(at + 1)) {
        (Some(&hi), Some(&lo)) if hi.is_ascii_digit() && lo.is_ascii_digit() => {
            Ok((hi - b'0') * 10 + (lo - b'0'))
        }
        _ => Err(TimeFormatError::InvalidTimeFormat("expected two decimal digits")),
    }
}
