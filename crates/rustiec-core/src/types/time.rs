use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

/// Time tag layout appended to information elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeFormat {
    None,
    Cp24,
    Cp56,
}

impl TimeFormat {
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Cp24 => 3,
            Self::Cp56 => 7,
        }
    }
}

/// Three-octet binary time: milliseconds within the minute plus minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cp24Time2a {
    pub millisecond: u16,
    pub minute: u8,
    pub invalid: bool,
}

impl Cp24Time2a {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.millisecond > 59_999 || self.minute > 59 {
            return Err(EncodeError::ValueOutOfRange);
        }
        w.write_le_u16(self.millisecond)?;
        w.write_u8(self.minute | if self.invalid { 0x80 } else { 0 })
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let millisecond = r.read_le_u16()?;
        let b = r.read_u8()?;
        Ok(Self {
            millisecond,
            minute: b & 0x3F,
            invalid: b & 0x80 != 0,
        })
    }
}

/// Seven-octet binary time with a two-digit year.
///
/// Fields are kept as transmitted; the year is an offset from 2000.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cp56Time2a {
    pub millisecond: u16,
    pub minute: u8,
    pub invalid: bool,
    pub hour: u8,
    pub summer_time: bool,
    pub day: u8,
    /// 1 = Monday .. 7 = Sunday, 0 when unused.
    pub weekday: u8,
    pub month: u8,
    pub year: u8,
}

impl Cp56Time2a {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.millisecond > 59_999
            || self.minute > 59
            || self.hour > 23
            || self.day > 31
            || self.weekday > 7
            || self.month > 12
            || self.year > 99
        {
            return Err(EncodeError::ValueOutOfRange);
        }
        w.write_le_u16(self.millisecond)?;
        w.write_u8(self.minute | if self.invalid { 0x80 } else { 0 })?;
        w.write_u8(self.hour | if self.summer_time { 0x80 } else { 0 })?;
        w.write_u8(self.day | (self.weekday << 5))?;
        w.write_u8(self.month)?;
        w.write_u8(self.year)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let millisecond = r.read_le_u16()?;
        let minute = r.read_u8()?;
        let hour = r.read_u8()?;
        let day = r.read_u8()?;
        let month = r.read_u8()?;
        let year = r.read_u8()?;
        Ok(Self {
            millisecond,
            minute: minute & 0x3F,
            invalid: minute & 0x80 != 0,
            hour: hour & 0x1F,
            summer_time: hour & 0x80 != 0,
            day: day & 0x1F,
            weekday: day >> 5,
            month: month & 0x0F,
            year: year & 0x7F,
        })
    }

    /// Builds a UTC time tag from a point in time after 2000-01-01.
    #[cfg(feature = "std")]
    pub fn from_system_time(time: std::time::SystemTime) -> Option<Self> {
        let since_epoch = time.duration_since(std::time::UNIX_EPOCH).ok()?;
        let secs = since_epoch.as_secs();
        let days = (secs / 86_400) as i64;
        let secs_of_day = secs % 86_400;
        let (year, month, day) = civil_from_days(days);
        if !(2000..=2099).contains(&year) {
            return None;
        }
        // 1970-01-01 was a Thursday.
        let weekday = ((days + 3).rem_euclid(7) + 1) as u8;
        Some(Self {
            millisecond: ((secs_of_day % 60) * 1000 + u64::from(since_epoch.subsec_millis()))
                as u16,
            minute: ((secs_of_day / 60) % 60) as u8,
            invalid: false,
            hour: (secs_of_day / 3600) as u8,
            summer_time: false,
            day,
            weekday,
            month,
            year: (year - 2000) as u8,
        })
    }

    /// Interprets the tag as UTC. Returns `None` for calendar-invalid fields.
    #[cfg(feature = "std")]
    pub fn to_system_time(&self) -> Option<std::time::SystemTime> {
        if self.month == 0
            || self.month > 12
            || self.day == 0
            || self.day > 31
            || self.hour > 23
            || self.minute > 59
            || self.millisecond > 59_999
        {
            return None;
        }
        let days = days_from_civil(2000 + i64::from(self.year), self.month, self.day);
        let secs = days * 86_400
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.millisecond / 1000);
        let secs = u64::try_from(secs).ok()?;
        Some(
            std::time::UNIX_EPOCH
                + std::time::Duration::from_secs(secs)
                + std::time::Duration::from_millis(u64::from(self.millisecond % 1000)),
        )
    }
}

/// A decoded time tag of either width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeTag {
    Cp24(Cp24Time2a),
    Cp56(Cp56Time2a),
}

impl TimeTag {
    pub const fn format(&self) -> TimeFormat {
        match self {
            Self::Cp24(_) => TimeFormat::Cp24,
            Self::Cp56(_) => TimeFormat::Cp56,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Cp24(t) => t.encode(w),
            Self::Cp56(t) => t.encode(w),
        }
    }

    /// Decodes the tag required by `format`; `TimeFormat::None` yields `None`.
    pub fn decode(r: &mut Reader<'_>, format: TimeFormat) -> Result<Option<Self>, DecodeError> {
        Ok(match format {
            TimeFormat::None => None,
            TimeFormat::Cp24 => Some(Self::Cp24(Cp24Time2a::decode(r)?)),
            TimeFormat::Cp56 => Some(Self::Cp56(Cp56Time2a::decode(r)?)),
        })
    }
}

#[cfg(feature = "std")]
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(feature = "std")]
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
