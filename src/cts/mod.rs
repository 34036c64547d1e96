//! Current Time characteristic decoding.
//!
//! Layout (10 bytes, little-endian):
//! ```text
//! Byte 0-1: Year (0 = unknown)
//! Byte 2:   Month (1-12, 0 = unknown)
//! Byte 3:   Day (1-31, 0 = unknown)
//! Byte 4:   Hours
//! Byte 5:   Minutes
//! Byte 6:   Seconds
//! Byte 7:   Day of week (1 = Monday .. 7 = Sunday, 0 = unknown)
//! Byte 8:   Fractions256
//! Byte 9:   Adjust reason (bitfield)
//!           Bit 0 = Manual time update
//!           Bit 1 = External reference time update
//!           Bit 2 = Change of time zone
//!           Bit 3 = Change of DST
//! ```

#[cfg(test)]
mod tests;

use core::fmt;

use bitflags::bitflags;

/// Encoded Current Time value size in bytes.
pub const CURRENT_TIME_LEN: usize = 10;

/// Why a Current Time payload could not be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Fewer than [`CURRENT_TIME_LEN`] bytes.
    TooShort { len: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort { len } => write!(
                f,
                "current time payload too short ({} < {} bytes)",
                len, CURRENT_TIME_LEN
            ),
        }
    }
}

bitflags! {
    /// Reasons the peer reports for its last clock adjustment.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct AdjustReason: u8 {
        const MANUAL = 0x01;
        const EXTERNAL_REFERENCE = 0x02;
        const TIME_ZONE_CHANGE = 0x04;
        const DST_CHANGE = 0x08;
    }
}

const ADJUST_REASON_TEXT: [(AdjustReason, &str); 4] = [
    (AdjustReason::MANUAL, "Manual Time Update"),
    (AdjustReason::EXTERNAL_REFERENCE, "External Reference Time Update"),
    (AdjustReason::TIME_ZONE_CHANGE, "Change of Time Zone"),
    (AdjustReason::DST_CHANGE, "Change of DST"),
];

impl AdjustReason {
    /// Human-readable text for each set flag, lowest bit first.
    /// Reserved bits are ignored.
    pub fn describe(self) -> impl Iterator<Item = &'static str> {
        ADJUST_REASON_TEXT
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, text)| text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AdjustReason {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AdjustReason({=u8:#04x})", self.bits())
    }
}

/// Day-of-week field of the Current Time value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DayOfWeek {
    Unknown,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
    /// Reserved code (8..=255).
    Invalid(u8),
}

impl DayOfWeek {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DayOfWeek::Unknown,
            1 => DayOfWeek::Monday,
            2 => DayOfWeek::Tuesday,
            3 => DayOfWeek::Wednesday,
            4 => DayOfWeek::Thursday,
            5 => DayOfWeek::Friday,
            6 => DayOfWeek::Saturday,
            7 => DayOfWeek::Sunday,
            other => DayOfWeek::Invalid(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DayOfWeek::Unknown => 0,
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
            DayOfWeek::Sunday => 7,
            DayOfWeek::Invalid(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Unknown => "UNKNOWN",
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
            DayOfWeek::Invalid(_) => "** UNKNOWN **",
        }
    }
}

/// Name for a raw day-of-week code.
pub fn day_of_week_name(code: u8) -> &'static str {
    DayOfWeek::from_code(code).name()
}

/// One decoded Current Time notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub day_of_week: DayOfWeek,
    pub fractions_256: u8,
    pub adjust_reason: AdjustReason,
}

impl CurrentTime {
    /// Decode a Current Time value. Bytes past the first ten are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let Some(bytes) = data.get(..CURRENT_TIME_LEN) else {
            return Err(DecodeError::TooShort { len: data.len() });
        };
        Ok(Self {
            year: u16::from_le_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day: bytes[3],
            hours: bytes[4],
            minutes: bytes[5],
            seconds: bytes[6],
            day_of_week: DayOfWeek::from_code(bytes[7]),
            fractions_256: bytes[8],
            adjust_reason: AdjustReason::from_bits_retain(bytes[9]),
        })
    }
}

impl fmt::Display for CurrentTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02} {}",
            self.year,
            self.month,
            self.day,
            self.hours,
            self.minutes,
            self.seconds,
            self.day_of_week.name()
        )
    }
}
