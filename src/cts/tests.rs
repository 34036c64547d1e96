//! Unit tests for Current Time decoding.

use super::{day_of_week_name, AdjustReason, CurrentTime, DayOfWeek, DecodeError};

// ═══════════════════════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn decode_reference_payload() {
    // 2021-06-15 10:30:00, Wednesday, 128/256, manual update
    let data = [0xE5, 0x07, 0x06, 0x0F, 0x0A, 0x1E, 0x00, 0x03, 0x80, 0x01];
    let time = CurrentTime::decode(&data).unwrap();

    assert_eq!(time.year, 2021);
    assert_eq!(time.month, 6);
    assert_eq!(time.day, 15);
    assert_eq!(time.hours, 10);
    assert_eq!(time.minutes, 30);
    assert_eq!(time.seconds, 0);
    assert_eq!(time.day_of_week, DayOfWeek::Wednesday);
    assert_eq!(time.day_of_week.name(), "WEDNESDAY");
    assert_eq!(time.fractions_256, 128);
    assert_eq!(time.adjust_reason, AdjustReason::MANUAL);
}

#[test]
fn decode_short_payload_fails() {
    let data = [0xE5, 0x07, 0x06, 0x0F, 0x0A];
    assert_eq!(
        CurrentTime::decode(&data),
        Err(DecodeError::TooShort { len: 5 })
    );
    assert_eq!(
        CurrentTime::decode(&[]),
        Err(DecodeError::TooShort { len: 0 })
    );
}

#[test]
fn decode_nine_bytes_fails() {
    let data = [0u8; 9];
    assert_eq!(
        CurrentTime::decode(&data),
        Err(DecodeError::TooShort { len: 9 })
    );
}

#[test]
fn decode_ignores_trailing_bytes() {
    let data = [0xE8, 0x07, 0x02, 0x1D, 0x17, 0x3B, 0x3B, 0x04, 0x00, 0x00, 0xFF, 0xFF];
    let time = CurrentTime::decode(&data).unwrap();
    assert_eq!(time.year, 2024);
    assert_eq!(time.month, 2);
    assert_eq!(time.day, 29);
    assert_eq!(time.day_of_week, DayOfWeek::Thursday);
    assert!(time.adjust_reason.is_empty());
}

#[test]
fn decode_unknown_fields() {
    let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00];
    let time = CurrentTime::decode(&data).unwrap();
    assert_eq!(time.year, 0);
    assert_eq!(time.day_of_week, DayOfWeek::Invalid(9));
    assert_eq!(time.day_of_week.name(), "** UNKNOWN **");
}

#[test]
fn display_formats_date_and_day() {
    let data = [0xE5, 0x07, 0x06, 0x0F, 0x0A, 0x1E, 0x00, 0x03, 0x80, 0x01];
    let time = CurrentTime::decode(&data).unwrap();
    assert_eq!(time.to_string(), "2021/06/15 10:30:00 WEDNESDAY");
}

// ═══════════════════════════════════════════════════════════════════════════
// Day of week
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn day_of_week_names() {
    let expected = [
        "UNKNOWN",
        "MONDAY",
        "TUESDAY",
        "WEDNESDAY",
        "THURSDAY",
        "FRIDAY",
        "SATURDAY",
        "SUNDAY",
    ];
    for (code, name) in expected.iter().enumerate() {
        assert_eq!(day_of_week_name(code as u8), *name);
    }
    assert_eq!(day_of_week_name(8), "** UNKNOWN **");
    assert_eq!(day_of_week_name(255), "** UNKNOWN **");
}

#[test]
fn day_of_week_code_is_preserved() {
    for code in 0..=u8::MAX {
        assert_eq!(DayOfWeek::from_code(code).code(), code);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Adjust reason
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn adjust_reason_describe_lists_set_flags_in_bit_order() {
    let reason = AdjustReason::DST_CHANGE | AdjustReason::MANUAL;
    let text: Vec<&str> = reason.describe().collect();
    assert_eq!(text, ["Manual Time Update", "Change of DST"]);
}

#[test]
fn adjust_reason_all_flags() {
    let reason = AdjustReason::from_bits_retain(0x0F);
    assert_eq!(reason.describe().count(), 4);
    assert!(reason.contains(AdjustReason::EXTERNAL_REFERENCE));
    assert!(reason.contains(AdjustReason::TIME_ZONE_CHANGE));
}

#[test]
fn adjust_reason_reserved_bits_are_kept_but_not_described() {
    let reason = AdjustReason::from_bits_retain(0xF0);
    assert_eq!(reason.bits(), 0xF0);
    assert_eq!(reason.describe().count(), 0);
}
