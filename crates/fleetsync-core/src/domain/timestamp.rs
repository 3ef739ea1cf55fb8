use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Vendor wire format for `lastGMTUpdateTime` and `MaxGmtUpdateTime`.
const WIRE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const ISO_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

const ISO_FORMAT_SUBSECOND: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
);

/// Naive layouts seen in vendor `gps_time` values, tried in order.
const NAIVE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    WIRE_FORMAT,
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
    format_description!("[month]/[day]/[year] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const AWARE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
)];

/// Formats an instant in the vendor wire format, in UTC, without a suffix.
pub fn format_wire(value: OffsetDateTime) -> String {
    value
        .to_offset(UtcOffset::UTC)
        .format(WIRE_FORMAT)
        .unwrap_or_else(|_| String::from("<unformattable>"))
}

/// Parses a vendor wire timestamp, which is always UTC.
pub fn parse_wire_utc(input: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(input.trim(), WIRE_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Parses a loosely formatted timestamp and pins it to `offset`.
///
/// Naive values are read as wall-clock time in `offset`; values carrying
/// their own offset are converted to it.
pub fn localize(input: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(trimmed, *format).ok())
    {
        return Some(naive.assume_offset(offset));
    }

    OffsetDateTime::parse(trimmed, &Rfc3339)
        .ok()
        .or_else(|| {
            AWARE_FORMATS
                .iter()
                .find_map(|format| OffsetDateTime::parse(trimmed, *format).ok())
        })
        .map(|aware| aware.to_offset(offset))
}

/// ISO-8601 rendering with an explicit numeric offset (`+00:00`, never `Z`).
pub fn format_iso(value: OffsetDateTime) -> String {
    let format = if value.nanosecond() == 0 {
        ISO_FORMAT
    } else {
        ISO_FORMAT_SUBSECOND
    };
    value
        .format(format)
        .unwrap_or_else(|_| String::from("<unformattable>"))
}

/// Offset for a whole-hour GMT shift. Callers validate the range first.
pub fn hours_offset(hours: i8) -> Option<UtcOffset> {
    UtcOffset::from_hms(hours, 0, 0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn wire_format_has_no_timezone_suffix() {
        let value = datetime!(2024-06-27 14:00:00 +02:00);
        assert_eq!(format_wire(value), "2024-06-27 12:00:00");
    }

    #[test]
    fn wire_timestamps_parse_as_utc() {
        let parsed = parse_wire_utc("2025-06-27 01:56:02").expect("must parse");
        assert_eq!(parsed, datetime!(2025-06-27 01:56:02 UTC));
        assert!(parse_wire_utc("27/06/2025").is_none());
    }

    #[test]
    fn naive_timestamps_take_the_configured_offset() {
        let offset = hours_offset(-5).expect("valid offset");
        let localized = localize("2023-01-01 10:00:00", offset).expect("must parse");
        assert_eq!(format_iso(localized), "2023-01-01T10:00:00-05:00");
    }

    #[test]
    fn zero_offset_renders_numerically() {
        let localized = localize("2023-01-01 10:00:00", UtcOffset::UTC).expect("must parse");
        assert!(format_iso(localized).contains("T10:00:00+00:00"));
    }

    #[test]
    fn permissive_layouts_are_accepted() {
        let offset = UtcOffset::UTC;
        for input in [
            "2023-01-01T10:00:00",
            "2023/01/01 10:00:00",
            "01/01/2023 10:00:00",
            " 2023-01-01 10:00:00 ",
        ] {
            let parsed = localize(input, offset).unwrap_or_else(|| panic!("{input} must parse"));
            assert_eq!(parsed, datetime!(2023-01-01 10:00:00 UTC), "{input}");
        }
    }

    #[test]
    fn aware_timestamps_are_converted_to_the_configured_offset() {
        let offset = hours_offset(1).expect("valid offset");
        let parsed = localize("2023-01-01T10:00:00Z", offset).expect("must parse");
        assert_eq!(format_iso(parsed), "2023-01-01T11:00:00+01:00");
    }

    #[test]
    fn subsecond_precision_is_kept() {
        let parsed = localize("2023-01-01 10:00:00.250", UtcOffset::UTC).expect("must parse");
        assert_eq!(format_iso(parsed), "2023-01-01T10:00:00.250000+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(localize("", UtcOffset::UTC).is_none());
        assert!(localize("yesterday-ish", UtcOffset::UTC).is_none());
    }
}
