use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{error::CodecError, model::Value, CodecResult};

/// Timestamp precision for encoded lines.
///
/// The codec always normalizes time values to epoch nanoseconds first;
/// a coarser precision divides the integer that goes on the wire. The
/// server must be told the same precision out of band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
}

impl Precision {
    pub(crate) fn divisor(&self) -> i64 {
        match self {
            Self::Nanosecond => 1,
            Self::Microsecond => 1_000,
            Self::Millisecond => 1_000_000,
            Self::Second => 1_000_000_000,
            Self::Minute => 60 * 1_000_000_000,
            Self::Hour => 3600 * 1_000_000_000,
        }
    }
}

/// Parse date-time text. Accepts RFC 3339 and the common offset-less
/// forms; offset-less input is taken as UTC, silently.
pub fn parse_datetime_text(s: &str) -> CodecResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(CodecError::Timestamp(format!("unparseable datetime text: {:?}", s)))
}

pub(crate) fn datetime_to_ns(dt: &DateTime<Utc>) -> CodecResult<i64> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| CodecError::Timestamp(format!("datetime out of nanosecond range: {}", dt)))
}

/// Normalize a time value to epoch nanoseconds.
///
/// Integers pass through verbatim, text is parsed, date-times are
/// converted. `Null` means the point carries no timestamp.
pub(crate) fn time_value_to_ns(value: &Value) -> CodecResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(ns) => Ok(Some(*ns)),
        Value::String(s) => Ok(Some(datetime_to_ns(&parse_datetime_text(s)?)?)),
        Value::DateTime(dt) => Ok(Some(datetime_to_ns(dt)?)),
        other => Err(CodecError::Timestamp(format!("{} value is not a time", other.kind_name()))),
    }
}

#[cfg(test)]
mod test_time {
    use super::*;

    #[test]
    fn test_rfc3339() {
        let dt = parse_datetime_text("2009-11-10T23:00:00Z").unwrap();
        assert_eq!(1_257_894_000_000_000_000, datetime_to_ns(&dt).unwrap());

        let dt = parse_datetime_text("2009-11-10T18:00:00-05:00").unwrap();
        assert_eq!(1_257_894_000_000_000_000, datetime_to_ns(&dt).unwrap());
    }

    #[test]
    fn test_offsetless_text_is_utc() {
        let dt = parse_datetime_text("2009-11-10T23:00:00").unwrap();
        assert_eq!(1_257_894_000_000_000_000, datetime_to_ns(&dt).unwrap());

        let dt = parse_datetime_text("2009-11-10 23:00:00.5").unwrap();
        assert_eq!(1_257_894_000_500_000_000, datetime_to_ns(&dt).unwrap());

        let dt = parse_datetime_text("2009-11-10").unwrap();
        assert_eq!(1_257_811_200_000_000_000, datetime_to_ns(&dt).unwrap());
    }

    #[test]
    fn test_unparseable_text() {
        assert!(parse_datetime_text("last tuesday").is_err());
        assert!(parse_datetime_text("").is_err());
    }

    #[test]
    fn test_time_value_variants() {
        assert_eq!(None, time_value_to_ns(&Value::Null).unwrap());
        assert_eq!(Some(1234), time_value_to_ns(&Value::Integer(1234)).unwrap());
        assert_eq!(
            Some(1_257_894_000_000_000_000),
            time_value_to_ns(&Value::String("2009-11-10T23:00:00Z".to_string())).unwrap()
        );
        assert!(time_value_to_ns(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_precision_divisors() {
        assert_eq!(1, Precision::Nanosecond.divisor());
        assert_eq!(1_000_000_000, Precision::Second.divisor());
        assert_eq!(3_600_000_000_000, Precision::Hour.divisor());
    }
}
