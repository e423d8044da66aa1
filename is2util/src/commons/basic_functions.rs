use chrono::{DateTime, Duration, Utc};

/// ATLAS standard data product epoch (2018-01-01T00:00:00Z) as Unix seconds
pub const ATLAS_EPOCH_UNIX_SECONDS: i64 = 1_514_764_800;

/// Format a datetime for the order API, e.g. `2019-03-01T00:00:00Z`
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Temporal filter for subset orders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// A missing end defaults to one day after `start`
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        TimeRange {
            start,
            end: end.unwrap_or(start + Duration::days(1)),
        }
    }

    /// Serialized value of the `time` parameter
    pub fn to_param(&self) -> String {
        format!("{},{}", format_datetime(&self.start), format_datetime(&self.end))
    }
}

/// Microseconds since the Unix epoch for an ATLAS `delta_time` value
pub fn delta_time_to_micros(delta_time: f64) -> Option<i64> {
    if !delta_time.is_finite() {
        return None;
    }
    let micros = (delta_time * 1e6).round();
    if micros.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    (micros as i64).checked_add(ATLAS_EPOCH_UNIX_SECONDS * 1_000_000)
}

/// Convert an ATLAS `delta_time` (seconds since 2018-01-01) to a UTC datetime
pub fn delta_time_to_datetime(delta_time: f64) -> Option<DateTime<Utc>> {
    delta_time_to_micros(delta_time).and_then(DateTime::from_timestamp_micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_default_end() {
        let start = Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, None);
        assert_eq!(range.end, Utc.with_ymd_and_hms(2019, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(range.to_param(), "2019-03-01T00:00:00Z,2019-03-02T00:00:00Z");
    }

    #[test]
    fn test_time_range_explicit_end() {
        let start = Utc.with_ymd_and_hms(2019, 3, 1, 6, 30, 15).unwrap();
        let end = Utc.with_ymd_and_hms(2019, 4, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, Some(end));
        assert_eq!(range.to_param(), "2019-03-01T06:30:15Z,2019-04-01T00:00:00Z");
    }

    #[test]
    fn test_delta_time_epoch() {
        assert_eq!(
            delta_time_to_datetime(0.0),
            Some(Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            delta_time_to_datetime(86400.0),
            Some(Utc.with_ymd_and_hms(2018, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_delta_time_fraction_and_nan() {
        let dt = delta_time_to_datetime(1.25).unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 250);
        assert_eq!(delta_time_to_datetime(f64::NAN), None);
    }
}
