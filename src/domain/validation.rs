//! Standalone input validators.
//!
//! Each validator takes loosely typed request input and returns either a
//! normalized value or a single [`ValidationError`]. The exception is
//! [`validate_pagination`], which clamps instead of rejecting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use validator::Validate;

use super::error::ValidationError;
use super::types::{
    AgentRequest, BoundingBox, Coordinates, DEFAULT_LIMIT, DateRange, MAX_DATE_RANGE_DAYS,
    MAX_LIMIT, Pagination,
};

lazy_static! {
    /// `urn:<namespace>:<Type>:<localId>`
    static ref ENTITY_ID_REGEX: Regex =
        Regex::new(r"^urn:[A-Za-z0-9][A-Za-z0-9-]*:[A-Za-z][A-Za-z0-9]*:[A-Za-z0-9_-]+$").unwrap();

    /// Agent names as routed by the agent service.
    static ref AGENT_NAME_REGEX: Regex = Regex::new(r"^[a-z][a-z0-9-]{0,63}$").unwrap();
}

fn parse_number(raw: &str, field: &'static str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(ValidationError::InvalidFormat {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parses and range-checks a latitude/longitude pair.
pub fn validate_coordinates(lat: &str, lon: &str) -> Result<Coordinates, ValidationError> {
    let lat = parse_number(lat, "latitude")?;
    let lon = parse_number(lon, "longitude")?;
    Coordinates::new(lat, lon)
}

/// Returns true when `id` has the shape `urn:<namespace>:<Type>:<localId>`.
pub fn is_valid_entity_id(id: &str) -> bool {
    ENTITY_ID_REGEX.is_match(id)
}

/// [`is_valid_entity_id`] as a `Result`, for use with `?`.
pub fn validate_entity_id(id: &str) -> Result<&str, ValidationError> {
    if is_valid_entity_id(id) {
        Ok(id)
    } else {
        Err(ValidationError::InvalidEntityId(id.to_string()))
    }
}

/// Integer value of a query parameter. Fractions truncate toward zero.
fn parse_integral(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        // `as` saturates at the i64 bounds.
        Ok(value) if value.is_finite() => Some(value.trunc() as i64),
        _ => None,
    }
}

/// Clamps `limit` into `[1, MAX_LIMIT]` and `offset` to `>= 0`. Never fails.
pub fn validate_pagination(limit: Option<&str>, offset: Option<&str>) -> Pagination {
    let limit = limit
        .and_then(parse_integral)
        .map_or(DEFAULT_LIMIT, |value| {
            value.clamp(1, i64::from(MAX_LIMIT)) as u32
        });
    let offset = offset
        .and_then(parse_integral)
        .map_or(0, |value| value.max(0) as u64);

    Pagination { limit, offset }
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (UTC) and `YYYY-MM-DD` (midnight UTC).
fn parse_instant(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}

/// Parses a `[from, to]` window no wider than [`MAX_DATE_RANGE_DAYS`].
pub fn validate_date_range(from: &str, to: &str) -> Result<DateRange, ValidationError> {
    let start = parse_instant(from)?;
    let end = parse_instant(to)?;

    if start > end {
        return Err(ValidationError::InvertedRange);
    }
    if end - start > TimeDelta::days(MAX_DATE_RANGE_DAYS) {
        return Err(ValidationError::RangeTooWide {
            max_days: MAX_DATE_RANGE_DAYS,
        });
    }

    Ok(DateRange { start, end })
}

/// Parses `"minLat,minLon,maxLat,maxLon"`.
pub fn validate_bbox(raw: &str) -> Result<BoundingBox, ValidationError> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<f64>>>()
        .ok_or(ValidationError::MalformedBBox)?;

    let [min_lat, min_lon, max_lat, max_lon] = parts[..] else {
        return Err(ValidationError::MalformedBBox);
    };

    if min_lat >= max_lat || min_lon >= max_lon {
        return Err(ValidationError::InvalidBounds);
    }

    Ok(BoundingBox {
        min_lat,
        min_lon,
        max_lat,
        max_lon,
    })
}

pub fn is_valid_agent_name(name: &str) -> bool {
    AGENT_NAME_REGEX.is_match(name)
}

/// Checks an agent request body, collecting every violation.
///
/// Messages are sorted so responses are stable across runs.
pub fn validate_agent_request(request: &AgentRequest) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(report) = request.validate() {
        for (field, field_errors) in report.field_errors() {
            for err in field_errors {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| format!("{field} is invalid"), ToString::to_string);
                errors.push(message);
            }
        }
    }
    if !request.query.is_empty() && request.query.trim().is_empty() {
        errors.push("query must not be blank".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort();
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_valid() {
        let point = validate_coordinates("10.7769", "106.7009").unwrap();
        assert_eq!(point, Coordinates { lat: 10.7769, lon: 106.7009 });
    }

    #[test]
    fn test_coordinates_boundaries_inclusive() {
        assert!(validate_coordinates("90", "180").is_ok());
        assert!(validate_coordinates("-90", "-180").is_ok());
    }

    #[test]
    fn test_latitude_outside_range_always_fails() {
        for lat in ["90.0001", "-90.0001", "91", "-1000", "1e9", "inf", "-inf"] {
            let err = validate_coordinates(lat, "0").unwrap_err();
            assert!(
                matches!(err, ValidationError::OutOfRange { field: "latitude", .. }),
                "{lat} should be out of range"
            );
        }
    }

    #[test]
    fn test_latitude_inside_range_returned_unchanged() {
        let mut lat = -90.0_f64;
        while lat <= 90.0 {
            let point = validate_coordinates(&lat.to_string(), "0").unwrap();
            assert_eq!(point.lat, lat);
            lat += 7.25;
        }
    }

    #[test]
    fn test_longitude_out_of_range() {
        let err = validate_coordinates("0", "180.5").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange {
                field: "longitude",
                ..
            }
        ));
    }

    #[test]
    fn test_coordinates_invalid_format() {
        assert!(matches!(
            validate_coordinates("abc", "0"),
            Err(ValidationError::InvalidFormat {
                field: "latitude",
                ..
            })
        ));
        assert!(matches!(
            validate_coordinates("0", ""),
            Err(ValidationError::InvalidFormat {
                field: "longitude",
                ..
            })
        ));
        assert!(matches!(
            validate_coordinates("NaN", "0"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_entity_id_accepts_urns() {
        assert!(is_valid_entity_id("urn:ngsi-ld:TrafficFlowObserved:camera-01"));
        assert!(is_valid_entity_id("urn:ngsi-ld:RoadAccident:acc_2024_001"));
        assert!(is_valid_entity_id("urn:city:WeatherObserved:X1"));
    }

    #[test]
    fn test_entity_id_rejects_malformed() {
        assert!(!is_valid_entity_id(""));
        assert!(!is_valid_entity_id("camera-01"));
        assert!(!is_valid_entity_id("urn:ngsi-ld:TrafficFlowObserved"));
        assert!(!is_valid_entity_id("urn:ngsi-ld:1Traffic:camera-01"));
        assert!(!is_valid_entity_id("urn:ngsi-ld:Traffic:camera 01"));
        assert!(!is_valid_entity_id("urn:ngsi-ld:Traffic:cam/../01"));
        assert!(!is_valid_entity_id("URN:ngsi-ld:Traffic:cam"));
    }

    #[test]
    fn test_validate_entity_id_result() {
        assert_eq!(
            validate_entity_id("urn:ngsi-ld:RoadAccident:a1"),
            Ok("urn:ngsi-ld:RoadAccident:a1")
        );
        assert_eq!(
            validate_entity_id("nope"),
            Err(ValidationError::InvalidEntityId("nope".to_string()))
        );
    }

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(validate_pagination(None, None), Pagination::default());
        assert_eq!(
            validate_pagination(Some("abc"), Some("xyz")),
            Pagination {
                limit: DEFAULT_LIMIT,
                offset: 0
            }
        );
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(validate_pagination(Some("0"), None).limit, 1);
        assert_eq!(validate_pagination(Some("-5"), None).limit, 1);
        assert_eq!(validate_pagination(Some("5000"), None).limit, MAX_LIMIT);
        assert_eq!(validate_pagination(Some("25"), Some("-10")).offset, 0);
        assert_eq!(validate_pagination(Some("25.9"), Some("40.2")), Pagination {
            limit: 25,
            offset: 40
        });
    }

    #[test]
    fn test_pagination_always_within_bounds() {
        // (raw value, expected offset)
        let cases = [
            (None, 0),
            (Some(""), 0),
            (Some(" "), 0),
            (Some("-1"), 0),
            (Some("0"), 0),
            (Some("1"), 1),
            (Some("999"), 999),
            (Some("1000"), 1000),
            (Some("1001"), 1001),
            (Some("9223372036854775807"), i64::MAX as u64),
            (Some("-9223372036854775808"), 0),
            (Some("1e308"), i64::MAX as u64),
            (Some("-1e308"), 0),
            (Some("NaN"), 0),
            (Some("inf"), 0),
            (Some("12abc"), 0),
        ];
        for (limit, _) in cases {
            for (offset, expected_offset) in cases {
                let page = validate_pagination(limit, offset);
                assert!((1..=MAX_LIMIT).contains(&page.limit), "{limit:?}");
                assert_eq!(page.offset, expected_offset, "{offset:?}");
            }
        }
    }

    #[test]
    fn test_date_range_valid() {
        let range = validate_date_range("2024-01-01", "2024-01-31T12:00:00Z").unwrap();
        assert_eq!(range.start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2024-01-31T12:00:00+00:00");
    }

    #[test]
    fn test_date_range_accepts_offsets_and_naive() {
        let range =
            validate_date_range("2024-03-01T07:00:00+07:00", "2024-03-01T10:30:00").unwrap();
        assert_eq!(range.start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_date_range_invalid_date() {
        assert_eq!(
            validate_date_range("yesterday", "2024-01-01"),
            Err(ValidationError::InvalidDate("yesterday".to_string()))
        );
        assert_eq!(
            validate_date_range("2024-01-01", "2024-02-30"),
            Err(ValidationError::InvalidDate("2024-02-30".to_string()))
        );
    }

    #[test]
    fn test_date_range_inverted() {
        assert_eq!(
            validate_date_range("2024-02-01", "2024-01-01"),
            Err(ValidationError::InvertedRange)
        );
    }

    #[test]
    fn test_date_range_exactly_max_days_allowed() {
        assert!(validate_date_range("2024-01-01", "2024-03-31").is_ok());
        assert_eq!(
            validate_date_range("2024-01-01", "2024-03-31T00:00:01Z"),
            Err(ValidationError::RangeTooWide {
                max_days: MAX_DATE_RANGE_DAYS
            })
        );
    }

    #[test]
    fn test_date_range_too_wide_independent_of_dates() {
        for (from, to) in [
            ("1999-12-01", "2000-03-15"),
            ("2024-06-01", "2024-12-01"),
            ("2030-01-01T00:00:00Z", "2031-01-01T00:00:00Z"),
            ("1970-01-01", "2024-01-01"),
        ] {
            assert_eq!(
                validate_date_range(from, to),
                Err(ValidationError::RangeTooWide { max_days: 90 }),
                "{from}..{to}"
            );
        }
    }

    #[test]
    fn test_bbox_valid_returned_unchanged() {
        let bbox = validate_bbox("5,20,10,25").unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                min_lat: 5.0,
                min_lon: 20.0,
                max_lat: 10.0,
                max_lon: 25.0,
            }
        );
    }

    #[test]
    fn test_bbox_inverted_latitude() {
        assert_eq!(
            validate_bbox("10,20,5,25"),
            Err(ValidationError::InvalidBounds)
        );
    }

    #[test]
    fn test_bbox_degenerate_bounds() {
        assert_eq!(validate_bbox("5,20,5,25"), Err(ValidationError::InvalidBounds));
        assert_eq!(validate_bbox("5,25,10,25"), Err(ValidationError::InvalidBounds));
    }

    #[test]
    fn test_bbox_malformed() {
        for raw in ["", "1,2,3", "1,2,3,4,5", "a,b,c,d", "1,2,,4", "1,2,3,inf"] {
            assert_eq!(
                validate_bbox(raw),
                Err(ValidationError::MalformedBBox),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_bbox_tolerates_whitespace() {
        assert!(validate_bbox(" 10.7 , 106.6 , 10.8 , 106.8 ").is_ok());
    }

    #[test]
    fn test_agent_name() {
        assert!(is_valid_agent_name("traffic-analyst"));
        assert!(!is_valid_agent_name("Traffic"));
        assert!(!is_valid_agent_name("../etc"));
        assert!(!is_valid_agent_name(""));
    }

    #[test]
    fn test_agent_request_collects_all_errors() {
        let mut request = AgentRequest::new("");
        request.session_id = Some("s".repeat(200));
        let errors = validate_agent_request(&request).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_agent_request_blank_query() {
        let errors = validate_agent_request(&AgentRequest::new("   ")).unwrap_err();
        assert_eq!(errors, vec!["query must not be blank".to_string()]);
    }

    #[test]
    fn test_agent_request_ok() {
        assert!(validate_agent_request(&AgentRequest::new("Which roads are congested?")).is_ok());
    }
}
