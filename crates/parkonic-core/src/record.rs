//! Lenient conversion of loosely typed input (CSV rows, form fields) into
//! [`TicketFields`].
//!
//! Blank values become `NULL`. Values that fail to parse also become `NULL`
//! and are reported back as [`CoercionWarning`]s so the caller can log them.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ticket::TicketFields;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 style local timestamp.
///
/// Accepts `T` or space as the separator, optional seconds and fractional
/// seconds, and a bare date (interpreted as midnight).
#[must_use]
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// A value that could not be coerced and was stored as `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoercionWarning {
    /// Column the value was destined for.
    pub column: &'static str,
    /// Raw input.
    pub value: String,
    /// Expected shape of the value.
    pub expected: &'static str,
}

/// An all-string ticket record keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TicketRecord {
    pub camera_id: Option<String>,
    pub zone_name: Option<String>,
    pub camera_ip: Option<String>,
    pub zone_region: Option<String>,
    pub spot_number: Option<String>,
    pub plate_number: Option<String>,
    pub plate_code: Option<String>,
    pub plate_city: Option<String>,
    pub confidence: Option<String>,
    pub entry_time: Option<String>,
    pub exit_time: Option<String>,
    pub status: Option<String>,
    pub parkonic_trip_id: Option<String>,
    pub image_base64: Option<String>,
    pub crop_image_path: Option<String>,
    pub entry_image_path: Option<String>,
    pub exit_image_path: Option<String>,
    pub exit_clip_path: Option<String>,
    pub process_time_in: Option<String>,
    pub process_time_out: Option<String>,
}

struct Coercer {
    warnings: Vec<CoercionWarning>,
}

impl Coercer {
    fn text(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    fn int(&mut self, column: &'static str, value: Option<String>) -> Option<i32> {
        let raw = Self::text(value)?;
        match raw.trim().parse::<i32>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.warnings.push(CoercionWarning {
                    column,
                    value: raw,
                    expected: "32-bit integer",
                });
                None
            }
        }
    }

    fn datetime(&mut self, column: &'static str, value: Option<String>) -> Option<NaiveDateTime> {
        let raw = Self::text(value)?;
        match parse_datetime(&raw) {
            Some(parsed) => Some(parsed),
            None => {
                self.warnings.push(CoercionWarning {
                    column,
                    value: raw,
                    expected: "ISO-8601 datetime",
                });
                None
            }
        }
    }
}

impl TicketRecord {
    /// Converts the record, collecting a warning for every dropped value.
    #[must_use]
    pub fn coerce(self) -> (TicketFields, Vec<CoercionWarning>) {
        let mut c = Coercer {
            warnings: Vec::new(),
        };
        let fields = TicketFields {
            camera_id: c.int("camera_id", self.camera_id),
            zone_name: Coercer::text(self.zone_name),
            camera_ip: Coercer::text(self.camera_ip),
            zone_region: Coercer::text(self.zone_region),
            spot_number: c.int("spot_number", self.spot_number),
            plate_number: Coercer::text(self.plate_number),
            plate_code: Coercer::text(self.plate_code),
            plate_city: Coercer::text(self.plate_city),
            confidence: c.int("confidence", self.confidence),
            entry_time: c.datetime("entry_time", self.entry_time),
            exit_time: c.datetime("exit_time", self.exit_time),
            status: Coercer::text(self.status),
            parkonic_trip_id: c.int("parkonic_trip_id", self.parkonic_trip_id),
            image_base64: Coercer::text(self.image_base64),
            crop_image_path: Coercer::text(self.crop_image_path),
            entry_image_path: Coercer::text(self.entry_image_path),
            exit_image_path: Coercer::text(self.exit_image_path),
            exit_clip_path: Coercer::text(self.exit_clip_path),
            process_time_in: c.datetime("process_time_in", self.process_time_in),
            process_time_out: c.datetime("process_time_out", self.process_time_out),
        };
        (fields, c.warnings)
    }
}
