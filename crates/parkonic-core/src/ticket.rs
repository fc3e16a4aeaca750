use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Maximum character widths of the `varchar` columns.
pub mod widths {
    pub const ZONE_NAME: usize = 50;
    pub const CAMERA_IP: usize = 45;
    pub const ZONE_REGION: usize = 50;
    pub const PLATE_NUMBER: usize = 20;
    pub const PLATE_CODE: usize = 10;
    pub const PLATE_CITY: usize = 50;
    pub const STATUS: usize = 20;
    pub const PATH: usize = 255;
}

/// Which of the two ticket tables a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    /// Sessions observed via the camera/operator pipeline (`omc_ticket`).
    Omc,
    /// Sessions produced by the automated OCR pipeline (`ocr_ticket`).
    Ocr,
}

impl TicketKind {
    /// Both kinds, in dump order.
    pub const ALL: [TicketKind; 2] = [TicketKind::Omc, TicketKind::Ocr];

    /// Returns the backing table name.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Omc => "omc_ticket",
            Self::Ocr => "ocr_ticket",
        }
    }

    /// Returns the short lowercase identifier used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Omc => "omc",
            Self::Ocr => "ocr",
        }
    }

    /// Returns the display label (`"OMC"` / `"OCR"`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Omc => "OMC",
            Self::Ocr => "OCR",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omc" | "omc_ticket" => Ok(Self::Omc),
            "ocr" | "ocr_ticket" => Ok(Self::Ocr),
            other => Err(CoreError::validation(format!(
                "unknown ticket type `{other}` (expected `omc` or `ocr`)"
            ))),
        }
    }
}

/// Auto-increment primary key of a ticket row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u32);

impl TicketId {
    /// Wraps a raw row id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u32> for TicketId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Every column of a ticket row except `id` and `created_at`.
///
/// Used both as the insert payload and as the mutable part of a stored
/// [`Ticket`]. All columns are nullable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFields {
    pub camera_id: Option<i32>,
    pub zone_name: Option<String>,
    pub camera_ip: Option<String>,
    pub zone_region: Option<String>,
    pub spot_number: Option<i32>,
    pub plate_number: Option<String>,
    pub plate_code: Option<String>,
    pub plate_city: Option<String>,
    pub confidence: Option<i32>,
    pub entry_time: Option<NaiveDateTime>,
    pub exit_time: Option<NaiveDateTime>,
    pub status: Option<String>,
    pub parkonic_trip_id: Option<i32>,
    pub image_base64: Option<String>,
    pub crop_image_path: Option<String>,
    pub entry_image_path: Option<String>,
    pub exit_image_path: Option<String>,
    pub exit_clip_path: Option<String>,
    pub process_time_in: Option<NaiveDateTime>,
    pub process_time_out: Option<NaiveDateTime>,
}

macro_rules! fill_missing {
    ($target:expr, $source:expr, $filled:ident; $($field:ident),+ $(,)?) => {
        $(
            if $target.$field.is_none() && $source.$field.is_some() {
                $target.$field = $source.$field.clone();
                $filled.push(stringify!($field));
            }
        )+
    };
}

impl TicketFields {
    /// Checks every string column against its `varchar` width.
    ///
    /// Widths are counted in characters, matching `utf8mb4` columns. An
    /// entry time later than the exit time is accepted.
    pub fn validate(&self) -> CoreResult<()> {
        let checks: [(&str, &Option<String>, usize); 11] = [
            ("zone_name", &self.zone_name, widths::ZONE_NAME),
            ("camera_ip", &self.camera_ip, widths::CAMERA_IP),
            ("zone_region", &self.zone_region, widths::ZONE_REGION),
            ("plate_number", &self.plate_number, widths::PLATE_NUMBER),
            ("plate_code", &self.plate_code, widths::PLATE_CODE),
            ("plate_city", &self.plate_city, widths::PLATE_CITY),
            ("status", &self.status, widths::STATUS),
            ("crop_image_path", &self.crop_image_path, widths::PATH),
            ("entry_image_path", &self.entry_image_path, widths::PATH),
            ("exit_image_path", &self.exit_image_path, widths::PATH),
            ("exit_clip_path", &self.exit_clip_path, widths::PATH),
        ];

        for (column, value, max) in checks {
            if let Some(value) = value {
                let len = value.chars().count();
                if len > max {
                    return Err(CoreError::validation(format!(
                        "{column} is {len} characters long (max {max})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// True when both timestamps are present and the entry is after the exit.
    #[must_use]
    pub fn has_inverted_window(&self) -> bool {
        matches!((self.entry_time, self.exit_time), (Some(entry), Some(exit)) if entry > exit)
    }

    /// Copies every column that is unset here but set in `other`.
    ///
    /// Returns the names of the columns that were filled. Values already
    /// present are never overwritten.
    pub fn fill_missing_from(&mut self, other: &TicketFields) -> Vec<&'static str> {
        let mut filled = Vec::new();
        fill_missing!(self, other, filled;
            camera_id,
            zone_name,
            camera_ip,
            zone_region,
            spot_number,
            plate_number,
            plate_code,
            plate_city,
            confidence,
            entry_time,
            exit_time,
            status,
            parkonic_trip_id,
            image_base64,
            crop_image_path,
            entry_image_path,
            exit_image_path,
            exit_clip_path,
            process_time_in,
            process_time_out,
        );
        filled
    }
}

/// A stored ticket row.
///
/// Serializes to a single flat JSON object keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Auto-generated primary key.
    pub id: TicketId,
    /// Column values.
    #[serde(flatten)]
    pub fields: TicketFields,
    /// Server-assigned insertion timestamp.
    pub created_at: NaiveDateTime,
}
