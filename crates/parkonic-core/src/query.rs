use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Filter for [`TicketRepository::search`](crate::TicketRepository::search).
///
/// Every populated field narrows the result (filters are combined with AND).
/// The populated combinations line up with the table indexes: camera + entry
/// time, plate number + code, trip id, and zone name + region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketQuery {
    pub camera_id: Option<i32>,
    pub plate_number: Option<String>,
    pub plate_code: Option<String>,
    pub parkonic_trip_id: Option<i32>,
    pub zone_name: Option<String>,
    pub zone_region: Option<String>,
    pub status: Option<String>,
    /// Inclusive lower bound on `entry_time`.
    pub entered_from: Option<NaiveDateTime>,
    /// Inclusive upper bound on `entry_time`.
    pub entered_until: Option<NaiveDateTime>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TicketQuery {
    /// Tickets for a camera, optionally bounded by entry time.
    #[must_use]
    pub fn by_camera(
        camera_id: i32,
        entered_from: Option<NaiveDateTime>,
        entered_until: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            camera_id: Some(camera_id),
            entered_from,
            entered_until,
            ..Self::default()
        }
    }

    /// Tickets for a plate; `plate_code` narrows further when given.
    #[must_use]
    pub fn by_plate(plate_number: impl Into<String>, plate_code: Option<String>) -> Self {
        Self {
            plate_number: Some(plate_number.into()),
            plate_code,
            ..Self::default()
        }
    }

    /// Tickets linked to an external trip.
    #[must_use]
    pub fn by_trip(parkonic_trip_id: i32) -> Self {
        Self {
            parkonic_trip_id: Some(parkonic_trip_id),
            ..Self::default()
        }
    }

    /// Tickets in a zone; `zone_region` narrows further when given.
    #[must_use]
    pub fn by_zone(zone_name: impl Into<String>, zone_region: Option<String>) -> Self {
        Self {
            zone_name: Some(zone_name.into()),
            zone_region,
            ..Self::default()
        }
    }

    /// Restricts the number of rows returned.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when no filter is set.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.camera_id.is_none()
            && self.plate_number.is_none()
            && self.plate_code.is_none()
            && self.parkonic_trip_id.is_none()
            && self.zone_name.is_none()
            && self.zone_region.is_none()
            && self.status.is_none()
            && self.entered_from.is_none()
            && self.entered_until.is_none()
    }
}
