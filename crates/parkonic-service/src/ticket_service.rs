//! Ticket ingestion, session deduplication and trip correlation.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use parkonic_core::{
    CoreError, CoreResult, Ticket, TicketFields, TicketId, TicketKind, TicketQuery, TicketRecord,
    TicketRepository,
};
use serde::Serialize;

use crate::config::IngestConfig;
use crate::metrics::{COERCION_WARNINGS_TOTAL, INGEST_TOTAL};

/// Upper bound applied to the configured match window.
const MAX_MATCH_WINDOW_SECS: u64 = 86_400;

/// What happened to one incoming ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum IngestOutcome {
    /// No stored session matched; a new row was created.
    Inserted { ticket: Ticket },
    /// A stored session matched and gained the listed columns.
    Merged {
        ticket: Ticket,
        filled: Vec<&'static str>,
    },
    /// A stored session matched and already held every incoming value.
    Duplicate { id: TicketId },
}

impl IngestOutcome {
    /// Metric label of the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Merged { .. } => "merged",
            Self::Duplicate { .. } => "duplicate",
        }
    }

    /// Identifier of the row the ticket ended up in.
    #[must_use]
    pub fn ticket_id(&self) -> TicketId {
        match self {
            Self::Inserted { ticket } | Self::Merged { ticket, .. } => ticket.id,
            Self::Duplicate { id } => *id,
        }
    }
}

/// A record of a batch that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    /// 1-based position of the record in the batch.
    pub record: usize,
    pub message: String,
}

/// Summary of a batch ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub table: &'static str,
    pub inserted: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted { .. } => self.inserted += 1,
            IngestOutcome::Merged { .. } => self.merged += 1,
            IngestOutcome::Duplicate { .. } => self.duplicates += 1,
        }
    }

    /// Number of records seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.merged + self.duplicates + self.failed
    }
}

/// Tickets of both tables that share a `parkonic_trip_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripCorrelation {
    pub parkonic_trip_id: i32,
    pub omc: Vec<Ticket>,
    pub ocr: Vec<Ticket>,
}

impl TripCorrelation {
    /// True when only one of the two pipelines reported the trip.
    #[must_use]
    pub fn is_one_sided(&self) -> bool {
        self.omc.is_empty() != self.ocr.is_empty()
    }
}

/// Service layer over the `omc_ticket` and `ocr_ticket` repositories.
pub struct TicketService {
    omc: Arc<dyn TicketRepository>,
    ocr: Arc<dyn TicketRepository>,
    settings: IngestConfig,
}

impl TicketService {
    /// Creates a service from one repository per table.
    pub fn new(
        omc: Arc<dyn TicketRepository>,
        ocr: Arc<dyn TicketRepository>,
        settings: IngestConfig,
    ) -> CoreResult<Self> {
        if omc.kind() != TicketKind::Omc || ocr.kind() != TicketKind::Ocr {
            return Err(CoreError::invalid_state(format!(
                "repositories wired to {} and {} instead of omc and ocr",
                omc.kind(),
                ocr.kind()
            )));
        }
        Ok(Self { omc, ocr, settings })
    }

    /// Repository backing the given table.
    #[must_use]
    pub fn repository(&self, kind: TicketKind) -> &Arc<dyn TicketRepository> {
        match kind {
            TicketKind::Omc => &self.omc,
            TicketKind::Ocr => &self.ocr,
        }
    }

    fn match_window(&self) -> Duration {
        let secs = self.settings.match_window_secs.min(MAX_MATCH_WINDOW_SECS);
        Duration::seconds(secs as i64)
    }

    /// Ingests one ticket into the table selected by `kind`.
    ///
    /// A ticket with a plate number and entry time is matched against stored
    /// sessions of the same table: equal plate number, plate code and camera
    /// (a missing value only matches a missing value) with an entry time
    /// inside the match window. On a match the stored row only gains the
    /// columns it was missing.
    pub async fn ingest(&self, kind: TicketKind, fields: TicketFields) -> CoreResult<IngestOutcome> {
        fields.validate()?;
        let repo = self.repository(kind);

        if fields.has_inverted_window() {
            tracing::warn!(
                table = kind.table_name(),
                plate = fields.plate_number.as_deref().unwrap_or_default(),
                "entry_time is later than exit_time"
            );
        }

        let outcome = match self.find_session(repo.as_ref(), &fields).await? {
            None => {
                let ticket = repo.create(&fields).await?;
                tracing::debug!(table = kind.table_name(), id = %ticket.id, "ticket inserted");
                IngestOutcome::Inserted { ticket }
            }
            Some(mut stored) => {
                let filled = stored.fields.fill_missing_from(&fields);
                if filled.is_empty() {
                    tracing::debug!(table = kind.table_name(), id = %stored.id, "duplicate ticket skipped");
                    IngestOutcome::Duplicate { id: stored.id }
                } else {
                    repo.update(&stored).await?;
                    tracing::debug!(
                        table = kind.table_name(),
                        id = %stored.id,
                        columns = ?filled,
                        "ticket merged into stored session"
                    );
                    if stored.fields.has_inverted_window() {
                        tracing::warn!(
                            table = kind.table_name(),
                            id = %stored.id,
                            "merged session has entry_time later than exit_time"
                        );
                    }
                    IngestOutcome::Merged {
                        ticket: stored,
                        filled,
                    }
                }
            }
        };

        INGEST_TOTAL
            .with_label_values(&[kind.table_name(), outcome.label()])
            .inc();
        Ok(outcome)
    }

    async fn find_session(
        &self,
        repo: &dyn TicketRepository,
        fields: &TicketFields,
    ) -> CoreResult<Option<Ticket>> {
        if !self.settings.dedup_enabled {
            return Ok(None);
        }
        let (Some(plate_number), Some(entry_time)) = (&fields.plate_number, fields.entry_time)
        else {
            return Ok(None);
        };

        let window = self.match_window();
        let query = TicketQuery {
            plate_number: Some(plate_number.clone()),
            plate_code: fields.plate_code.clone(),
            camera_id: fields.camera_id,
            entered_from: entry_time.checked_sub_signed(window),
            entered_until: entry_time.checked_add_signed(window),
            ..TicketQuery::default()
        };

        let candidates = repo.search(&query).await?;
        Ok(closest_session(candidates, fields, entry_time))
    }

    /// Ingests a batch sequentially so later records see earlier ones.
    ///
    /// Records that fail to parse or validate are counted and logged; they
    /// do not stop the batch. Store errors do.
    pub async fn ingest_batch<I>(&self, kind: TicketKind, records: I) -> CoreResult<IngestReport>
    where
        I: IntoIterator<Item = CoreResult<TicketFields>>,
    {
        let mut report = IngestReport {
            table: kind.table_name(),
            ..IngestReport::default()
        };

        for (index, record) in records.into_iter().enumerate() {
            let position = index + 1;
            let result = match record {
                Ok(fields) => self.ingest(kind, fields).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(outcome) => report.record(&outcome),
                Err(err @ (CoreError::ValidationError(_) | CoreError::DeserializationError(_))) => {
                    tracing::warn!(table = kind.table_name(), record = position, error = %err, "record rejected");
                    INGEST_TOTAL
                        .with_label_values(&[kind.table_name(), "failed"])
                        .inc();
                    report.failed += 1;
                    report.failures.push(IngestFailure {
                        record: position,
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            table = report.table,
            inserted = report.inserted,
            merged = report.merged,
            duplicates = report.duplicates,
            failed = report.failed,
            "ingest batch finished"
        );
        Ok(report)
    }

    /// Returns the tickets of both tables linked to an external trip.
    pub async fn correlate_trip(&self, parkonic_trip_id: i32) -> CoreResult<TripCorrelation> {
        let query = TicketQuery::by_trip(parkonic_trip_id);
        let correlation = TripCorrelation {
            parkonic_trip_id,
            omc: self.omc.search(&query).await?,
            ocr: self.ocr.search(&query).await?,
        };
        if correlation.is_one_sided() {
            tracing::debug!(parkonic_trip_id, "trip reported by a single pipeline");
        }
        Ok(correlation)
    }

    /// Inserts a sample ticket into each empty table.
    ///
    /// Returns how many tickets were inserted.
    pub async fn seed_samples(&self) -> CoreResult<usize> {
        let now = Utc::now().naive_utc();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let mut inserted = 0;

        for kind in TicketKind::ALL {
            let repo = self.repository(kind);
            if repo.count().await? > 0 {
                continue;
            }
            let ticket = repo.create(&sample_ticket(kind, now)).await?;
            tracing::info!(table = kind.table_name(), id = %ticket.id, "sample ticket inserted");
            inserted += 1;
        }
        Ok(inserted)
    }
}

/// Converts a loosely typed record, logging every dropped value.
pub fn coerce_record(record: TicketRecord, position: usize) -> TicketFields {
    let (fields, warnings) = record.coerce();
    for warning in warnings {
        tracing::warn!(
            record = position,
            column = warning.column,
            value = %warning.value,
            expected = warning.expected,
            "unparseable value stored as NULL"
        );
        COERCION_WARNINGS_TOTAL
            .with_label_values(&[warning.column])
            .inc();
    }
    fields
}

fn closest_session(
    candidates: Vec<Ticket>,
    fields: &TicketFields,
    entry_time: NaiveDateTime,
) -> Option<Ticket> {
    candidates
        .into_iter()
        .filter(|stored| {
            stored.fields.plate_code == fields.plate_code
                && stored.fields.camera_id == fields.camera_id
        })
        .filter_map(|stored| {
            let distance = (stored.fields.entry_time? - entry_time).num_seconds().abs();
            Some((distance, stored))
        })
        .min_by_key(|(distance, stored)| (*distance, stored.id))
        .map(|(_, stored)| stored)
}

fn sample_ticket(kind: TicketKind, now: NaiveDateTime) -> TicketFields {
    match kind {
        TicketKind::Ocr => TicketFields {
            camera_id: Some(101),
            zone_name: Some("A1".into()),
            camera_ip: Some("192.168.0.10".into()),
            zone_region: Some("North".into()),
            spot_number: Some(12),
            plate_number: Some("ABC123".into()),
            plate_code: Some("DXB".into()),
            plate_city: Some("Dubai".into()),
            confidence: Some(92),
            entry_time: Some(now),
            status: Some("open".into()),
            crop_image_path: Some("/tmp/crop.jpg".into()),
            ..TicketFields::default()
        },
        TicketKind::Omc => TicketFields {
            camera_id: Some(201),
            zone_name: Some("B2".into()),
            camera_ip: Some("192.168.0.11".into()),
            zone_region: Some("South".into()),
            spot_number: Some(5),
            plate_number: Some("XYZ789".into()),
            plate_code: Some("AUH".into()),
            plate_city: Some("Abu Dhabi".into()),
            confidence: Some(87),
            entry_time: Some(now),
            status: Some("pending".into()),
            entry_image_path: Some("/tmp/entry.jpg".into()),
            ..TicketFields::default()
        },
    }
}
