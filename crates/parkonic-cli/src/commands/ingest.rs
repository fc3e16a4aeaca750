//! Batch ingestion from CSV and JSON Lines files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use clap::ValueEnum;
use parkonic_core::{CoreError, CoreResult, TicketFields, TicketKind, TicketRecord};
use parkonic_service::{coerce_record, metrics};

use super::{fields_from_json, print_json, Context};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Header row of column names, one ticket per row
    Csv,
    /// One JSON object per line keyed by column name
    Jsonl,
}

pub async fn run(
    ctx: &Context,
    kind: TicketKind,
    file: &Path,
    format: Option<InputFormat>,
    print_metrics: bool,
) -> Result<()> {
    if !file.exists() {
        return Err(anyhow!("file not found: {}", file.display()));
    }

    let format = format.unwrap_or_else(|| detect_format(file));
    tracing::info!(table = kind.table_name(), file = %file.display(), ?format, "starting ingest");

    let records = match format {
        InputFormat::Csv => read_csv(file)?,
        InputFormat::Jsonl => read_jsonl(file)?,
    };

    let service = ctx.service().await?;
    let report = service
        .ingest_batch(kind, records)
        .await
        .with_context(|| format!("ingest into {} failed", kind.table_name()))?;

    print_json(&report)?;
    if print_metrics {
        eprint!("{}", metrics::gather());
    }
    Ok(())
}

/// Detect file format from extension
pub fn detect_format(path: &Path) -> InputFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => InputFormat::Csv,
        Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
            InputFormat::Jsonl
        }
        _ => {
            tracing::warn!(file = %path.display(), "could not detect format from extension, assuming CSV");
            InputFormat::Csv
        }
    }
}

/// Reads CSV rows as loosely typed records.
///
/// Unknown columns are ignored and missing ones stay `NULL`. Rows that do not
/// parse at all are kept as errors so the batch report can count them.
pub fn read_csv(path: &Path) -> Result<Vec<CoreResult<TicketFields>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let records = reader
        .deserialize::<TicketRecord>()
        .enumerate()
        .map(|(index, row)| {
            let position = index + 1;
            row.map(|record| coerce_record(record, position))
                .map_err(|err| CoreError::DeserializationError(format!("row {position}: {err}")))
        })
        .collect();
    Ok(records)
}

/// Reads JSON Lines objects with the same lenient coercion as CSV rows.
///
/// Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<CoreResult<TicketFields>>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let position = line_num + 1;
        records.push(fields_from_json(&line, position).map_err(|err| {
            CoreError::DeserializationError(format!("line {position}: {err}"))
        }));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkonic_service::Config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("tickets.csv")), InputFormat::Csv);
        assert_eq!(detect_format(Path::new("tickets.JSONL")), InputFormat::Jsonl);
        assert_eq!(detect_format(Path::new("tickets.json")), InputFormat::Jsonl);
        assert_eq!(detect_format(Path::new("tickets")), InputFormat::Csv);
    }

    #[test]
    fn test_read_csv_coerces_loose_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "plate_number,plate_code,camera_id,entry_time,lane\n\
             ABC123,DXB,101,2024-05-01 08:00:00,left\n\
             XYZ789,,cam-2,2024-05-01T09:15,right"
        )
        .unwrap();

        let records = read_csv(temp_file.path()).unwrap();
        assert_eq!(records.len(), 2);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.plate_number.as_deref(), Some("ABC123"));
        assert_eq!(first.camera_id, Some(101));
        assert!(first.entry_time.is_some());

        let second = records[1].as_ref().unwrap();
        assert_eq!(second.plate_code, None);
        assert_eq!(second.camera_id, None);
        assert!(second.entry_time.is_some());
    }

    #[test]
    fn test_read_csv_keeps_broken_rows_as_errors() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "plate_number,plate_code\n\
             ABC123,DXB\n\
             XYZ789,AUH,extra"
        )
        .unwrap();

        let records = read_csv(temp_file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(
            records[1],
            Err(CoreError::DeserializationError(ref message)) if message.starts_with("row 2")
        ));
    }

    #[test]
    fn test_read_jsonl_skips_blank_lines() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "{{\"plate_number\": \"ABC123\", \"camera_id\": 101, \"entry_time\": \"2024-05-01T08:00:00\"}}\n\
             \n\
             plate_number=12"
        )
        .unwrap();

        let records = read_jsonl(temp_file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().camera_id, Some(101));
        assert!(matches!(
            records[1],
            Err(CoreError::DeserializationError(ref message)) if message.starts_with("line 3")
        ));
    }

    #[test]
    fn test_read_jsonl_accepts_loose_datetimes_and_numeric_strings() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "{{\"plate_number\": \"A1\", \"entry_time\": \"2024-05-01 08:00:00\"}}\n\
             {{\"plate_number\": \"A2\", \"entry_time\": \"2024-05-01T08:00\"}}\n\
             {{\"plate_number\": \"A3\", \"entry_time\": \"2024-05-01\"}}\n\
             {{\"plate_number\": \"A4\", \"camera_id\": \"101\"}}"
        )
        .unwrap();

        let records = read_jsonl(temp_file.path()).unwrap();
        assert_eq!(records.len(), 4);
        let fields: Vec<&TicketFields> = records.iter().map(|r| r.as_ref().unwrap()).collect();
        assert!(fields[0].entry_time.is_some());
        assert!(fields[1].entry_time.is_some());
        assert!(fields[2].entry_time.is_some());
        assert_eq!(fields[3].camera_id, Some(101));
    }

    #[tokio::test]
    async fn test_jsonl_file_ingests_into_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.url = format!("sqlite://{}", dir.path().join("tickets.db").display());
        let ctx = Context::new(config);

        let input = dir.path().join("ocr.jsonl");
        std::fs::write(
            &input,
            "{\"plate_number\": \"ABC123\", \"plate_code\": \"DXB\", \"camera_id\": 101, \"entry_time\": \"2024-05-01 08:00:00\"}\n\
             {\"plate_number\": \"ABC123\", \"plate_code\": \"DXB\", \"camera_id\": \"101\", \"entry_time\": \"2024-05-01T08:01\", \"exit_time\": \"2024-05-01 09:00\"}\n\
             {\"plate_number\": \"ABC123\", \"plate_code\": \"DXB\", \"camera_id\": 101, \"entry_time\": \"2024-05-01 08:00:30\"}\n\
             not json\n\
             {\"plate_number\": \"XYZ789\", \"entry_time\": \"2024-05-01\"}\n",
        )
        .unwrap();

        let records = read_jsonl(&input).unwrap();
        let service = ctx.service().await.unwrap();
        let report = service.ingest_batch(TicketKind::Ocr, records).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.merged, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].record, 4);
        assert_eq!(
            service.repository(TicketKind::Ocr).count().await.unwrap(),
            2
        );
    }
}
