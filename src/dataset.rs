//
// dataset.rs
// Lab-Deidentify-rs
//
// Reads the tab-separated lab export (legacy code page aware) and writes the anonymized CSV.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::error::{DeidentifyError, Result};
use crate::models::{DatasetInfo, LabRecord, COLUMNS};

/// Exports come out of the lab system as Windows-1252.
pub const DEFAULT_ENCODING: &str = "windows-1252";

/// Looks up a WHATWG encoding label such as `windows-1252`, `cp1252` or `utf-8`.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| DeidentifyError::UnknownEncoding(label.to_string()))
}

/// Parses headerless tab-separated text into records. Every row must have
/// exactly one value per column.
pub fn parse_records(text: &str) -> Result<Vec<LabRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.len() != COLUMNS.len() {
            return Err(DeidentifyError::ColumnCount {
                line: row.position().map_or(0, |p| p.line()),
                found: row.len(),
                expected: COLUMNS.len(),
            });
        }
        records.push(row.deserialize::<LabRecord>(None)?);
    }
    Ok(records)
}

/// Reads and decodes a whole export file.
pub fn read_records(path: &Path, encoding: &'static Encoding) -> Result<Vec<LabRecord>> {
    let bytes = fs::read(path)?;
    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        encoding = encoding.name(),
        "decoding input"
    );

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .ok_or_else(|| DeidentifyError::Encoding {
            encoding: encoding.name(),
            path: path.to_path_buf(),
        })?;

    let records = parse_records(&text)?;
    info!(path = %path.display(), records = records.len(), "input loaded");
    Ok(records)
}

/// Writes records as comma-separated UTF-8 with a header row. The header is
/// written even when there are no records.
pub fn write_records<W: Write>(writer: W, records: &[LabRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_records_to_path(path: &Path, records: &[LabRecord]) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    write_records(file, records)?;
    info!(path = %path.display(), records = records.len(), "anonymized data written");
    Ok(())
}

/// Counts records and distinct raw identifiers.
pub fn dataset_info(records: &[LabRecord]) -> DatasetInfo {
    let mut patients = HashSet::new();
    let mut documents = HashSet::new();
    let mut locations = HashSet::new();
    for record in records {
        patients.insert(record.patient_record_id.as_str());
        documents.insert(record.document_id.as_str());
        locations.insert(record.sample_location.as_str());
    }

    DatasetInfo {
        records: records.len(),
        distinct_patients: patients.len(),
        distinct_documents: documents.len(),
        distinct_locations: locations.len(),
    }
}
