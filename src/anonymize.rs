//
// anonymize.rs
// Lab-Deidentify-rs
//
// The row transform: identifiers become salted surrogates backed by mapping tables, names become buckets, the rest passes through.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::dataset;
use crate::error::{DeidentifyError, Result};
use crate::mapping::Mappings;
use crate::models::{LabRecord, RunSummary};
use crate::surrogate::{hashed_id, name_bucket};

pub const DEFAULT_SALT: &str = "your_secret_salt";
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

const FIRST_NAME_BUCKETS: u64 = 1000;
const MIDDLE_NAME_BUCKETS: u64 = 500;
const LAST_NAME_BUCKETS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct DeidentifyOptions {
    pub salt: String,
    pub chunk_size: usize,
    pub encoding: &'static Encoding,
}

impl Default for DeidentifyOptions {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }
}

/// Owns the mapping tables for one run. Every record passed through the same
/// instance shares them, which keeps surrogates consistent across chunks and
/// across files.
#[derive(Debug, Clone)]
pub struct Deidentifier {
    salt: String,
    mappings: Mappings,
}

impl Deidentifier {
    pub fn new(salt: impl Into<String>) -> Self {
        Self::with_mappings(salt, Mappings::new())
    }

    pub fn with_mappings(salt: impl Into<String>, mappings: Mappings) -> Self {
        Self {
            salt: salt.into(),
            mappings,
        }
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn into_mappings(self) -> Mappings {
        self.mappings
    }

    /// Returns the anonymized copy of `record`.
    pub fn transform(&mut self, record: &LabRecord) -> LabRecord {
        let salt = self.salt.as_str();

        let patient_record_id = self
            .mappings
            .patient_ids
            .get_or_insert_with(&record.patient_record_id, |_| {
                hashed_id("PT", &record.patient_record_id, salt)
            })
            .to_string();
        let document_id = self
            .mappings
            .document_ids
            .get_or_insert_with(&record.document_id, |_| {
                hashed_id("DOC", &record.document_id, salt)
            })
            .to_string();
        let sample_location = self
            .mappings
            .locations
            .get_or_insert_with(&record.sample_location, |seen| {
                format!("LOCATION{}", seen + 1)
            })
            .to_string();

        LabRecord {
            patient_record_id,
            document_id,
            first_name: name_bucket("FIRSTNAME", &record.first_name, FIRST_NAME_BUCKETS),
            middle_name: name_bucket("MIDDLENAME", &record.middle_name, MIDDLE_NAME_BUCKETS),
            last_name: name_bucket("LASTNAME", &record.last_name, LAST_NAME_BUCKETS),
            // No table: the salted hash alone keeps repeated values consistent.
            id_number: hashed_id("ID", &record.id_number, salt),
            sample_location,
            ..record.clone()
        }
    }

    pub fn transform_chunk(&mut self, chunk: &[LabRecord]) -> Vec<LabRecord> {
        chunk.iter().map(|record| self.transform(record)).collect()
    }

    /// Transforms `records` in order. Inputs larger than `chunk_size` are
    /// handled in sequential slices; the result is the same either way.
    /// Returns the records and the number of chunks used.
    pub fn transform_all(
        &mut self,
        records: &[LabRecord],
        chunk_size: usize,
    ) -> Result<(Vec<LabRecord>, usize)> {
        if chunk_size == 0 {
            return Err(DeidentifyError::InvalidChunkSize);
        }
        if records.len() <= chunk_size {
            return Ok((self.transform_chunk(records), 1));
        }

        let mut output = Vec::with_capacity(records.len());
        let mut chunks = 0;
        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            output.extend(self.transform_chunk(chunk));
            chunks += 1;
            debug!(chunk = index + 1, rows = chunk.len(), "chunk processed");
        }
        Ok((output, chunks))
    }
}

/// Pure form of a run: state goes in, transformed records and updated state
/// come out.
pub fn deidentify_records(
    records: &[LabRecord],
    mappings: Mappings,
    salt: &str,
    chunk_size: usize,
) -> Result<(Vec<LabRecord>, Mappings)> {
    let mut deidentifier = Deidentifier::with_mappings(salt, mappings);
    let (output, _) = deidentifier.transform_all(records, chunk_size)?;
    Ok((output, deidentifier.into_mappings()))
}

/// Reads `input`, writes the anonymized CSV to `output` and the mapping
/// tables to `mappings_path`.
pub fn process_file(
    input: &Path,
    output: &Path,
    mappings_path: &Path,
    options: &DeidentifyOptions,
) -> Result<RunSummary> {
    let records = dataset::read_records(input, options.encoding)?;

    let mut deidentifier = Deidentifier::new(options.salt.as_str());
    let (anonymized, chunks) = deidentifier.transform_all(&records, options.chunk_size)?;

    dataset::write_records_to_path(output, &anonymized)?;
    deidentifier.mappings().write_json(mappings_path)?;

    let summary = RunSummary {
        records: anonymized.len(),
        chunks,
        mappings: deidentifier.mappings().counts(),
    };
    info!(
        records = summary.records,
        chunks = summary.chunks,
        patients = summary.mappings.patient_ids,
        documents = summary.mappings.document_ids,
        locations = summary.mappings.locations,
        "anonymization complete"
    );
    Ok(summary)
}
