//
// models.rs
// Lab-Deidentify-rs
//
// Defines the lab record layout plus the serializable summaries returned by the CLI and the API.
//
// Thales Matheus Mendonça Santos - October 2026

use serde::{Deserialize, Serialize};

/// Column names of the lab export, in file order. Also used as the output header.
pub const COLUMNS: [&str; 18] = [
    "patient_record_id",
    "document_id",
    "first_name",
    "middle_name",
    "last_name",
    "id_type",
    "id_number",
    "location_code",
    "sample_location",
    "sample_type",
    "test_code",
    "test_name",
    "parameter_name",
    "service_type",
    "department",
    "sample_date",
    "result_date",
    "order_date",
];

/// One row of the lab export. Every field is kept as raw text so untouched
/// columns round-trip byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabRecord {
    pub patient_record_id: String,
    pub document_id: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub id_type: String,
    pub id_number: String,
    pub location_code: String,
    pub sample_location: String,
    pub sample_type: String,
    pub test_code: String,
    pub test_name: String,
    pub parameter_name: String,
    pub service_type: String,
    pub department: String,
    pub sample_date: String,
    pub result_date: String,
    pub order_date: String,
}

/// Entry counts of the three mapping tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingCounts {
    pub patient_ids: usize,
    pub document_ids: usize,
    pub locations: usize,
}

/// Quick overview of an input file, computed without writing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub records: usize,
    pub distinct_patients: usize,
    pub distinct_documents: usize,
    pub distinct_locations: usize,
}

/// Result of a finished deidentification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub records: usize,
    pub chunks: usize,
    pub mappings: MappingCounts,
}
