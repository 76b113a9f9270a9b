//
// mapping.rs
// Lab-Deidentify-rs
//
// Raw-value to surrogate lookup tables and the JSON side file they are persisted to.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::models::MappingCounts;

/// Insertion-ordered map from a raw value to its surrogate. Once assigned, a
/// surrogate is never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    index: HashMap<String, usize>,
    entries: Vec<(String, String)>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the surrogate for `raw`, creating it with `make` on first sight.
    /// `make` receives the number of entries already in the table.
    pub fn get_or_insert_with<F>(&mut self, raw: &str, make: F) -> &str
    where
        F: FnOnce(usize) -> String,
    {
        let slot = match self.index.get(raw).copied() {
            Some(slot) => slot,
            None => {
                let slot = self.entries.len();
                let surrogate = make(slot);
                self.index.insert(raw.to_string(), slot);
                self.entries.push((raw.to_string(), surrogate));
                slot
            }
        };
        &self.entries[slot].1
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.index.get(raw).map(|&slot| self.entries[slot].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(raw, surrogate)` pairs in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn push_loaded(&mut self, raw: String, surrogate: String) {
        if self.index.contains_key(&raw) {
            return;
        }
        self.index.insert(raw.clone(), self.entries.len());
        self.entries.push((raw, surrogate));
    }
}

impl Serialize for MappingTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (raw, surrogate) in &self.entries {
            map.serialize_entry(raw, surrogate)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MappingTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = MappingTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of raw values to surrogate strings")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<MappingTable, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = MappingTable::new();
                while let Some((raw, surrogate)) = access.next_entry::<String, String>()? {
                    table.push_loaded(raw, surrogate);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// The three tables persisted at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    pub patient_ids: MappingTable,
    pub document_ids: MappingTable,
    pub locations: MappingTable,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> MappingCounts {
        MappingCounts {
            patient_ids: self.patient_ids.len(),
            document_ids: self.document_ids.len(),
            locations: self.locations.len(),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a mapping file for inspection.
    pub fn read_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
