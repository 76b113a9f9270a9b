use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::anonymize::{DeidentifyOptions, Deidentifier};
use crate::dataset;
use crate::models::RunSummary;

pub const MAPPINGS_FILE_NAME: &str = "anonymization_mappings.json";

/// Export files under `dir`, in a stable order.
pub fn collect_inputs(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| {
                    ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("tsv")
                })
        })
        .collect();
    files.sort();
    files
}

/// Anonymizes every export under `dir` with one shared set of mapping tables,
/// so a patient seen in two files gets the same surrogate in both.
///
/// Outputs mirror the input tree under `output_dir`. Every input is read and
/// transformed before the first file is written, so a bad export leaves no
/// partial results behind.
pub fn process_directory(
    dir: &Path,
    output_dir: &Path,
    options: &DeidentifyOptions,
) -> Result<RunSummary> {
    println!("Processando diretório: {:?}", dir);

    let files = collect_inputs(dir);
    println!("Encontrados {} arquivos.", files.len());

    let targets = plan_targets(dir, output_dir, &files)?;

    let mut deidentifier = Deidentifier::new(options.salt.as_str());
    let mut outputs = Vec::with_capacity(files.len());
    let mut chunks = 0;

    // Location numbering depends on visit order, which is the sorted path order.
    for (path, target) in files.iter().zip(targets) {
        let input = dataset::read_records(path, options.encoding)
            .with_context(|| format!("Erro em {:?}", path))?;
        let (anonymized, used) = deidentifier.transform_all(&input, options.chunk_size)?;
        chunks += used;
        outputs.push((target, anonymized));
    }

    let mut records = 0;
    for (target, anonymized) in &outputs {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }
        dataset::write_records_to_path(target, anonymized)
            .with_context(|| format!("Failed to write {:?}", target))?;
        records += anonymized.len();
        println!("Sucesso: {:?}", target);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    let mappings_path = output_dir.join(MAPPINGS_FILE_NAME);
    deidentifier
        .mappings()
        .write_json(&mappings_path)
        .with_context(|| format!("Failed to write {:?}", mappings_path))?;

    Ok(RunSummary {
        records,
        chunks,
        mappings: deidentifier.mappings().counts(),
    })
}

/// One output path per input, rejecting any two inputs that would land on the
/// same file.
fn plan_targets(dir: &Path, output_dir: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    let mut targets = Vec::with_capacity(files.len());
    for path in files {
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let target = output_dir.join(anonymized_relative_path(relative));
        if let Some(other) = seen.insert(target.clone(), path) {
            bail!(
                "{:?} and {:?} would both be written to {:?}",
                other,
                path,
                target
            );
        }
        targets.push(target);
    }
    Ok(targets)
}

/// `site_a/export.txt` becomes `site_a/export_txt_anonymized.csv`.
fn anonymized_relative_path(relative: &Path) -> PathBuf {
    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    let name = match relative.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}_anonymized.csv", stem, ext),
        None => format!("{}_anonymized.csv", stem),
    };
    relative.with_file_name(name)
}
