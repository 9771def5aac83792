//! JSON artifacts of a pipeline run

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::SignatureConfig;
use crate::error::Result;
use crate::pipeline::{FoldBatch, FoldOutcome, SignatureRun};

/// One fold's seeds, memberships, connectivity and filtered sets
#[derive(Serialize)]
struct FoldArtifact<'a> {
    fold: usize,
    fingerprint: String,
    config: &'a SignatureConfig,
    held_out: &'a [String],
    /// Column order of the connectivity vectors and membership matrices
    affinity_genes: &'a [String],
    #[serde(flatten)]
    outcome: &'a FoldOutcome,
}

/// Location of a fold artifact, keyed by fold index and configuration
pub fn fold_artifact_path<P: AsRef<Path>>(dir: P, fold: usize, config: &SignatureConfig) -> PathBuf {
    dir.as_ref()
        .join(format!("fold{}_{}.json", fold, config.fingerprint()))
}

fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Write one JSON file per fold into `dir` (created if needed)
pub fn write_fold_artifacts<P: AsRef<Path>>(
    dir: P,
    batch: &FoldBatch,
    config: &SignatureConfig,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(batch.folds.len());
    for report in &batch.folds {
        let path = fold_artifact_path(dir, report.fold, config);
        let artifact = FoldArtifact {
            fold: report.fold,
            fingerprint: config.fingerprint(),
            config,
            held_out: &report.held_out,
            affinity_genes: &batch.affinity_genes,
            outcome: &report.outcome,
        };
        write_json(&path, &artifact)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Write the complete run (configuration, every fold, both consolidations)
pub fn write_run_report<P: AsRef<Path>>(path: P, run: &SignatureRun) -> Result<()> {
    write_json(path, run)
}
