//! Persisted training artifacts
//!
//! A training run writes:
//! - the fitted model together with its feature definitions
//! - the ordered training column list
//! - a training report and the held-out actual-vs-predicted pairs
//! - a manifest with SHA256 checksums, verified again on load

use crate::error::{Result, YieldError};
use crate::features::{FeatureDef, FeatureSchema};
use crate::model::{GradientBoostingRegressor, Regressor};
use crate::training::{TrainedModel, TrainingReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MODEL_FILE: &str = "crop_yield_model.json";
pub const COLUMNS_FILE: &str = "model_columns.json";
pub const REPORT_FILE: &str = "training_report.json";
pub const DIAGNOSTICS_FILE: &str = "actual_vs_predicted.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Default directory for artifacts, relative to the working directory
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Model file contents: the regressor plus the encoding it expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub target: String,
    pub features: Vec<FeatureDef>,
    pub model: GradientBoostingRegressor,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub name: String,
    pub sha256: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ArtifactFile>,
}

impl Manifest {
    pub fn file(&self, name: &str) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Artifacts read back from disk
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub model: GradientBoostingRegressor,
    pub schema: FeatureSchema,
    pub target: String,
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
}

/// Reads and writes the artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Write every artifact of a training run and return the manifest
    pub fn save(&self, trained: &TrainedModel) -> Result<Manifest> {
        fs::create_dir_all(&self.dir).map_err(|e| YieldError::io(&self.dir, e))?;

        let artifact = ModelArtifact {
            target: trained.report.target.clone(),
            features: trained.schema.features().to_vec(),
            model: trained.model.clone(),
            trained_at: trained.report.trained_at,
        };
        let model_bytes = to_json(&artifact, MODEL_FILE)?;
        let columns_bytes = to_json(&trained.schema.columns(), COLUMNS_FILE)?;
        let report_bytes = to_json(&trained.report, REPORT_FILE)?;
        let diagnostics_bytes = diagnostics_csv(trained)?;

        let mut files = Vec::new();
        for (name, bytes) in [
            (MODEL_FILE, &model_bytes),
            (COLUMNS_FILE, &columns_bytes),
            (REPORT_FILE, &report_bytes),
            (DIAGNOSTICS_FILE, &diagnostics_bytes),
        ] {
            write_atomic(&self.path(name), bytes)?;
            files.push(ArtifactFile {
                name: name.to_string(),
                sha256: compute_checksum(bytes),
                size_bytes: bytes.len(),
            });
            debug!(file = name, size_bytes = bytes.len(), "Wrote artifact");
        }

        let model_checksum = &files[0].sha256;
        let manifest = Manifest {
            model_version: format!(
                "{}-{}",
                trained.report.trained_at.format("%Y%m%d%H%M%S"),
                &model_checksum[..8]
            ),
            created_at: Utc::now(),
            files,
        };
        write_atomic(&self.path(MANIFEST_FILE), &to_json(&manifest, MANIFEST_FILE)?)?;

        info!(
            dir = %self.dir.display(),
            model_version = %manifest.model_version,
            "Saved training artifacts"
        );
        Ok(manifest)
    }

    /// Read the manifest, if one was written
    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.path(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = read(&path)?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| YieldError::json(MANIFEST_FILE, e))
    }

    /// Read the persisted column list alone
    pub fn load_columns(&self) -> Result<Vec<String>> {
        let bytes = self.read_verified(COLUMNS_FILE, self.load_manifest()?.as_ref())?;
        serde_json::from_slice(&bytes).map_err(|e| YieldError::json(COLUMNS_FILE, e))
    }

    pub fn load_report(&self) -> Result<TrainingReport> {
        let bytes = self.read_verified(REPORT_FILE, self.load_manifest()?.as_ref())?;
        serde_json::from_slice(&bytes).map_err(|e| YieldError::json(REPORT_FILE, e))
    }

    /// Load the model and schema, verifying checksums when a manifest exists
    /// and that the column list still matches the feature definitions
    pub fn load(&self) -> Result<LoadedArtifacts> {
        let manifest = self.load_manifest()?;
        if manifest.is_none() {
            warn!(dir = %self.dir.display(), "No manifest found, skipping checksum verification");
        }

        let model_bytes = self.read_verified(MODEL_FILE, manifest.as_ref())?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&model_bytes).map_err(|e| YieldError::json(MODEL_FILE, e))?;
        let columns_bytes = self.read_verified(COLUMNS_FILE, manifest.as_ref())?;
        let columns: Vec<String> = serde_json::from_slice(&columns_bytes)
            .map_err(|e| YieldError::json(COLUMNS_FILE, e))?;

        let schema = FeatureSchema::new(artifact.features, columns)?;
        artifact.model.validate_fitted()?;
        if let Some(n) = artifact.model.n_features() {
            if n != schema.n_columns() {
                return Err(YieldError::ShapeMismatch {
                    expected: schema.n_columns(),
                    actual: n,
                });
            }
        }

        let model_version = match &manifest {
            Some(m) => m.model_version.clone(),
            None => format!("unversioned-{}", &compute_checksum(&model_bytes)[..8]),
        };

        info!(
            dir = %self.dir.display(),
            model_version = %model_version,
            columns = schema.n_columns(),
            "Loaded model artifacts"
        );

        Ok(LoadedArtifacts {
            model: artifact.model,
            schema,
            target: artifact.target,
            model_version,
            trained_at: artifact.trained_at,
        })
    }

    fn read_verified(&self, name: &str, manifest: Option<&Manifest>) -> Result<Vec<u8>> {
        let bytes = read(&self.path(name))?;
        if let Some(expected) = manifest.and_then(|m| m.file(name)) {
            let actual = compute_checksum(&bytes);
            if actual != expected.sha256 {
                return Err(YieldError::ChecksumMismatch {
                    file: name.to_string(),
                    expected: expected.sha256.clone(),
                    actual,
                });
            }
            debug!(file = name, checksum = %actual, "Artifact checksum validated");
        }
        Ok(bytes)
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn to_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| YieldError::json(what, e))
}

fn diagnostics_csv(trained: &TrainedModel) -> Result<Vec<u8>> {
    let csv_err = |e| YieldError::Csv {
        path: PathBuf::from(DIAGNOSTICS_FILE),
        source: e,
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    for point in &trained.held_out {
        writer.serialize(point).map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| YieldError::io(DIAGNOSTICS_FILE, e.into_error()))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| YieldError::io(path, e))
}

/// Write to a temp file first, then rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(|e| YieldError::io(&temp_path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| YieldError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| YieldError::io(path, e))
}
