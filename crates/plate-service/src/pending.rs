use anyhow::{Context, Result};
use common::plates::{PendingDocument, PendingEntry};
use common::validation::{
    local_timestamp, validate_length, validate_plate_input, MAX_IMAGE_REFERENCE_LENGTH,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PendingError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("La placa {0} ya está en pendientes")]
    Duplicate(String),

    #[error("La placa {0} no está en pendientes")]
    NotFound(String),

    /// The cause is logged where it happens; clients only see the summary
    #[error("Error al guardar")]
    Storage,
}

impl PendingError {
    fn label(&self) -> &'static str {
        match self {
            PendingError::InvalidInput(_) => "invalid",
            PendingError::Duplicate(_) => "duplicate",
            PendingError::NotFound(_) => "not_found",
            PendingError::Storage => "storage_error",
        }
    }
}

/// Durable, deduplicated list of plates awaiting manual review.
///
/// The whole document is re-read and rewritten on every change. One mutex
/// covers each read-check-write, so concurrent adds cannot both pass the
/// duplicate check.
#[derive(Debug)]
pub struct PendingQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in insertion order; an unreadable store reads as empty
    pub async fn list(&self) -> Vec<PendingEntry> {
        let _guard = self.lock.lock().await;

        let entries = match self.read_document().await {
            Ok(Some(document)) => document.data,
            Ok(None) => {
                debug!(path = %self.path.display(), "Pending file does not exist yet");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to load pending file: {:#}", e);
                Vec::new()
            }
        };

        telemetry::metrics::PENDING_OPERATIONS
            .with_label_values(&["list", "ok"])
            .inc();
        entries
    }

    /// Queue a plate for review and return the stored entry
    pub async fn add(
        &self,
        plate: &str,
        image_reference: &str,
    ) -> Result<PendingEntry, PendingError> {
        let result = self.add_locked(plate, image_reference).await;
        record("add", &result);
        result
    }

    /// Mark a queued plate as handled. The entry stays in the list.
    pub async fn resolve(&self, plate: &str) -> Result<PendingEntry, PendingError> {
        let result = self.resolve_locked(plate).await;
        record("resolve", &result);
        result
    }

    async fn add_locked(
        &self,
        plate: &str,
        image_reference: &str,
    ) -> Result<PendingEntry, PendingError> {
        let plate = normalize_plate(plate)?;
        validate_length(image_reference, MAX_IMAGE_REFERENCE_LENGTH, "imagen")
            .map_err(|e| PendingError::InvalidInput(e.to_string()))?;

        let _guard = self.lock.lock().await;
        let mut document = self.load_for_update().await?;

        if document
            .data
            .iter()
            .any(|entry| entry.plate.to_uppercase() == plate)
        {
            debug!(plate = %plate, "Plate already pending");
            return Err(PendingError::Duplicate(plate));
        }

        let entry = PendingEntry {
            plate,
            image_reference: image_reference.to_string(),
            created_at: local_timestamp(),
            resolved: false,
        };
        document.data.push(entry.clone());
        self.persist(&document).await?;

        info!(plate = %entry.plate, pending = document.data.len(), "Plate added to pending queue");
        Ok(entry)
    }

    async fn resolve_locked(&self, plate: &str) -> Result<PendingEntry, PendingError> {
        let plate = normalize_plate(plate)?;

        let _guard = self.lock.lock().await;
        let mut document = self.load_for_update().await?;

        let entry = document
            .data
            .iter_mut()
            .find(|entry| entry.plate.to_uppercase() == plate)
            .ok_or_else(|| PendingError::NotFound(plate.clone()))?;
        entry.resolved = true;
        let entry = entry.clone();

        self.persist(&document).await?;

        info!(plate = %entry.plate, "Pending plate resolved");
        Ok(entry)
    }

    /// Missing file starts a fresh document; a corrupt one is left alone
    async fn load_for_update(&self) -> Result<PendingDocument, PendingError> {
        match self.read_document().await {
            Ok(document) => Ok(document.unwrap_or_default()),
            Err(e) => {
                error!(path = %self.path.display(), "Refusing to rewrite pending file: {:#}", e);
                Err(PendingError::Storage)
            }
        }
    }

    async fn persist(&self, document: &PendingDocument) -> Result<(), PendingError> {
        match self.write_document(document).await {
            Ok(()) => {
                telemetry::metrics::PENDING_ENTRIES.set(document.data.len() as i64);
                Ok(())
            }
            Err(e) => {
                error!(path = %self.path.display(), "Failed to save pending file: {:#}", e);
                Err(PendingError::Storage)
            }
        }
    }

    async fn read_document(&self) -> Result<Option<PendingDocument>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read pending file"),
        };

        let document =
            serde_json::from_slice(&bytes).context("Pending file is not a valid document")?;
        Ok(Some(document))
    }

    /// Write beside the target, then rename over it
    async fn write_document(&self, document: &PendingDocument) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(document).context("Failed to serialize pending document")?;

        let tmp_path = self.temp_path();
        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "pendientes.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn normalize_plate(plate: &str) -> Result<String, PendingError> {
    if plate.trim().is_empty() {
        return Err(PendingError::InvalidInput("Placa requerida".to_string()));
    }
    validate_plate_input(plate).map_err(|e| PendingError::InvalidInput(e.to_string()))?;
    Ok(plate.trim().to_uppercase())
}

fn record(operation: &str, result: &Result<PendingEntry, PendingError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    telemetry::metrics::PENDING_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}
