//! File-based result records.

use std::path::{Path, PathBuf};

use pi_core::JobId;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::sink::{ResultRecord, ResultSink, SinkError, SinkFuture};

/// Writes one `<job_id>.json` file per finished job.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    /// Directory holding the record files.
    base_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ensure the base directory exists.
    pub async fn init(&self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    fn path_for(&self, job_id: JobId) -> PathBuf {
        self.base_dir.join(format!("{}.json", job_id))
    }

    /// Save a record.
    pub async fn save(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let path = self.path_for(record.job_id);
        let json = serde_json::to_string_pretty(record)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.base_dir.join(format!("{}.json.tmp", record.job_id));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Saved result to {:?}", path);
        Ok(())
    }

    /// Load the record for a job, if one was written.
    pub async fn load(&self, job_id: JobId) -> Result<Option<ResultRecord>, SinkError> {
        let path = self.path_for(job_id);

        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let mut file = fs::File::open(&path).await?;
        let mut json = String::new();
        file.read_to_string(&mut json).await?;

        Ok(Some(serde_json::from_str(&json)?))
    }

    /// List the jobs that have a record.
    pub async fn list(&self) -> Result<Vec<JobId>, SinkError> {
        let mut ids = Vec::new();

        if !fs::try_exists(&self.base_dir).await? {
            return Ok(ids);
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem()
                && let Ok(id) = JobId::parse(&stem.to_string_lossy())
            {
                ids.push(id);
            }
        }

        Ok(ids)
    }
}

impl ResultSink for JsonFileSink {
    fn record(&self, record: ResultRecord) -> SinkFuture {
        let sink = self.clone();
        Box::pin(async move { sink.save(&record).await })
    }
}
