use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::TabularDataset;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error(
        "Could not save results to {path} ({primary}); emergency save to {emergency} also failed ({fallback})"
    )]
    Failed {
        path: PathBuf,
        primary: String,
        emergency: PathBuf,
        fallback: String,
    },
}

#[derive(Error, Debug)]
enum WriteError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Saves result datasets under an output directory.
///
/// Files are named `<target stem>_result_<YYYYMMDD_HHMMSS>.csv`, or
/// `result_<timestamp>.csv` without a target name. Output is delimited
/// text with a UTF-8 BOM; `.tsv` targets produce tab-separated output.
/// A failed write is retried once as `emergency_save_<timestamp>.csv`.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn save(
        &self,
        dataset: &TabularDataset,
        hint: Option<&Path>,
    ) -> Result<PathBuf, PersistenceError> {
        self.save_at(dataset, hint, Local::now().naive_local())
    }

    fn save_at(
        &self,
        dataset: &TabularDataset,
        hint: Option<&Path>,
        now: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let tab_separated = hint
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
        let ext = if tab_separated { "tsv" } else { "csv" };

        let file_name = match hint.and_then(|p| p.file_stem()).and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => format!("{stem}_result_{stamp}.{ext}"),
            _ => format!("result_{stamp}.{ext}"),
        };
        let path = self.output_dir.join(file_name);
        let delimiter = if tab_separated { b'\t' } else { b',' };

        let primary = match self.write(dataset, &path, delimiter) {
            Ok(()) => {
                tracing::info!(path = %path.display(), rows = dataset.len(), "Results saved");
                return Ok(path);
            }
            Err(e) => e,
        };
        tracing::warn!(path = %path.display(), error = %primary, "Saving results failed, attempting emergency save");

        let emergency = self.output_dir.join(format!("emergency_save_{stamp}.csv"));
        match self.write(dataset, &emergency, b',') {
            Ok(()) => {
                tracing::warn!(path = %emergency.display(), "Results saved to emergency file");
                Ok(emergency)
            }
            Err(fallback) => {
                let err = PersistenceError::Failed {
                    path,
                    primary: primary.to_string(),
                    emergency,
                    fallback: fallback.to_string(),
                };
                tracing::error!(error = %err, "Results could not be saved");
                Err(err)
            }
        }
    }

    /// Write through a temporary file in the output directory, then move it
    /// into place.
    fn write(&self, dataset: &TabularDataset, path: &Path, delimiter: u8) -> Result<(), WriteError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let mut tmp = NamedTempFile::new_in(&self.output_dir)?;
        tmp.write_all(UTF8_BOM)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_writer(tmp.as_file_mut());
            writer.write_record(dataset.columns())?;
            for row in dataset.rows() {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
