use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Handle to one stage's finalized output file.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub record_count: usize,
}

/// Writes records as line-delimited JSON, one record per line.
///
/// The data goes to a `.tmp` sibling first and is renamed into place only
/// after every line has been flushed, so a failed run never leaves a
/// partial artifact visible under the layer directory.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<ArtifactRef> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    write_bytes(path, body.as_bytes())?;
    Ok(ArtifactRef {
        path: path.to_path_buf(),
        record_count: records.len(),
    })
}

/// Atomic byte-level write used for both JSONL and CSV artifacts.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PipelineError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let tmp = tmp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        // Leave nothing behind on failure
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!("Wrote artifact {}", path.display());
    Ok(())
}

/// Reads an artifact line by line; blank lines are skipped.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path).map_err(|source| PipelineError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| PipelineError::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!("{}.tmp", file_name))
}
