use crate::errors::{ConfigError, DomainError};
use std::path::{Path, PathBuf};

/// Path of the pre-materialized file list for one batch.
pub fn batch_file_list(batches_dir: &Path, batch_id: u32) -> PathBuf {
    batches_dir.join(format!("batch_{}.txt", batch_id))
}

/// Enumerate the batch ids present in the batches directory, sorted
/// ascending. Batch splitting itself happens upstream; this only discovers
/// what a splitter left behind.
pub fn list_batch_ids(batches_dir: &Path) -> Result<Vec<u32>, ConfigError> {
    if !batches_dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<u32> = fs_err::read_dir(batches_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let name = name.to_str()?;
            name.strip_prefix("batch_")?
                .strip_suffix(".txt")?
                .parse()
                .ok()
        })
        .collect();

    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Read the structure paths belonging to one batch.
pub fn read_batch_files(batches_dir: &Path, batch_id: u32) -> Result<Vec<PathBuf>, DomainError> {
    let list = batch_file_list(batches_dir, batch_id);
    let content =
        fs_err::read_to_string(&list).map_err(|_| DomainError::BatchNotFound(batch_id))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}
