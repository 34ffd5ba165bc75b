//! On-disk artifacts shared between stages.
//!
//! Every stage output is a new file whose name starts with a creation
//! timestamp, so "latest" is simply the lexicographically greatest name.
//! Files are written through a hidden temporary and renamed into place, and
//! an existing artifact is never replaced.

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Local;

use crate::error::{PipelineError, Result};

/// Label of raw payload files: `<ts>_eia_hourly_data.json`.
pub const RAW_LABEL: &str = "eia_hourly_data";
pub const RAW_SUFFIX: &str = "_eia_hourly_data.json";

/// Label of transformed files: `<ts>_..._transformed.csv`.
pub const TRANSFORMED_LABEL: &str = "transformed";
pub const TRANSFORMED_SUFFIX: &str = "_transformed.csv";

// ---

/// Timestamp prefix for new artifacts, e.g. `20240101_130502_017`.
pub fn timestamp_prefix() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Make a label safe to embed in a filename.
pub fn sanitize_label(label: &str) -> String {
    label.replace(' ', "_").replace('/', "-")
}

/// `<ts>_<label>.json` for a freshly fetched payload.
pub fn raw_file_name(label: &str) -> String {
    format!("{}_{}.json", timestamp_prefix(), sanitize_label(label))
}

/// Name of the CSV produced from `raw_path`.
///
/// The input stem is kept, with the raw label swapped for the transformed
/// one, behind a new timestamp.
pub fn transformed_file_name(raw_path: &Path) -> String {
    // ---
    let stem = raw_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_part = if stem.contains(RAW_LABEL) {
        stem.replace(RAW_LABEL, TRANSFORMED_LABEL)
    } else {
        format!("{stem}_{TRANSFORMED_LABEL}")
    };
    format!("{}_{}.csv", timestamp_prefix(), name_part)
}

/// Find the newest file in `dir` whose name ends with `suffix`.
pub fn latest_file(dir: &Path, suffix: &'static str) -> Result<PathBuf> {
    // ---
    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        suffix
    );
    let no_input = || PipelineError::NoInput {
        dir: dir.to_path_buf(),
        suffix,
    };

    let entries = glob::glob(&pattern).map_err(|_| no_input())?;
    let latest = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .max_by(|a, b| a.file_name().cmp(&b.file_name()))
        .ok_or_else(no_input)?;

    tracing::debug!("Latest `*{}` in {}: {}", suffix, dir.display(), latest.display());
    Ok(latest)
}

/// Write a new artifact `dir/name` via `write`, all or nothing.
///
/// The directory is created on demand. Fails with `AlreadyExists` if the
/// target is present.
pub fn write_atomic<F>(dir: &Path, name: &str, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<()>,
{
    // ---
    fs::create_dir_all(dir)?;
    let target = dir.join(name);
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("refusing to overwrite {}", target.display()),
        )
        .into());
    }

    let tmp = dir.join(format!(".{name}.tmp"));
    let outcome = fs::File::create(&tmp)
        .map_err(PipelineError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&tmp, &target).map_err(PipelineError::from));

    if let Err(e) = outcome {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(target)
}
