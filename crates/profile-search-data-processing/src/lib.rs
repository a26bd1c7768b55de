use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub mod cleaners;
pub mod columns;
pub mod literal;
pub mod processed;
pub mod raw;
pub mod record;
pub mod test_data;

mod error;

pub use columns::{ColumnKind, ProfileColumn};
pub use error::{DataError, Result};
pub use processed::{CleanReport, CleanedMetadata, CleanedProfiles, clean_profiles};
pub use record::ProfileRecord;

pub const DATA_DIR_DEFAULT: &str = "./data";
pub const RAW_FILE_DEFAULT: &str = "300-user-linkedin.txt";

/// Global data directory, `PROFILE_DATA_DIR` or `./data`.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let dir = std::env::var("PROFILE_DATA_DIR").unwrap_or_else(|_| DATA_DIR_DEFAULT.to_string());
    PathBuf::from(dir)
});

pub fn get_data_dir() -> &'static Path {
    DATA_DIR.as_path()
}

/// Default location of the raw profile dump inside the data directory.
pub fn default_raw_file() -> PathBuf {
    get_data_dir().join(RAW_FILE_DEFAULT)
}

/// Read a raw profile file and run the full cleaning pipeline over it.
///
/// This is the one-shot entry point used by the CLI: load with
/// [`raw::read_raw_profiles`], then clean and deduplicate with
/// [`processed::clean_profiles`].
#[instrument(name = "Clean profile file", level = "info", fields(path = %path.as_ref().display()))]
pub fn clean_profile_file(path: impl AsRef<Path>) -> Result<CleanedProfiles> {
    let t_clean = std::time::Instant::now();
    let raw_lf = raw::read_raw_profiles(path.as_ref())?;
    info!(lines = raw::count_raw_lines(path.as_ref())?, "Raw file loaded");
    let cleaned = clean_profiles(raw_lf)?;
    info!(
        records = cleaned.records.len(),
        elapsed = ?t_clean.elapsed(),
        "Cleaning complete"
    );
    Ok(cleaned)
}
