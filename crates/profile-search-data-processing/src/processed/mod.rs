use ahash::AHashSet;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::{DataError, ProfileColumn, ProfileRecord, Result, cleaners};

const EXPORT_SEPARATOR_WIDTH: usize = 50;

/// Row counts for one cleaning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Rows read from the raw file (malformed lines already skipped)
    pub raw_rows: usize,
    /// Exact duplicates over the raw profile columns
    pub raw_duplicates: usize,
    /// Rows where every column cleaned to empty
    pub invalid_rows: usize,
    /// Rows whose normalized dedup key was already seen
    pub key_duplicates: usize,
    /// Records kept
    pub records: usize,
}

/// The normalized record set and the counts that produced it.
#[derive(Debug, Clone)]
pub struct CleanedProfiles {
    pub records: Vec<ProfileRecord>,
    pub report: CleanReport,
}

/// Sidecar written next to the cleaned output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedMetadata {
    pub source: String,
    pub generated_at: String,
    #[serde(flatten)]
    pub report: CleanReport,
}

impl CleanedMetadata {
    pub fn new(source: impl Into<String>, report: CleanReport) -> Self {
        Self {
            source: source.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            report,
        }
    }
}

/// `<output>.meta.json` for a given record file.
pub fn metadata_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

impl CleanedProfiles {
    /// Write the records as JSON lines plus the metadata sidecar.
    #[instrument(name = "Save cleaned profiles", skip(self), level = "info", fields(records = self.records.len()))]
    pub fn save(&self, output: &Path, source: &str) -> Result<()> {
        write_records_jsonl(output, &self.records)?;
        let metadata = CleanedMetadata::new(source, self.report);
        let file = File::create(metadata_path_for(output))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &metadata)?;
        info!(path = %output.display(), "Saved cleaned profiles");
        Ok(())
    }
}

/// Collect the nine profile columns as rows of optional cells.
fn frame_rows(df: &DataFrame) -> Result<Vec<[Option<&str>; 9]>> {
    let mut rows = vec![[None; 9]; df.height()];
    for (j, column) in ProfileColumn::ALL.iter().enumerate() {
        let values = df.column(column.as_str())?.str()?;
        for (row, value) in rows.iter_mut().zip(values) {
            row[j] = value;
        }
    }
    Ok(rows)
}

fn clean_row(row: &[Option<&str>; 9]) -> ProfileRecord {
    ProfileRecord::from_values(std::array::from_fn(|j| {
        cleaners::clean(ProfileColumn::ALL[j], row[j].unwrap_or_default())
    }))
}

/// Deduplicate and normalize a raw profile frame.
///
/// 1. exact duplicates over the nine raw columns are dropped (first kept),
/// 2. every cell goes through its column cleaner,
/// 3. rows with nothing left are dropped as invalid,
/// 4. rows repeating an earlier normalized (full_name, job_title, industry)
///    key are dropped.
///
/// Input order is preserved, so the result is deterministic for a given file.
#[instrument(name = "Clean profiles", skip_all, level = "info")]
pub fn clean_profiles(raw: LazyFrame) -> Result<CleanedProfiles> {
    let df = raw.collect()?;
    let raw_rows = df.height();

    let names = ProfileColumn::names();
    let df = df.unique_stable(Some(names.as_slice()), UniqueKeepStrategy::First, None)?;
    let raw_duplicates = raw_rows - df.height();
    debug!(raw_rows, raw_duplicates, "Dropped exact raw duplicates");

    let rows = frame_rows(&df)?;
    let cleaned: Vec<ProfileRecord> = rows.par_iter().map(clean_row).collect();

    let mut seen = AHashSet::with_capacity(cleaned.len());
    let mut invalid_rows = 0;
    let mut key_duplicates = 0;
    let records: Vec<ProfileRecord> = cleaned
        .into_iter()
        .filter(|record| {
            if record.is_blank() {
                invalid_rows += 1;
                return false;
            }
            if !seen.insert(record.dedup_key()) {
                key_duplicates += 1;
                return false;
            }
            true
        })
        .collect();

    let report = CleanReport {
        raw_rows,
        raw_duplicates,
        invalid_rows,
        key_duplicates,
        records: records.len(),
    };
    info!(
        raw_rows,
        raw_duplicates,
        invalid_rows,
        key_duplicates,
        records = report.records,
        "Profiles cleaned"
    );
    Ok(CleanedProfiles { records, report })
}

pub fn write_records_jsonl(path: &Path, records: &[ProfileRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON-lines record file. Blank lines are skipped.
#[instrument(name = "Read cleaned profiles", level = "info", fields(path = %path.display()))]
pub fn read_records_jsonl(path: &Path) -> Result<Vec<ProfileRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| DataError::MalformedRecord {
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    info!(records = records.len(), "Loaded cleaned profiles");
    Ok(records)
}

/// Write each column's cleaned values to `<out_dir>/<column>.txt`.
///
/// Every raw row is exported (no deduplication), each entry followed by a
/// separator line of `=`. Useful for eyeballing what the cleaners keep.
#[instrument(name = "Export cleaned columns", skip(raw), level = "info", fields(out_dir = %out_dir.display()))]
pub fn export_columns(raw: LazyFrame, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let df = raw.collect()?;
    info!(rows = df.height(), "Exporting cleaned columns");

    let separator = "=".repeat(EXPORT_SEPARATOR_WIDTH);
    let mut written = Vec::with_capacity(ProfileColumn::ALL.len());
    for column in ProfileColumn::ALL {
        let path = out_dir.join(format!("{column}.txt"));
        let mut writer = BufWriter::new(File::create(&path)?);
        for value in df.column(column.as_str())?.str()? {
            let cleaned = cleaners::clean(column, value.unwrap_or_default());
            writeln!(writer, "{cleaned}")?;
            writeln!(writer, "{separator}")?;
        }
        writer.flush()?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::read_raw_profiles;
    use crate::test_data::{TestDataConfig, create_test_data};

    fn clean_minimal() -> CleanedProfiles {
        let raw_file = create_test_data(&TestDataConfig::minimal()).unwrap();
        clean_profiles(read_raw_profiles(raw_file.path()).unwrap()).unwrap()
    }

    #[test]
    fn test_ragged_rows_never_reach_cleaning() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", ProfileColumn::names().join(",")).unwrap();
        writeln!(file, "Good Row,Engineer,Software,Builds things,US,[],[],\"['Rust']\",js").unwrap();
        writeln!(file, "Broken Row,Engineer,Software,Builds things,US,[],[],\"['Rust']\",js,EXTRA,FIELDS").unwrap();
        file.flush().unwrap();

        let cleaned = clean_profiles(read_raw_profiles(file.path()).unwrap()).unwrap();
        let names: Vec<&str> = cleaned.records.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["Good Row"]);
        assert_eq!(cleaned.report.raw_rows, 1);
    }

    #[test]
    fn test_minimal_counts() {
        let cleaned = clean_minimal();
        assert_eq!(
            cleaned.report,
            CleanReport {
                raw_rows: 7,
                raw_duplicates: 1,
                invalid_rows: 1,
                key_duplicates: 1,
                records: 4,
            }
        );
        let names: Vec<&str> = cleaned.records.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["Randall Evans", "Maria Lopez", "Ali Ahmad", "Chen Wei"]);
    }

    #[test]
    fn test_record_values_are_normalized() {
        let cleaned = clean_minimal();
        let randall = &cleaned.records[0];
        assert_eq!(randall.skills, "Python | SQL");
        assert_eq!(randall.education, "Stanford University");
        assert_eq!(randall.experience, "Acme : Data Engineer");
        assert_eq!(randall.summary, "Builds reliable data pipelines");

        let maria = &cleaned.records[1];
        assert_eq!(maria.summary, "", "company-size band should be dropped");
        assert_eq!(maria.experience, "Globex : Product Manager | Initech");

        let chen = &cleaned.records[3];
        assert_eq!(chen.job_title, "", "null cell should clean to empty");
        assert_eq!(chen.skills, "Teaching");
    }

    #[test]
    fn test_cleaning_is_deterministic() {
        let raw_file = create_test_data(&TestDataConfig::sample()).unwrap();
        let first = clean_profiles(read_raw_profiles(raw_file.path()).unwrap()).unwrap();
        let second = clean_profiles(read_raw_profiles(raw_file.path()).unwrap()).unwrap();
        assert_eq!(first.records.len(), second.records.len());
        assert_eq!(first.records, second.records);
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_no_identical_records_or_shared_keys() {
        let raw_file = create_test_data(&TestDataConfig::sample()).unwrap();
        let cleaned = clean_profiles(read_raw_profiles(raw_file.path()).unwrap()).unwrap();

        let unique_records: AHashSet<&ProfileRecord> = cleaned.records.iter().collect();
        assert_eq!(unique_records.len(), cleaned.records.len());

        let unique_keys: AHashSet<[String; 3]> =
            cleaned.records.iter().map(ProfileRecord::dedup_key).collect();
        assert_eq!(unique_keys.len(), cleaned.records.len());
        assert!(cleaned.records.iter().all(|r| !r.is_blank()));
    }

    #[test]
    fn test_save_and_reload() {
        let cleaned = clean_minimal();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("profiles.jsonl");

        cleaned.save(&output, "fixture.txt").unwrap();

        let reloaded = read_records_jsonl(&output).unwrap();
        assert_eq!(reloaded, cleaned.records);

        let metadata: CleanedMetadata = serde_json::from_reader(
            File::open(metadata_path_for(&output)).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata.source, "fixture.txt");
        assert_eq!(metadata.report, cleaned.report);
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.generated_at).is_ok());
    }

    #[test]
    fn test_malformed_jsonl_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"full_name\": \"A\"}\n\n{not json}\n").unwrap();

        match read_records_jsonl(&path) {
            Err(DataError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("Expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_export_columns_writes_every_raw_row() {
        let raw_file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = export_columns(read_raw_profiles(raw_file.path()).unwrap(), dir.path()).unwrap();
        assert_eq!(written.len(), 9);

        let skills = std::fs::read_to_string(dir.path().join("skills.txt")).unwrap();
        let separator = "=".repeat(EXPORT_SEPARATOR_WIDTH);
        let entries: Vec<&str> = skills
            .lines()
            .filter(|line| *line != separator)
            .collect();
        assert_eq!(entries.len(), 7, "one entry per raw row, duplicates included");
        assert_eq!(entries[0], "Python | SQL");
        assert_eq!(entries[0], entries[1]);
    }

    #[test]
    fn test_metadata_path() {
        assert_eq!(
            metadata_path_for(Path::new("data/profiles.jsonl")),
            PathBuf::from("data/profiles.jsonl.meta.json")
        );
    }
}
