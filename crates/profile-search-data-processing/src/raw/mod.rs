use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{DataError, ProfileColumn, Result};

/// Extra trailing column that only receives a value when a line has more
/// fields than the header.
const OVERFLOW_COLUMN: &str = "__overflow";

fn csv_reader(path: &Path) -> LazyCsvReader {
    LazyCsvReader::new(path)
        .with_separator(b',')
        .with_quote_char(Some(b'"'))
        .with_infer_schema_length(Some(0))
}

/// Load the raw profile dump as a lazy frame of the nine profile columns.
///
/// The file is comma separated, `"`-quoted and has a header row. Every column
/// is read as a string so no value is coerced before cleaning. Lines that do
/// not parse are skipped rather than failing the whole load. Short rows are
/// padded with nulls, rows with more fields than the header are dropped.
///
/// Extra columns in the file are ignored. A missing profile column is an error.
#[instrument(name = "Read raw profiles", skip_all, level = "info", fields(path = %path.as_ref().display()))]
pub fn read_raw_profiles(path: impl AsRef<Path>) -> Result<LazyFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("raw profile file not found: {}", path.display()),
        )));
    }

    let header = csv_reader(path)
        .with_has_header(true)
        .finish()?
        .collect_schema()?;
    let missing: Vec<String> = ProfileColumn::ALL
        .iter()
        .filter(|c| !header.contains(c.as_str()))
        .map(|c| c.as_str().to_string())
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "Raw file is missing profile columns");
        return Err(DataError::MissingColumns(missing));
    }
    info!(
        columns = header.len(),
        "Raw file schema read, selecting profile columns"
    );

    // Re-read with one column more than the header: ragged lines are still
    // truncated, but only after spilling into the overflow column.
    let schema: Schema = header
        .iter_names()
        .cloned()
        .chain(std::iter::once(PlSmallStr::from_static(OVERFLOW_COLUMN)))
        .map(|name| (name, DataType::String))
        .collect();
    let lf = csv_reader(path)
        .with_has_header(false)
        .with_skip_rows(1)
        .with_schema(Some(Arc::new(schema)))
        .with_ignore_errors(true)
        .with_truncate_ragged_lines(true)
        .with_missing_is_null(false)
        .finish()?;

    Ok(lf.filter(col(OVERFLOW_COLUMN).is_null()).select(
        ProfileColumn::ALL
            .iter()
            .map(|c| col(c.as_str()))
            .collect::<Vec<_>>(),
    ))
}

/// Count physical lines in the raw file (header and multi-line records included).
pub fn count_raw_lines(path: impl AsRef<Path>) -> Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.split(b'\n') {
        line?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{TestDataConfig, create_test_data};
    use crate::tests_utils::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_raw_profiles_selects_profile_columns() {
        let raw_file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let df = read_raw_profiles(raw_file.path()).unwrap().collect().unwrap();

        assert_eq!(df.width(), 9);
        assert_has_columns(
            &df,
            &ProfileColumn::ALL.map(ProfileColumn::as_str),
        );
        for column in ProfileColumn::ALL {
            assert_column_type(&df, column.as_str(), &DataType::String);
        }
        assert!(df.height() >= 3);
    }

    #[test]
    fn test_extra_columns_are_dropped_and_quotes_respected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "id,full_name,job_title,industry,summary,location_country,education,experience,skills,job_summary"
        )
        .unwrap();
        writeln!(
            file,
            "7,\"Evans, Randall\",Engineer,Software,\"Line one\",US,[],[],\"['Python', 'SQL']\",Builds"
        )
        .unwrap();
        file.flush().unwrap();

        let df = read_raw_profiles(file.path()).unwrap().collect().unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.column("id").is_err());

        let names: Vec<Option<&str>> = df
            .column("full_name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names, vec![Some("Evans, Randall")]);

        let skills: Vec<Option<&str>> = df
            .column("skills")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(skills, vec![Some("['Python', 'SQL']")]);
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "full_name,job_title").unwrap();
        writeln!(file, "A,B").unwrap();
        file.flush().unwrap();

        match read_raw_profiles(file.path()) {
            Err(DataError::MissingColumns(missing)) => {
                assert_eq!(missing.len(), 7);
                assert!(missing.contains(&"skills".to_string()));
            }
            Err(e) => panic!("Expected MissingColumns, got {e:?}"),
            Ok(_) => panic!("Expected MissingColumns, got a frame"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_raw_profiles("/definitely/not/here.csv");
        assert!(matches!(result, Err(DataError::Io(_))));
    }

    #[test]
    fn test_rows_wider_than_header_are_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "full_name,job_title,industry,summary,location_country,education,experience,skills,job_summary"
        )
        .unwrap();
        writeln!(file, "Good Row,Engineer,Software,Summary,US,[],[],\"['Rust']\",js").unwrap();
        writeln!(file, "Broken Row,Engineer,Software,Summary,US,[],[],\"['Rust']\",js,EXTRA,FIELDS").unwrap();
        writeln!(file, "Short Row,Engineer").unwrap();
        file.flush().unwrap();

        let df = read_raw_profiles(file.path()).unwrap().collect().unwrap();
        assert_eq!(df.width(), 9);
        let names: Vec<Option<&str>> = df
            .column("full_name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names, vec![Some("Good Row"), Some("Short Row")]);
    }

    #[test]
    fn test_count_raw_lines() {
        let raw_file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let lines = count_raw_lines(raw_file.path()).unwrap();
        let df = read_raw_profiles(raw_file.path()).unwrap().collect().unwrap();
        assert!(lines > df.height(), "header line should be counted");
    }
}
