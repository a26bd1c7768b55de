use std::io::Write;

use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of generated profiles appended after the fixed fixture rows
    pub generated_rows: usize,
    /// Whether to include the fixture rows that exercise dedup and invalid-row handling
    pub include_edge_cases: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            generated_rows: 50,
            include_edge_cases: true,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests: the seven fixture rows only.
    ///
    /// Cleaning it yields exactly four records: one raw duplicate, one
    /// dedup-key duplicate and one fully invalid row are removed.
    pub fn minimal() -> Self {
        Self {
            generated_rows: 0,
            include_edge_cases: true,
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self::default()
    }
}

const HEADER: [&str; 9] = [
    "full_name",
    "job_title",
    "industry",
    "summary",
    "location_country",
    "education",
    "experience",
    "skills",
    "job_summary",
];

const RANDALL: [&str; 9] = [
    "Randall Evans",
    "Data Engineer",
    "Computer Software",
    "Builds reliable data pipelines",
    "United States",
    "[{'school': {'name': 'Stanford University'}, 'degrees': ['BSc']}]",
    "[{'company': {'name': 'Acme'}, 'title': {'name': 'Data Engineer'}}]",
    "['Python', 'SQL', '+14155552671']",
    "Owns the ingestion platform",
];

const FIXTURE_ROWS: [[&str; 9]; 5] = [
    [
        "Maria Lopez",
        "Product Manager",
        "Information Technology & Services",
        "1-10",
        "Spain",
        "[{'school': {'name': 'IE Business School'}}]",
        "[{'company': {'name': 'Globex'}, 'title': {'name': 'Product Manager'}}, {'company': {'name': 'Initech'}}]",
        "['Roadmapping', 'Python']",
        "Leads discovery for the mobile team",
    ],
    // Same person as RANDALL after normalization, different free text.
    [
        "randall   evans",
        "Data Engineer",
        "Computer Software",
        "A second copy with another summary",
        "United States",
        "[]",
        "[]",
        "['Rust']",
        "Duplicate profile",
    ],
    // Nothing survives cleaning.
    [
        "C:\\exports\\dump.csv",
        "[]",
        "1-10",
        "10001+",
        "2019-01-01",
        "not a list",
        "",
        "[]",
        "7",
    ],
    [
        "Ali Ahmad",
        "Business Analyst",
        "Financial Services",
        "ali works on data quality",
        "Germany",
        "[{'school': {'name': 'TU Munich'}}]",
        "[{'title': {'name': 'Analyst'}}]",
        "['Excel', 'Python']",
        "ahmad reports on the CREW",
    ],
    // Empty cells are read as nulls.
    [
        "Chen Wei",
        "",
        "Higher Education",
        "",
        "China",
        "",
        "",
        "['Teaching']",
        "",
    ],
];

const FIRST_NAMES: [&str; 8] = [
    "Olivia", "Liam", "Amara", "Noah", "Yuki", "Mateo", "Fatima", "Lucas",
];
const LAST_NAMES: [&str; 6] = ["Smith", "Okafor", "Tanaka", "Silva", "Novak", "Haddad"];
const TITLES: [&str; 5] = [
    "Software Engineer",
    "Data Scientist",
    "Account Manager",
    "Nurse",
    "Lecturer",
];
const INDUSTRIES: [&str; 4] = [
    "Computer Software",
    "Hospital & Health Care",
    "Retail",
    "Education Management",
];
const COUNTRIES: [&str; 5] = ["United States", "Nigeria", "Japan", "Brazil", "Canada"];
const SKILLS: [&str; 6] = ["Python", "Leadership", "Excel", "Java", "Sales", "Rust"];

/// Quote a CSV field, doubling embedded quotes.
fn csv_field(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn write_row(file: &mut NamedTempFile, row: &[&str]) -> Result<()> {
    let line = row.iter().map(|v| csv_field(v)).collect::<Vec<_>>().join(",");
    writeln!(file, "{line}")?;
    Ok(())
}

fn generated_row(i: usize) -> [String; 9] {
    let first = FIRST_NAMES[i % FIRST_NAMES.len()];
    let last = LAST_NAMES[(i / FIRST_NAMES.len()) % LAST_NAMES.len()];
    let title = TITLES[i % TITLES.len()];
    let industry = INDUSTRIES[i % INDUSTRIES.len()];
    let country = COUNTRIES[i % COUNTRIES.len()];
    let skill_a = SKILLS[i % SKILLS.len()];
    let skill_b = SKILLS[(i + 2) % SKILLS.len()];
    [
        format!("{first} {last}"),
        title.to_string(),
        industry.to_string(),
        format!("{title} with {} years of experience", 2 + i % 15),
        country.to_string(),
        format!("[{{'school': {{'name': 'University {}'}}}}]", i % 7),
        format!("[{{'company': {{'name': 'Company {}'}}, 'title': {{'name': '{title}'}}}}]", i % 11),
        format!("['{skill_a}', '{skill_b}']"),
        format!("Works as {title} in {country}"),
    ]
}

/// Create a raw profile CSV in a temporary file.
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);
    let mut file = NamedTempFile::with_suffix(".txt")?;
    write_row(&mut file, &HEADER)?;

    if config.include_edge_cases {
        write_row(&mut file, &RANDALL)?;
        // Exact raw duplicate
        write_row(&mut file, &RANDALL)?;
        for row in &FIXTURE_ROWS {
            write_row(&mut file, row)?;
        }
    }

    for i in 0..config.generated_rows {
        let row = generated_row(i);
        let row: Vec<&str> = row.iter().map(String::as_str).collect();
        write_row(&mut file, &row)?;
    }

    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_layout() {
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 2 + FIXTURE_ROWS.len());
        assert_eq!(lines[0], HEADER.map(|h| format!("\"{h}\"")).join(","));
        assert_eq!(lines[1], lines[2], "second row is an exact duplicate");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field(""), "");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_generated_rows_are_distinct() {
        let file = create_test_data(&TestDataConfig {
            generated_rows: 40,
            include_edge_cases: false,
        })
        .unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        let rows: ahash::AHashSet<&str> = content.lines().skip(1).collect();
        assert_eq!(rows.len(), 40);
    }
}
