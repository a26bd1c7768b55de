//! Per-column normalization rules.
//!
//! Every cleaner maps a raw cell to its normalized form. An empty string means
//! the value was missing or did not look like data for that column (a file
//! path in `full_name`, a salary band in `location_country`, ...).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ProfileColumn;
use crate::literal::{self, PyLiteral};

/// Separator used when a list column is flattened to a single string.
pub const LIST_SEPARATOR: &str = " | ";

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($pattern).expect("hard-coded regex is valid"));
    };
}

regex!(WHITESPACE_RUN, r"\s+");
regex!(DRIVE_LETTER, r"[a-zA-Z]:");
regex!(FILE_EXTENSION, r"(?i)\.(csv|txt|xlsx|json|zip)$");
regex!(NON_NAME_CHARS, r"[^a-zA-Z\s]");
regex!(ANY_DIGIT, r"\d");
regex!(NON_INDUSTRY_CHARS, r"[^a-zA-Z\s,&-]");
regex!(INT_RANGE, r"^\d+-\d+$");
regex!(INT_PLUS, r"^\d+\+$");
regex!(SIMPLE_FLOAT, r"^\d+\.\d+$");
regex!(ISO_DATE, r"^\d{4}-\d{2}-\d{2}$");
regex!(GROUPED_RANGE, r"^[\d,]+-[\d,]+$");
regex!(GROUPED_BOUND, r"^[<>][\d,]+$");
regex!(YEAR_MONTH_DATE, r"^\d{4}-\d{2}(-\d{2})?$");
regex!(PHONE_NUMBER, r"^\+\d{7,15}$");

/// Clean a raw cell for the given column.
#[must_use]
pub fn clean(column: ProfileColumn, raw: &str) -> String {
    match column {
        ProfileColumn::FullName => clean_full_name(raw),
        ProfileColumn::JobTitle => clean_job_title(raw),
        ProfileColumn::Industry => clean_industry(raw),
        ProfileColumn::Summary => clean_summary(raw),
        ProfileColumn::LocationCountry => clean_location_country(raw),
        ProfileColumn::Education => clean_education(raw),
        ProfileColumn::Experience => clean_experience(raw),
        ProfileColumn::Skills => clean_skills(raw),
        ProfileColumn::JobSummary => clean_job_summary(raw),
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}

fn looks_structured(text: &str) -> bool {
    text.starts_with('[') || text.starts_with('{')
}

/// Keeps ASCII letters and spaces. File paths and file names are dropped.
#[must_use]
pub fn clean_full_name(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty()
        || text.contains(['\\', '/'])
        || DRIVE_LETTER.is_match(text)
        || FILE_EXTENSION.is_match(text)
    {
        return String::new();
    }
    collapse_whitespace(&NON_NAME_CHARS.replace_all(text, ""))
}

#[must_use]
pub fn clean_job_title(raw: &str) -> String {
    let text = raw.trim();
    if looks_structured(text) {
        return String::new();
    }
    text.to_string()
}

/// Industries are words only: letters, whitespace, `,`, `&` and `-`.
#[must_use]
pub fn clean_industry(raw: &str) -> String {
    let text = raw.trim();
    if looks_structured(text) || ANY_DIGIT.is_match(text) || NON_INDUSTRY_CHARS.is_match(text) {
        return String::new();
    }
    collapse_whitespace(text).trim().to_string()
}

/// Drops company-size bands (`1-10`, `10001+`) and bare floats.
#[must_use]
pub fn clean_summary(raw: &str) -> String {
    let text = raw.trim();
    if looks_structured(text)
        || INT_RANGE.is_match(text)
        || INT_PLUS.is_match(text)
        || SIMPLE_FLOAT.is_match(text)
    {
        return String::new();
    }
    text.to_string()
}

/// Drops dates, salary bands (`55,000-70,000`, `<20,000`), floats and single characters.
#[must_use]
pub fn clean_location_country(raw: &str) -> String {
    let text = raw.trim();
    if looks_structured(text)
        || ISO_DATE.is_match(text)
        || GROUPED_RANGE.is_match(text)
        || GROUPED_BOUND.is_match(text)
        || SIMPLE_FLOAT.is_match(text)
        || text.chars().count() == 1
    {
        return String::new();
    }
    text.to_string()
}

/// Parse a bracketed Python list literal, or `None` if the cell is anything else.
fn parse_list(raw: &str) -> Option<Vec<PyLiteral>> {
    let text = raw.trim();
    if !(text.starts_with('[') && text.ends_with(']')) {
        return None;
    }
    match literal::parse(text) {
        Ok(PyLiteral::List(items)) => Some(items),
        Ok(_) => None,
        Err(e) => {
            tracing::trace!(error = %e, "Unparseable list literal");
            None
        }
    }
}

fn non_blank(value: Option<&PyLiteral>) -> Option<&str> {
    value
        .and_then(PyLiteral::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `school.name` of each entry, joined with ` | `.
#[must_use]
pub fn clean_education(raw: &str) -> String {
    let Some(items) = parse_list(raw) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| non_blank(item.get_path(&["school", "name"])))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// `company.name : title.name` of each entry, joined with ` | `.
#[must_use]
pub fn clean_experience(raw: &str) -> String {
    let Some(items) = parse_list(raw) else {
        return String::new();
    };
    items
        .iter()
        .filter(|item| matches!(item, PyLiteral::Dict(_)))
        .filter_map(|item| {
            let company = non_blank(item.get_path(&["company", "name"]));
            let title = non_blank(item.get_path(&["title", "name"]));
            match (company, title) {
                (Some(company), Some(title)) => Some(format!("{company} : {title}")),
                (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
                (None, None) => None,
            }
        })
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// String items of the list, minus anything that is a phone number.
#[must_use]
pub fn clean_skills(raw: &str) -> String {
    let Some(items) = parse_list(raw) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| non_blank(Some(item)))
        .filter(|skill| !PHONE_NUMBER.is_match(skill))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Drops single characters, bare numbers and `YYYY-MM[-DD]` dates.
#[must_use]
pub fn clean_job_summary(raw: &str) -> String {
    let text = raw.trim();
    if text.chars().count() == 1
        || (!text.is_empty() && text.chars().all(char::is_numeric))
        || YEAR_MONTH_DATE.is_match(text)
    {
        return String::new();
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_empty_for_every_column() {
        for column in ProfileColumn::ALL {
            assert_eq!(clean(column, ""), "", "{column} should clean '' to ''");
            assert_eq!(clean(column, "   \t "), "", "{column} should clean whitespace to ''");
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(clean_full_name("  Randall   Evans "), "Randall Evans");
        assert_eq!(clean_full_name("José O'Brien-Smith"), "Jos OBrienSmith");
        assert_eq!(clean_full_name("C:\\Users\\me\\dump.csv"), "");
        assert_eq!(clean_full_name("data/profiles"), "");
        assert_eq!(clean_full_name("export.JSON"), "");
        assert_eq!(clean_full_name("Note: call back"), "");
        assert_eq!(clean_full_name("12345"), "");
    }

    #[test]
    fn test_job_title() {
        assert_eq!(clean_job_title(" Data Engineer "), "Data Engineer");
        assert_eq!(clean_job_title("[]"), "");
        assert_eq!(clean_job_title("{'a': 1}"), "");
        assert_eq!(clean_job_title("Head of R&D (EMEA)"), "Head of R&D (EMEA)");
    }

    #[test]
    fn test_industry() {
        assert_eq!(clean_industry("Information   Technology & Services"), "Information Technology & Services");
        assert_eq!(clean_industry("Health, Wellness and Fitness"), "Health, Wellness and Fitness");
        assert_eq!(clean_industry("Non-Profit"), "Non-Profit");
        assert_eq!(clean_industry("1-10"), "");
        assert_eq!(clean_industry("Computer Software (B2B)"), "");
        assert_eq!(clean_industry("['Software']"), "");
    }

    #[test]
    fn test_summary() {
        assert_eq!(clean_summary("Builds things."), "Builds things.");
        assert_eq!(clean_summary("1-10"), "");
        assert_eq!(clean_summary("10001+"), "");
        assert_eq!(clean_summary("9.0"), "");
        assert_eq!(clean_summary("{}"), "");
        assert_eq!(clean_summary("Grew team 1-10 people"), "Grew team 1-10 people");
    }

    #[test]
    fn test_location_country() {
        assert_eq!(clean_location_country("United States"), "United States");
        assert_eq!(clean_location_country("2019-04-01"), "");
        assert_eq!(clean_location_country("55,000-70,000"), "");
        assert_eq!(clean_location_country("<20,000"), "");
        assert_eq!(clean_location_country(">250,000"), "");
        assert_eq!(clean_location_country("41.0"), "");
        assert_eq!(clean_location_country("m"), "");
        assert_eq!(clean_location_country("[]"), "");
        assert_eq!(clean_location_country("UK"), "UK");
    }

    #[test]
    fn test_education() {
        let raw = "[{'school': {'name': ' Stanford University ', 'id': 1}}, {'school': {'name': ''}}, {'degrees': ['BSc']}, {'school': {'name': 'MIT'}}]";
        assert_eq!(clean_education(raw), "Stanford University | MIT");
        assert_eq!(clean_education("[]"), "");
        assert_eq!(clean_education("Stanford"), "");
        assert_eq!(clean_education("[{'school': "), "");
        assert_eq!(clean_education("[datetime.date(2020, 1, 1)]"), "");
    }

    #[test]
    fn test_experience() {
        let raw = "[{'company': {'name': 'Acme'}, 'title': {'name': 'Engineer'}}, \
                   {'company': {'name': 'Globex'}}, \
                   {'title': {'name': 'Consultant'}}, \
                   {'company': None, 'title': None}, 'not a dict']";
        assert_eq!(
            clean_experience(raw),
            "Acme : Engineer | Globex | Consultant"
        );
        assert_eq!(clean_experience("{'company': {'name': 'Acme'}}"), "");
    }

    #[test]
    fn test_skills() {
        let raw = "['Python', ' SQL ', '', '+14155552671', 42, 'Machine Learning']";
        assert_eq!(clean_skills(raw), "Python | SQL | Machine Learning");
        assert_eq!(clean_skills("['+123']"), "+123");
        assert_eq!(clean_skills("Python, SQL"), "");
    }

    #[test]
    fn test_job_summary() {
        assert_eq!(clean_job_summary("Leads the data team."), "Leads the data team.");
        assert_eq!(clean_job_summary("x"), "");
        assert_eq!(clean_job_summary("2020"), "");
        assert_eq!(clean_job_summary("١٢٣"), "");
        assert_eq!(clean_job_summary("２０２０"), "");
        assert_eq!(clean_job_summary("2020-05"), "");
        assert_eq!(clean_job_summary("2020-05-17"), "");
        assert_eq!(clean_job_summary("2020-05-17 started"), "2020-05-17 started");
    }

    #[test]
    fn test_cleaners_are_stable_on_text_columns() {
        let samples = ["Randall Evans", "Software Engineer", "Computer Software", "Great summary"];
        for column in [
            ProfileColumn::FullName,
            ProfileColumn::JobTitle,
            ProfileColumn::Industry,
            ProfileColumn::Summary,
        ] {
            for sample in samples {
                let once = clean(column, sample);
                assert_eq!(clean(column, &once), once, "{column} not stable on {sample:?}");
            }
        }
    }
}
