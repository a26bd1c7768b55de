use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProfileColumn;

/// A normalized profile, one per line of the cleaned output.
///
/// Every field holds the output of its column cleaner. List columns
/// (`education`, `experience`, `skills`) are kept flattened with ` | ` here and
/// only split into keyword arrays when turned into a search document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub full_name: String,
    pub job_title: String,
    pub industry: String,
    pub summary: String,
    pub location_country: String,
    pub education: String,
    pub experience: String,
    pub skills: String,
    pub job_summary: String,
}

impl ProfileRecord {
    /// Build a record from cleaned values in [`ProfileColumn::ALL`] order.
    #[must_use]
    pub fn from_values(values: [String; 9]) -> Self {
        let [
            full_name,
            job_title,
            industry,
            summary,
            location_country,
            education,
            experience,
            skills,
            job_summary,
        ] = values;
        Self {
            full_name,
            job_title,
            industry,
            summary,
            location_country,
            education,
            experience,
            skills,
            job_summary,
        }
    }

    #[must_use]
    pub fn get(&self, column: ProfileColumn) -> &str {
        match column {
            ProfileColumn::FullName => &self.full_name,
            ProfileColumn::JobTitle => &self.job_title,
            ProfileColumn::Industry => &self.industry,
            ProfileColumn::Summary => &self.summary,
            ProfileColumn::LocationCountry => &self.location_country,
            ProfileColumn::Education => &self.education,
            ProfileColumn::Experience => &self.experience,
            ProfileColumn::Skills => &self.skills,
            ProfileColumn::JobSummary => &self.job_summary,
        }
    }

    /// True when every field is empty, i.e. nothing in the raw row survived cleaning.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        ProfileColumn::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    /// The deduplication key: full name, job title and industry, lowercased
    /// with whitespace collapsed.
    #[must_use]
    pub fn dedup_key(&self) -> [String; 3] {
        ProfileColumn::DEDUP_KEY.map(|c| {
            self.get(c).split_whitespace().join(" ").to_lowercase()
        })
    }

    /// Split a flattened list column into its keyword values.
    #[must_use]
    pub fn keyword_values(&self, column: ProfileColumn) -> Vec<String> {
        self.get(column)
            .split('|')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// The JSON document stored in the search engine. Text columns are strings,
    /// keyword columns are arrays of exact values.
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        ProfileColumn::ALL
            .iter()
            .map(|&column| {
                let value = if column.is_keyword() {
                    Value::from(self.keyword_values(column))
                } else {
                    Value::from(self.get(column))
                };
                (column.as_str().to_string(), value)
            })
            .collect()
    }
}
