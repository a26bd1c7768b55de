//! Validated search requests and the engine payloads built from them.
//!
//! Both endpoint shapes end up as a [`ProfileQuery`]: a list of
//! `(column, value)` clauses combined with OR (simple search) or AND
//! (advanced search). Text columns match analysed terms, keyword columns
//! match exact values.

pub use error::QueryError;
use error::Result;
use itertools::Itertools;
use profile_search_data_processing::ProfileColumn;
use serde_json::{Map, Value, json};

/// Result-size bounds applied to every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 100,
        }
    }
}

impl SearchLimits {
    fn resolve(&self, size: Option<usize>) -> Result<usize> {
        let size = size.unwrap_or(self.default_size);
        if size == 0 || size > self.max_size {
            return Err(QueryError::InvalidSize {
                size,
                max: self.max_size,
            });
        }
        Ok(size)
    }
}

/// How the clauses of a query combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// At least one clause must match.
    Any,
    /// Every clause must match.
    All,
}

/// One query string run across several columns (OR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSearch {
    pub columns: Vec<ProfileColumn>,
    pub query: String,
    pub size: usize,
}

impl SimpleSearch {
    /// Validate a simple search.
    ///
    /// `columns` is a comma separated list of column names. When absent every
    /// column is searched. Repeated columns are collapsed.
    pub fn new(
        query: Option<&str>,
        columns: Option<&str>,
        size: Option<usize>,
        limits: &SearchLimits,
    ) -> Result<Self> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(QueryError::MissingQuery);
        }

        let columns = match columns {
            None => ProfileColumn::ALL.to_vec(),
            Some(list) => {
                let names: Vec<&str> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect();
                let unknown: Vec<&str> = names
                    .iter()
                    .copied()
                    .filter(|name| name.parse::<ProfileColumn>().is_err())
                    .collect();
                if !unknown.is_empty() {
                    return Err(QueryError::UnknownColumns(unknown.join(", ")));
                }
                names
                    .iter()
                    .filter_map(|name| name.parse::<ProfileColumn>().ok())
                    .unique()
                    .collect()
            }
        };
        if columns.is_empty() {
            return Err(QueryError::NoColumns);
        }

        Ok(Self {
            columns,
            query: query.to_string(),
            size: limits.resolve(size)?,
        })
    }
}

/// Per-column values that must all match (AND).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedSearch {
    /// Provided fields in canonical column order.
    pub fields: Vec<(ProfileColumn, String)>,
    pub size: usize,
}

impl AdvancedSearch {
    /// Validate an advanced search body.
    ///
    /// Keys must be profile column names and values strings. `null` and blank
    /// strings count as not provided.
    pub fn from_json(body: &Map<String, Value>, size: Option<usize>, limits: &SearchLimits) -> Result<Self> {
        let mut fields = Vec::with_capacity(body.len());
        for (key, value) in body {
            let column: ProfileColumn = key
                .parse()
                .map_err(|_| QueryError::UnknownField(key.clone()))?;
            match value {
                Value::Null => {}
                Value::String(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        fields.push((column, text.to_string()));
                    }
                }
                _ => return Err(QueryError::NonStringValue(key.clone())),
            }
        }
        fields.sort_by_key(|(column, _)| *column);

        Ok(Self {
            fields,
            size: limits.resolve(size)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A validated search, ready to hand to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileQuery {
    Simple(SimpleSearch),
    Advanced(AdvancedSearch),
}

impl From<SimpleSearch> for ProfileQuery {
    fn from(search: SimpleSearch) -> Self {
        Self::Simple(search)
    }
}

impl From<AdvancedSearch> for ProfileQuery {
    fn from(search: AdvancedSearch) -> Self {
        Self::Advanced(search)
    }
}

impl ProfileQuery {
    pub const fn combinator(&self) -> Combinator {
        match self {
            Self::Simple(_) => Combinator::Any,
            Self::Advanced(_) => Combinator::All,
        }
    }

    pub const fn size(&self) -> usize {
        match self {
            Self::Simple(search) => search.size,
            Self::Advanced(search) => search.size,
        }
    }

    /// The `(column, value)` clauses of the query.
    pub fn clauses(&self) -> Vec<(ProfileColumn, &str)> {
        match self {
            Self::Simple(search) => search
                .columns
                .iter()
                .map(|&column| (column, search.query.as_str()))
                .collect(),
            Self::Advanced(search) => search
                .fields
                .iter()
                .map(|(column, value)| (*column, value.as_str()))
                .collect(),
        }
    }

    /// An advanced search with no fields selects nothing; engines are not asked.
    pub fn matches_nothing(&self) -> bool {
        matches!(self, Self::Advanced(search) if search.is_empty())
    }

    /// Text columns referenced by the query, the ones that get highlights.
    pub fn highlight_columns(&self) -> Vec<ProfileColumn> {
        self.clauses()
            .into_iter()
            .map(|(column, _)| column)
            .filter(|column| !column.is_keyword())
            .unique()
            .collect()
    }

    /// The `_search` request body for Elasticsearch.
    pub fn to_elasticsearch_body(&self) -> Value {
        let clauses: Vec<Value> = self
            .clauses()
            .into_iter()
            .map(|(column, value)| clause_json(column, value))
            .collect();

        let bool_query = match self.combinator() {
            Combinator::Any => json!({ "should": clauses, "minimum_should_match": 1 }),
            Combinator::All => json!({ "must": clauses }),
        };

        let highlight_fields: Map<String, Value> = self
            .highlight_columns()
            .into_iter()
            .map(|column| (column.as_str().to_string(), json!({})))
            .collect();

        json!({
            "query": { "bool": bool_query },
            "highlight": {
                "fields": highlight_fields,
                "pre_tags": ["<em>"],
                "post_tags": ["</em>"],
            },
            "size": self.size(),
        })
    }
}

fn clause_json(column: ProfileColumn, value: &str) -> Value {
    let operator = if column.is_keyword() { "term" } else { "match" };
    json!({ operator: { column.as_str(): value } })
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum QueryError {
        #[error("query parameter 'q' is required and may not be blank")]
        MissingQuery,
        #[error("unknown columns: {0}")]
        UnknownColumns(String),
        #[error("at least one column must be searched")]
        NoColumns,
        #[error("size must be between 1 and {max}, got {size}")]
        InvalidSize { size: usize, max: usize },
        #[error("unknown field '{0}'")]
        UnknownField(String),
        #[error("field '{0}' must be a string")]
        NonStringValue(String),
    }
    pub type Result<T> = std::result::Result<T, QueryError>;
}
