//! Local tantivy index with the same mapping as the Elasticsearch index.

use std::ops::Range;
use std::path::Path;

use profile_search_data_processing::{ProfileColumn, ProfileRecord};
use serde_json::{Map, Value};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, EmptyQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder, TEXT, Value as _};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::TokenStream as _;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, instrument, trace, warn};

use super::{BulkOutcome, Result, SearchHits};
use crate::query::{Combinator, ProfileQuery};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Text columns use the `default` tokenizer with positions, list columns the
/// `raw` tokenizer (one exact term per value). Everything is stored so hits can
/// be returned without a second lookup.
fn profile_schema() -> Schema {
    let mut schema_builder = SchemaBuilder::new();
    for column in ProfileColumn::ALL {
        if column.is_keyword() {
            schema_builder.add_text_field(column.as_str(), STRING | STORED);
        } else {
            schema_builder.add_text_field(column.as_str(), TEXT | STORED);
        }
    }
    schema_builder.build()
}

#[derive(Clone)]
pub struct EmbeddedEngine {
    index: Index,
    reader: IndexReader,
    fields: [Field; 9],
}

impl std::fmt::Debug for EmbeddedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedEngine")
            .field("num_docs", &self.reader.searcher().num_docs())
            .finish_non_exhaustive()
    }
}

impl EmbeddedEngine {
    /// Open the index in `dir`, creating the directory and an empty index if needed.
    #[instrument(name = "Open embedded index", level = "info", fields(path = %dir.display()))]
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let index = Index::open_or_create(MmapDirectory::open(dir)?, profile_schema())?;
        Self::from_index(index)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_index(Index::create_in_ram(profile_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        let mut fields = [Field::from_field_id(0); 9];
        for (slot, column) in fields.iter_mut().zip(ProfileColumn::ALL) {
            *slot = schema.get_field(column.as_str())?;
        }

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        let engine = Self {
            index,
            reader,
            fields,
        };
        info!(num_docs = engine.reader.searcher().num_docs(), "Embedded index ready");
        Ok(engine)
    }

    fn field(&self, column: ProfileColumn) -> Field {
        self.fields[column as usize]
    }

    fn writer(&self) -> Result<IndexWriter> {
        Ok(self.index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?)
    }

    #[instrument(name = "Recreate embedded index", skip(self))]
    pub fn recreate_index(&self) -> Result<()> {
        let mut writer = self.writer()?;
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        info!("Embedded index cleared");
        Ok(())
    }

    fn to_tantivy_document(&self, record: &ProfileRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        for column in ProfileColumn::ALL {
            let field = self.field(column);
            if column.is_keyword() {
                for value in record.keyword_values(column) {
                    doc.add_text(field, value);
                }
            } else {
                doc.add_text(field, record.get(column));
            }
        }
        doc
    }

    #[instrument(name = "Embedded bulk index", skip_all, level = "debug", fields(batch = records.len()))]
    pub fn index_documents(&self, records: &[ProfileRecord]) -> Result<BulkOutcome> {
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let mut writer = self.writer()?;
        let mut outcome = BulkOutcome::default();
        for record in records {
            match writer.add_document(self.to_tantivy_document(record)) {
                Ok(_) => outcome.indexed += 1,
                Err(e) => {
                    warn!(error = ?e, "Document rejected");
                    outcome.failed += 1;
                }
            }
        }
        writer.commit()?;
        Ok(outcome)
    }

    pub fn refresh(&self) -> Result<()> {
        self.reader.reload()?;
        debug!(num_docs = self.reader.searcher().num_docs(), "Embedded index refreshed");
        Ok(())
    }

    pub fn health(&self) -> Result<()> {
        debug!(num_docs = self.reader.searcher().num_docs(), "Embedded index healthy");
        Ok(())
    }

    /// One clause per `(column, value)`: the analysed terms of a text column
    /// (any term may match), one exact term for a keyword column. Values are
    /// plain text, never query syntax.
    fn clause(&self, column: ProfileColumn, value: &str) -> Result<Box<dyn Query>> {
        let field = self.field(column);
        if column.is_keyword() {
            return Ok(Box::new(TermQuery::new(
                Term::from_field_text(field, value),
                IndexRecordOption::Basic,
            )));
        }

        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut terms: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        analyzer.token_stream(value).process(&mut |token| {
            let term = Term::from_field_text(field, &token.text);
            terms.push((
                Occur::Should,
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
            ));
        });
        Ok(match terms.len() {
            0 => {
                debug!(column = %column, "No terms after analysis");
                Box::new(EmptyQuery)
            }
            1 => terms.remove(0).1,
            _ => Box::new(BooleanQuery::new(terms)),
        })
    }

    fn build_query(&self, query: &ProfileQuery) -> Result<BooleanQuery> {
        let occur = match query.combinator() {
            Combinator::Any => Occur::Should,
            Combinator::All => Occur::Must,
        };
        let clauses = query
            .clauses()
            .into_iter()
            .map(|(column, value)| Ok((occur, self.clause(column, value)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(BooleanQuery::new(clauses))
    }

    fn to_json_document(&self, doc: &TantivyDocument) -> Map<String, Value> {
        ProfileColumn::ALL
            .iter()
            .map(|&column| {
                let mut values = doc.get_all(self.field(column)).filter_map(|v| v.as_str());
                let value = if column.is_keyword() {
                    Value::from(values.map(str::to_string).collect::<Vec<_>>())
                } else {
                    Value::from(values.next().unwrap_or_default())
                };
                (column.as_str().to_string(), value)
            })
            .collect()
    }

    #[instrument(name = "Embedded search", skip_all, level = "debug", fields(size = query.size()))]
    pub fn search(&self, query: &ProfileQuery) -> Result<SearchHits> {
        if query.matches_nothing() {
            return Ok(SearchHits::default());
        }
        let tantivy_query = self.build_query(query)?;
        trace!(?tantivy_query, "Final query constructed");

        let searcher = self.reader.searcher();
        let t_search = std::time::Instant::now();
        let (top_docs, total) =
            searcher.search(&tantivy_query, &(TopDocs::with_limit(query.size().max(1)), Count))?;
        debug!(
            total,
            returned = top_docs.len(),
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Tantivy search execution complete"
        );

        let mut generators = Vec::new();
        for column in query.highlight_columns() {
            let generator = SnippetGenerator::create(&searcher, &tantivy_query, self.field(column))?;
            generators.push((column, generator));
        }

        let mut results = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let mut json = self.to_json_document(&doc);

            let highlight: Map<String, Value> = generators
                .iter()
                .filter_map(|(column, generator)| {
                    let snippet = generator.snippet_from_doc(&doc);
                    if snippet.highlighted().is_empty() {
                        return None;
                    }
                    let fragment = emphasize(snippet.fragment(), snippet.highlighted());
                    Some((column.as_str().to_string(), Value::from(vec![fragment])))
                })
                .collect();
            if !highlight.is_empty() {
                json.insert("_highlight".to_string(), Value::Object(highlight));
            }
            results.push(json);
        }

        Ok(SearchHits {
            total: total as u64,
            results,
        })
    }
}

/// Wrap each highlighted byte range of `fragment` in `<em>` tags.
fn emphasize(fragment: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(fragment.len() + ranges.len() * 9);
    let mut last = 0;
    for range in ranges {
        if range.start < last || range.end > fragment.len() {
            continue;
        }
        out.push_str(&fragment[last..range.start]);
        out.push_str("<em>");
        out.push_str(&fragment[range.clone()]);
        out.push_str("</em>");
        last = range.end;
    }
    out.push_str(&fragment[last..]);
    out
}
