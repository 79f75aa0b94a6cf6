//! A searchable index built from mappings.
//!
//! [`SearchIndex`] owns a Tantivy index, its single writer and a manually reloaded reader.
//! Documents are JSON objects keyed by id; [`SearchIndex::search`] executes a compiled
//! [`SearchPlan`].

use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use log::debug;
use parking_lot::Mutex;
use sift_config::Config;
use serde::Serialize;
use serde_json::{Map, Value, json};
use sift_query::{
    Aggregation, AggregationKind, Compiler, FieldKind, Mappings, SearchPlan, SortOrder,
};
use tantivy::{
    DateTime, DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, Searcher,
    TantivyDocument, TantivyError, Term,
    aggregation::{AggregationCollector, AggregationLimits, agg_req::Aggregations},
    collector::{Count, TopDocs},
    directory::MmapDirectory,
    query::Query,
    schema::Value as _,
    snippet::SnippetGenerator,
};

use crate::{
    IndexError,
    analyzer::AnalyzerRegistry,
    document::{build_document, lookup},
    lower::lower_clause,
    schema::IndexSchema,
};

/// Heap size for the index writer (50 MB).
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Result of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Number of matching documents, regardless of the window.
    pub total: usize,
    /// Highest score among the returned hits, when sorted by score.
    pub max_score: Option<f32>,
    /// Hits in the requested window.
    pub hits: Vec<Hit>,
    /// Aggregation results keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

/// One matching document.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Relevance score; absent when sorting by a field.
    #[serde(rename = "_score")]
    pub score: Option<f32>,
    /// Sort values, when sorting by a field.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    /// The projected source document.
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    /// Requested fields, each as a list of values.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// Highlighted fragments per field.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub highlight: BTreeMap<String, Vec<String>>,
    /// Score explanation.
    #[serde(rename = "_explanation", skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
}

/// An index over JSON documents with a schema derived from mappings.
pub struct SearchIndex {
    /// Reader, reloaded after every commit.
    reader: IndexReader,
    /// The single writer.
    writer: Mutex<IndexWriter>,
    /// Field handles.
    schema: IndexSchema,
    /// Mappings the schema was built from.
    mappings: Mappings,
    /// Analyzers for indexing and query text.
    analyzers: Arc<AnalyzerRegistry>,
}

impl SearchIndex {
    /// Creates an index held in memory.
    pub fn create_in_ram(
        mappings: Mappings,
        analyzers: Arc<AnalyzerRegistry>,
        default_analyzer: &str,
    ) -> Result<Self, IndexError> {
        let schema = IndexSchema::from_mappings(&mappings, &analyzers, default_analyzer)?;
        let index = Index::create_in_ram(schema.schema().clone());
        Self::with_index(index, schema, mappings, analyzers)
    }

    /// Opens the index stored in `path`, creating it when the directory holds none.
    pub fn open_in_dir(
        path: &Path,
        mappings: Mappings,
        analyzers: Arc<AnalyzerRegistry>,
        default_analyzer: &str,
    ) -> Result<Self, IndexError> {
        fs::create_dir_all(path)?;
        let schema = IndexSchema::from_mappings(&mappings, &analyzers, default_analyzer)?;

        let dir = MmapDirectory::open(path).map_err(|e| {
            let err: TantivyError = e.into();
            IndexError::open_index(path.to_path_buf(), &err)
        })?;
        let index = Index::open_or_create(dir, schema.schema().clone())
            .map_err(|e| IndexError::open_index(path.to_path_buf(), &e))?;

        Self::with_index(index, schema, mappings, analyzers)
    }

    /// Opens the index in `path` with the configuration discovered from `path` upwards.
    ///
    /// Analyzers defined in `.sift.toml` are registered and the configured default analyzer
    /// applies to text fields without one. The returned compiler carries the configured search
    /// settings.
    pub fn open_configured(path: &Path, mappings: Mappings) -> Result<(Self, Compiler), IndexError> {
        fs::create_dir_all(path)?;
        let config = Config::load(path)?;
        debug!(
            "opening index at {} with {} configured analyzers",
            path.display(),
            config.analyzers.len()
        );
        let analyzers = Arc::new(AnalyzerRegistry::from_config(&config)?);
        let index = Self::open_in_dir(path, mappings, analyzers, &config.search.default_analyzer)?;
        Ok((index, Compiler::new(config.search)))
    }

    /// Registers analyzers and opens the writer and reader.
    fn with_index(
        index: Index,
        schema: IndexSchema,
        mappings: Mappings,
        analyzers: Arc<AnalyzerRegistry>,
    ) -> Result<Self, IndexError> {
        analyzers.install(index.tokenizers());

        let writer = index
            .writer(WRITER_HEAP_SIZE)
            .map_err(|e| IndexError::write(&e))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::search(&e))?;

        Ok(Self {
            reader,
            writer: Mutex::new(writer),
            schema,
            mappings,
            analyzers,
        })
    }

    /// The field handles of this index.
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// The mappings this index was built from.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// The analyzers this index uses.
    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    /// Stages a document, replacing any earlier document with the same id.
    ///
    /// The document becomes searchable after [`Self::commit`].
    pub fn add_document(&self, id: &str, source: &Value) -> Result<(), IndexError> {
        let doc = build_document(&self.schema, id, source)?;
        let writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.schema.id, id));
        writer.add_document(doc).map_err(|e| IndexError::write(&e))?;
        Ok(())
    }

    /// Stages the removal of a document.
    pub fn delete_document(&self, id: &str) {
        self.writer
            .lock()
            .delete_term(Term::from_field_text(self.schema.id, id));
    }

    /// Commits staged changes and makes them visible to searches.
    pub fn commit(&self) -> Result<(), IndexError> {
        let opstamp = self
            .writer
            .lock()
            .commit()
            .map_err(|e| IndexError::commit(&e))?;
        self.reader.reload().map_err(|e| IndexError::commit(&e))?;
        debug!("committed index at opstamp {opstamp}");
        Ok(())
    }

    /// Number of searchable documents.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Compiles a JSON request against this index's mappings and analyzers, then runs it.
    pub fn query(&self, compiler: &Compiler, request: &Value) -> Result<SearchResponse, IndexError> {
        let plan = compiler.compile(request, &self.mappings, self.analyzers.as_ref())?;
        self.search(&plan)
    }

    /// Executes `plan`.
    ///
    /// Hits are ordered by score, or by a single numeric or date field. Other sorts fail with
    /// [`IndexError::UnsupportedSort`].
    pub fn search(&self, plan: &SearchPlan) -> Result<SearchResponse, IndexError> {
        let lowered = lower_clause(&plan.query, &self.schema, &self.analyzers)?;
        let query = lowered.as_ref();
        let searcher = self.reader.searcher();

        let total = searcher
            .search(query, &Count)
            .map_err(|e| IndexError::search(&e))?;
        let ranked = self.rank(&searcher, query, plan)?;
        debug!(
            "query matched {total} documents, returning {} from offset {}",
            ranked.len(),
            plan.from
        );

        let highlighters = self.highlighters(&searcher, query, plan)?;
        let mut hits = Vec::with_capacity(ranked.len());
        for (score, sort, address) in ranked {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| IndexError::search(&e))?;
            let mut hit = self.hit(&doc, plan, score, sort)?;

            for (name, generator) in &highlighters {
                let mut snippet = generator.snippet_from_doc(&doc);
                if snippet.is_empty() {
                    continue;
                }
                if let Some(spec) = &plan.highlight {
                    snippet.set_snippet_prefix_postfix(spec.pre_tag(), spec.post_tag());
                }
                hit.highlight.insert(name.clone(), vec![snippet.to_html()]);
            }

            if plan.explain {
                let explanation = query
                    .explain(&searcher, address)
                    .map_err(|e| IndexError::search(&e))?;
                hit.explanation =
                    Some(serde_json::to_value(&explanation).map_err(|e| IndexError::search(&e))?);
            }
            hits.push(hit);
        }

        let max_score = hits
            .iter()
            .filter_map(|hit| hit.score)
            .reduce(f32::max);

        let aggregations = if plan.aggregations.is_empty() {
            None
        } else {
            Some(self.aggregate(&searcher, query, &plan.aggregations)?)
        };

        Ok(SearchResponse {
            total,
            max_score,
            hits,
            aggregations,
        })
    }

    /// Collects the requested window as `(score, sort values, address)`.
    fn rank(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        plan: &SearchPlan,
    ) -> Result<Vec<(Option<f32>, Vec<Value>, DocAddress)>, IndexError> {
        if plan.size == 0 {
            return Ok(Vec::new());
        }
        let top = TopDocs::with_limit(plan.size).and_offset(plan.from);

        if plan.sorts_by_score() {
            let docs = searcher.search(query, &top).map_err(|e| IndexError::search(&e))?;
            return Ok(docs
                .into_iter()
                .map(|(score, address)| (Some(score), Vec::new(), address))
                .collect());
        }

        let [sort] = plan.sort.as_slice() else {
            return Err(IndexError::UnsupportedSort(
                "only one sort key is supported".into(),
            ));
        };
        let order = match sort.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        match self.schema.field(&sort.field).map(|(_, kind)| kind) {
            Some(FieldKind::Numeric) => {
                let docs = searcher
                    .search(query, &top.order_by_fast_field::<f64>(&sort.field, order))
                    .map_err(|e| IndexError::search(&e))?;
                Ok(docs
                    .into_iter()
                    .map(|(value, address)| (None, vec![Value::from(value)], address))
                    .collect())
            }
            Some(FieldKind::Date) => {
                let docs = searcher
                    .search(query, &top.order_by_fast_field::<DateTime>(&sort.field, order))
                    .map_err(|e| IndexError::search(&e))?;
                Ok(docs
                    .into_iter()
                    .map(|(value, address)| {
                        (None, vec![Value::from(value.into_timestamp_millis())], address)
                    })
                    .collect())
            }
            _ => Err(IndexError::UnsupportedSort(format!(
                "cannot sort on [{}], only numeric and date fields are sortable",
                sort.field
            ))),
        }
    }

    /// Snippet generators for the highlighted text fields.
    fn highlighters(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        plan: &SearchPlan,
    ) -> Result<Vec<(String, SnippetGenerator)>, IndexError> {
        let Some(spec) = &plan.highlight else {
            return Ok(Vec::new());
        };
        let mut generators = Vec::with_capacity(spec.fields.len());
        for requested in &spec.fields {
            let Some((field, FieldKind::Text)) = self.schema.field(&requested.field) else {
                debug!("[highlight] skipping non-text field [{}]", requested.field);
                continue;
            };
            let mut generator = SnippetGenerator::create(searcher, query, field)
                .map_err(|e| IndexError::search(&e))?;
            generator.set_max_num_chars(requested.fragment_size.unwrap_or(spec.fragment_size));
            generators.push((requested.field.clone(), generator));
        }
        Ok(generators)
    }

    /// Builds a hit from a stored document.
    fn hit(
        &self,
        doc: &TantivyDocument,
        plan: &SearchPlan,
        score: Option<f32>,
        sort: Vec<Value>,
    ) -> Result<Hit, IndexError> {
        let id = doc
            .get_first(self.schema.id)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let stored = doc
            .get_first(self.schema.source)
            .and_then(|v| v.as_str())
            .unwrap_or("{}");
        let document: Value = serde_json::from_str(stored)
            .map_err(|e| IndexError::Document(format!("stored source of [{id}]: {e}")))?;

        let mut fields = Map::new();
        for request in &plan.fields {
            let values = match lookup(&document, &request.field) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
            };
            fields.insert(request.field.clone(), Value::Array(values));
        }

        Ok(Hit {
            id,
            score,
            sort,
            source: plan.source.apply(&document),
            fields,
            highlight: BTreeMap::new(),
            explanation: None,
        })
    }

    /// Runs the aggregations over the matching documents.
    fn aggregate(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        aggregations: &[Aggregation],
    ) -> Result<Value, IndexError> {
        let request = aggregation_request(aggregations);
        let aggs: Aggregations =
            serde_json::from_value(request).map_err(|e| IndexError::search(&e))?;
        let collector = AggregationCollector::from_aggs(aggs, AggregationLimits::default());
        let results = searcher
            .search(query, &collector)
            .map_err(|e| IndexError::search(&e))?;
        serde_json::to_value(results).map_err(|e| IndexError::search(&e))
    }
}

/// Translates aggregations into the JSON request Tantivy deserializes.
fn aggregation_request(aggregations: &[Aggregation]) -> Value {
    let mut request = Map::new();
    for aggregation in aggregations {
        let (name, body) = match &aggregation.kind {
            AggregationKind::Terms { field, size } => {
                ("terms", json!({"field": field, "size": size}))
            }
            AggregationKind::Range { field, ranges } => {
                let ranges: Vec<Value> = ranges
                    .iter()
                    .map(|bucket| {
                        let mut range = Map::new();
                        if let Some(key) = &bucket.key {
                            range.insert("key".into(), Value::from(key.as_str()));
                        }
                        if let Some(from) = bucket.from {
                            range.insert("from".into(), Value::from(from));
                        }
                        if let Some(to) = bucket.to {
                            range.insert("to".into(), Value::from(to));
                        }
                        Value::Object(range)
                    })
                    .collect();
                ("range", json!({"field": field, "ranges": ranges}))
            }
            AggregationKind::Histogram {
                field,
                interval,
                min_doc_count,
            } => (
                "histogram",
                json!({
                    "field": field,
                    "interval": interval,
                    "min_doc_count": min_doc_count
                }),
            ),
            AggregationKind::DateHistogram {
                field,
                fixed_interval,
            } => (
                "date_histogram",
                json!({"field": field, "fixed_interval": fixed_interval}),
            ),
            AggregationKind::Metric { metric, field } => {
                (metric.as_str(), json!({"field": field}))
            }
        };

        let mut entry = Map::new();
        entry.insert(name.to_string(), body);
        if !aggregation.aggregations.is_empty() {
            entry.insert(
                "aggs".to_string(),
                aggregation_request(&aggregation.aggregations),
            );
        }
        request.insert(aggregation.name.clone(), Value::Object(entry));
    }
    Value::Object(request)
}
