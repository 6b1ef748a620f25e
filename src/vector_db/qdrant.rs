//! Qdrant-backed vector store
//!
//! Points are addressed by deterministic UUIDs so an upsert for a changed
//! chunk overwrites the previous vector in place. The collection is created
//! on first use; an existing collection is verified against the configured
//! dimension and distance metric and a mismatch is refused rather than
//! silently written into.

use super::{
    CollectionStats, IndexedPoint, PointFilter, PointPayload, ScoredChunk, VectorStore,
    normalized_score,
};
use crate::analysis::ChunkAnalysis;
use crate::config::{DistanceMetric, VectorStoreConfig};
use crate::error::{ScoutError, StoreError};
use crate::fingerprint::StoredIdentity;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsBackend;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetPointsBuilder, ListValue, PointId, PointStruct, Range, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParams, VectorsConfig,
};
use std::collections::{HashMap, HashSet};

const SCROLL_PAGE_SIZE: u32 = 256;

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
    distance: DistanceMetric,
}

impl QdrantStore {
    /// Build a client for the configured Qdrant endpoint.
    ///
    /// No request is made here; connectivity problems surface on the first
    /// operation.
    pub fn connect(config: &VectorStoreConfig) -> Result<Self, ScoutError> {
        tracing::info!("Connecting to Qdrant at {}", config.url);

        let client = Qdrant::from_url(&config.url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection_name.clone(),
            dimension: config.dimension,
            distance: config.distance,
        })
    }

    async fn collection_exists(&self) -> Result<bool, StoreError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    fn qdrant_distance(&self) -> Distance {
        match self.distance {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclid => Distance::Euclid,
        }
    }

    /// Compare an existing collection's vector params against configuration.
    async fn verify_collection(&self) -> Result<(), StoreError> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|backend| match backend {
                VectorsBackend::Params(params) => Some(params),
                _ => None,
            });

        let Some(params) = params else {
            tracing::warn!(
                "Could not read vector params for collection '{}', skipping verification",
                self.collection
            );
            return Ok(());
        };

        let expected = self.qdrant_distance();
        let actual = Distance::try_from(params.distance).ok();

        if params.size != self.dimension as u64 || actual != Some(expected) {
            return Err(StoreError::SchemaMismatch {
                collection: self.collection.clone(),
                expected_dimension: self.dimension as u64,
                actual_dimension: params.size,
                expected_distance: distance_label(Some(expected)),
                actual_distance: distance_label(actual),
            });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<(), ScoutError> {
        if self.collection_exists().await? {
            tracing::debug!("Collection '{}' already exists, verifying", self.collection);
            self.verify_collection().await?;
            return Ok(());
        }

        tracing::info!(
            "Creating collection '{}' ({} dimensions, {})",
            self.collection,
            self.dimension,
            self.distance
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(VectorsConfig {
                    config: Some(VectorsBackend::Params(VectorParams {
                        size: self.dimension as u64,
                        distance: self.qdrant_distance().into(),
                        ..Default::default()
                    })),
                }),
            )
            .await
            .map_err(|e| StoreError::CollectionCreationFailed {
                collection: self.collection.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexedPoint>) -> Result<(), ScoutError> {
        if points.is_empty() {
            return Ok(());
        }

        tracing::debug!("Upserting {} points", points.len());

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| PointStruct::new(p.id, p.vector, payload_to_map(&p.payload)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| StoreError::UpsertFailed(e.to_string()))?;

        Ok(())
    }

    async fn retrieve_identities(
        &self,
        ids: Vec<String>,
    ) -> Result<HashMap<String, StoredIdentity>, ScoutError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let point_ids: Vec<PointId> = ids.into_iter().map(PointId::from).collect();

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, point_ids)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| StoreError::RetrieveFailed(e.to_string()))?;

        let mut identities = HashMap::new();
        for point in response.result {
            let Some(id) = point.id.and_then(point_id_string) else {
                continue;
            };
            let Some(content_hash) = extract_string(point.payload.get("content_hash")) else {
                continue;
            };
            let schema_version = extract_integer(point.payload.get("schema_version")) as u64;
            identities.insert(
                id,
                StoredIdentity {
                    content_hash,
                    schema_version,
                },
            );
        }

        Ok(identities)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredChunk>, ScoutError> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector, limit as u64).with_payload(true);

        if let Some(qdrant_filter) = to_qdrant_filter(filter) {
            builder = builder.filter(qdrant_filter);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| StoreError::SearchFailed(e.to_string()))?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.and_then(point_id_string)?;
                let payload = payload_from_map(&point.payload).or_else(|| {
                    tracing::warn!("Dropping search hit {} with malformed payload", id);
                    None
                })?;
                Some(ScoredChunk {
                    id,
                    score: normalized_score(self.distance, point.score),
                    payload,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn delete_matching(&self, filter: &PointFilter) -> Result<usize, ScoutError> {
        let qdrant_filter = to_qdrant_filter(filter).unwrap_or_default();

        // Qdrant does not report how many points a delete removed, so count
        // the matches first.
        let counted = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(qdrant_filter.clone())
                    .exact(true),
            )
            .await
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))?;

        let removed = counted.result.map(|r| r.count as usize).unwrap_or(0);
        if removed == 0 {
            return Ok(0);
        }

        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(qdrant_filter))
            .await
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))?;

        tracing::debug!("Deleted {} points", removed);
        Ok(removed)
    }

    async fn stats(&self, filter: &PointFilter) -> Result<CollectionStats, ScoutError> {
        let mut chunks = 0usize;
        let mut files: HashSet<String> = HashSet::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(true)
                .with_vectors(false);

            if let Some(qdrant_filter) = to_qdrant_filter(filter) {
                builder = builder.filter(qdrant_filter);
            }
            if let Some(page_offset) = offset.take() {
                builder = builder.offset(page_offset);
            }

            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| StoreError::StatsFailed(e.to_string()))?;

            for point in &response.result {
                chunks += 1;
                if let Some(path) = extract_string(point.payload.get("file_path")) {
                    files.insert(path);
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(CollectionStats {
            indexed_files: files.len(),
            indexed_chunks: chunks,
        })
    }
}

fn distance_label(distance: Option<Distance>) -> String {
    match distance {
        Some(Distance::Cosine) => "cosine".to_string(),
        Some(Distance::Dot) => "dot".to_string(),
        Some(Distance::Euclid) => "euclid".to_string(),
        Some(other) => format!("{:?}", other).to_lowercase(),
        None => "unknown".to_string(),
    }
}

fn point_id_string(id: PointId) -> Option<String> {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => Some(uuid),
        Some(PointIdOptions::Num(num)) => Some(num.to_string()),
        None => None,
    }
}

/// Translate a metadata filter into Qdrant must-conditions.
fn to_qdrant_filter(filter: &PointFilter) -> Option<Filter> {
    let mut must = Vec::new();

    if let Some(root_id) = &filter.root_id {
        must.push(Condition::matches("root_id", root_id.clone()));
    }
    if let Some(file_path) = &filter.file_path {
        must.push(Condition::matches("file_path", file_path.clone()));
    }
    if let Some(language) = &filter.language {
        must.push(Condition::matches("language", language.clone()));
    }
    if let Some(min) = filter.min_chunk_index {
        must.push(Condition::range(
            "chunk_index",
            Range {
                gte: Some(min as f64),
                ..Default::default()
            },
        ));
    }

    if must.is_empty() {
        None
    } else {
        Some(Filter::must(must))
    }
}

/// Flatten a payload into Qdrant's value map.
///
/// Analysis fields are stored under `analysis_*` keys so they stay filterable
/// and the map remains one level deep.
fn payload_to_map(payload: &PointPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();

    map.insert("root_id".to_string(), Value::from(payload.root_id.clone()));
    map.insert(
        "file_path".to_string(),
        Value::from(payload.file_path.clone()),
    );
    map.insert(
        "chunk_index".to_string(),
        Value::from(payload.chunk_index as i64),
    );
    map.insert(
        "start_line".to_string(),
        Value::from(payload.start_line as i64),
    );
    map.insert("end_line".to_string(), Value::from(payload.end_line as i64));
    map.insert("content".to_string(), Value::from(payload.content.clone()));
    map.insert(
        "content_hash".to_string(),
        Value::from(payload.content_hash.clone()),
    );
    map.insert(
        "schema_version".to_string(),
        Value::from(payload.schema_version as i64),
    );
    map.insert("indexed_at".to_string(), Value::from(payload.indexed_at));

    if let Some(language) = &payload.language {
        map.insert("language".to_string(), Value::from(language.clone()));
    }

    if let Some(analysis) = &payload.analysis {
        map.insert(
            "analysis_summary".to_string(),
            Value::from(analysis.summary.clone()),
        );
        map.insert(
            "analysis_purpose".to_string(),
            Value::from(analysis.purpose.clone()),
        );
        map.insert(
            "analysis_complexity".to_string(),
            Value::from(analysis.complexity_score as i64),
        );
        let entities = analysis
            .entities
            .iter()
            .map(|e| Value::from(e.clone()))
            .collect();
        map.insert(
            "analysis_entities".to_string(),
            Value {
                kind: Some(Kind::ListValue(ListValue { values: entities })),
            },
        );
    }

    map
}

/// Rebuild a payload from a stored value map.
///
/// Returns None when the identity fields are missing, which indicates a point
/// written by something other than this pipeline.
fn payload_from_map(map: &HashMap<String, Value>) -> Option<PointPayload> {
    let root_id = extract_string(map.get("root_id"))?;
    let file_path = extract_string(map.get("file_path"))?;
    let content = extract_string(map.get("content"))?;

    let analysis = extract_string(map.get("analysis_summary")).map(|summary| ChunkAnalysis {
        summary,
        purpose: extract_string(map.get("analysis_purpose")).unwrap_or_default(),
        complexity_score: extract_integer(map.get("analysis_complexity")).max(1) as u32,
        entities: extract_string_list(map.get("analysis_entities")),
    });

    Some(PointPayload {
        root_id,
        file_path,
        language: extract_string(map.get("language")),
        chunk_index: extract_integer(map.get("chunk_index")) as usize,
        start_line: extract_integer(map.get("start_line")) as usize,
        end_line: extract_integer(map.get("end_line")) as usize,
        content,
        content_hash: extract_string(map.get("content_hash")).unwrap_or_default(),
        schema_version: extract_integer(map.get("schema_version")) as u64,
        indexed_at: extract_integer(map.get("indexed_at")),
        analysis,
    })
}

fn extract_string(value: Option<&Value>) -> Option<String> {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn extract_integer(value: Option<&Value>) -> i64 {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i,
        _ => 0,
    }
}

fn extract_string_list(value: Option<&Value>) -> Vec<String> {
    match value.and_then(|v| v.kind.as_ref()) {
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .filter_map(|v| match &v.kind {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(analysis: Option<ChunkAnalysis>) -> PointPayload {
        PointPayload {
            root_id: "/repo".to_string(),
            file_path: "src/main.rs".to_string(),
            language: Some("rust".to_string()),
            chunk_index: 2,
            start_line: 161,
            end_line: 250,
            content: "fn main() {}".to_string(),
            content_hash: "abc123".to_string(),
            schema_version: 1,
            indexed_at: 1_700_000_000,
            analysis,
        }
    }

    #[test]
    fn test_payload_roundtrip_without_analysis() {
        let original = sample_payload(None);
        let map = payload_to_map(&original);
        let restored = payload_from_map(&map).unwrap();
        assert_eq!(restored, original);
        assert!(!map.contains_key("analysis_summary"));
    }

    #[test]
    fn test_payload_roundtrip_with_analysis() {
        let original = sample_payload(Some(ChunkAnalysis {
            summary: "Program entry point".to_string(),
            purpose: "declarations and logic (rust source)".to_string(),
            complexity_score: 2,
            entities: vec!["main".to_string()],
        }));
        let map = payload_to_map(&original);
        let restored = payload_from_map(&map).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_payload_without_language_omits_key() {
        let mut original = sample_payload(None);
        original.language = None;
        let map = payload_to_map(&original);
        assert!(!map.contains_key("language"));
        let restored = payload_from_map(&map).unwrap();
        assert!(restored.language.is_none());
    }

    #[test]
    fn test_foreign_payload_is_rejected() {
        let mut map = HashMap::new();
        map.insert("something".to_string(), Value::from("else".to_string()));
        assert!(payload_from_map(&map).is_none());
    }

    #[test]
    fn test_empty_filter_translates_to_none() {
        assert!(to_qdrant_filter(&PointFilter::default()).is_none());
    }

    #[test]
    fn test_filter_conditions_are_conjunctive() {
        let filter = PointFilter::for_root("/repo")
            .with_language("rust")
            .with_min_chunk_index(5);
        let qdrant_filter = to_qdrant_filter(&filter).unwrap();
        assert_eq!(qdrant_filter.must.len(), 3);
    }

    #[test]
    fn test_point_id_string_forms() {
        let uuid = PointId::from("4a3c-uuid".to_string());
        assert_eq!(point_id_string(uuid), Some("4a3c-uuid".to_string()));

        let num = PointId::from(42u64);
        assert_eq!(point_id_string(num), Some("42".to_string()));
    }
}
