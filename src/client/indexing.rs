//! Indexing orchestrator
//!
//! One run walks the root, chunks each file, gates chunks through the
//! store-resident fingerprint check, embeds and analyzes what changed, and
//! upserts per file. File- and chunk-level failures are counted and the run
//! continues; failures to reach the vector store end the run as failed with
//! the counts accumulated so far. Cancellation is cooperative and checked
//! between files and between embedding batches.

use super::ScoutClient;
use crate::analysis::ChunkAnalysis;
use crate::error::{ConfigError, IndexingError, ScoutError};
use crate::fingerprint::{Fingerprint, PAYLOAD_SCHEMA_VERSION, point_id};
use crate::indexer::filters::PathFilters;
use crate::indexer::{Chunk, Chunker, FileWalker};
use crate::paths::normalize_root;
use crate::types::{IndexReport, IndexRequest, RunFailure, RunState};
use crate::vector_db::{IndexedPoint, PointFilter, PointPayload};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-run settings after merging request overrides with configuration
struct RunSettings {
    chunk_size: usize,
    overlap: usize,
    max_file_size: usize,
    max_depth: usize,
}

/// Removes the root from the active set when the run ends, however it ends
struct RunGuard {
    root: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    fn acquire(active: &Arc<Mutex<HashSet<String>>>, root: &str) -> Result<Self, ScoutError> {
        let mut set = active
            .lock()
            .map_err(|_| ScoutError::other("active-run set poisoned"))?;
        if !set.insert(root.to_string()) {
            return Err(IndexingError::RunInProgress(root.to_string()).into());
        }
        Ok(Self {
            root: root.to_string(),
            active: Arc::clone(active),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.active.lock() {
            set.remove(&self.root);
        }
    }
}

impl ScoutClient {
    /// Index the codebase at `request.path`.
    pub async fn index_codebase(&self, request: IndexRequest) -> Result<IndexReport, ScoutError> {
        self.index_codebase_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Index with an external cancellation token.
    ///
    /// Request validation errors and a run already in progress on the same
    /// root surface as errors; everything after that point produces a report.
    /// Cancellation and storage failures end the run early with the counts
    /// accumulated so far.
    pub async fn index_codebase_with_cancellation(
        &self,
        request: IndexRequest,
        cancel: CancellationToken,
    ) -> Result<IndexReport, ScoutError> {
        request.validate()?;
        let root_id = normalize_root(&request.path)?;

        let indexing = &self.config.indexing;
        let settings = RunSettings {
            chunk_size: request.chunk_size.unwrap_or(indexing.chunk_size),
            overlap: request.overlap.unwrap_or(indexing.overlap),
            max_file_size: request.max_file_size.unwrap_or(indexing.max_file_size),
            max_depth: request.max_depth.unwrap_or(indexing.max_depth),
        };
        if settings.overlap >= settings.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({} >= {})",
                    settings.overlap, settings.chunk_size
                ),
            }
            .into());
        }

        let include = if request.include_patterns.is_empty() {
            indexing.include_patterns.clone()
        } else {
            request.include_patterns.clone()
        };
        let exclude: Vec<String> = indexing
            .exclude_patterns
            .iter()
            .chain(request.exclude_patterns.iter())
            .cloned()
            .collect();
        let filters = PathFilters::build(&include, &exclude)?;

        let _guard = RunGuard::acquire(&self.active_roots, &root_id)?;
        let started = Instant::now();
        tracing::info!("Indexing {} (chunk {} / overlap {})", root_id, settings.chunk_size, settings.overlap);

        let mut report = IndexReport {
            root: root_id.clone(),
            state: RunState::Completed,
            files_scanned: 0,
            files_skipped: 0,
            chunks_embedded: 0,
            chunks_skipped: 0,
            chunks_pruned: 0,
            errors: Vec::new(),
            failure: None,
            duration_ms: 0,
        };

        match self
            .run_index(&root_id, &settings, filters, &cancel, &mut report)
            .await
        {
            Ok(()) => {}
            Err(ScoutError::Indexing(IndexingError::Cancelled)) => {
                tracing::info!("Indexing run for {} cancelled", root_id);
                report.state = RunState::Cancelled;
                report.failure = Some(RunFailure {
                    kind: "cancelled".to_string(),
                    message: "indexing was cancelled".to_string(),
                });
            }
            Err(e) => {
                tracing::error!("Indexing run for {} failed: {}", root_id, e);
                report.state = RunState::Failed;
                report.failure = Some(RunFailure {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexing {}: {:?} ({} embedded, {} unchanged, {} pruned, {} errors, {} ms)",
            root_id,
            report.state,
            report.chunks_embedded,
            report.chunks_skipped,
            report.chunks_pruned,
            report.errors.len(),
            report.duration_ms
        );
        Ok(report)
    }

    async fn run_index(
        &self,
        root_id: &str,
        settings: &RunSettings,
        filters: PathFilters,
        cancel: &CancellationToken,
        report: &mut IndexReport,
    ) -> Result<(), ScoutError> {
        self.store.ensure_collection().await?;

        // Bridge the async token into a flag the blocking walker can poll
        let cancelled_flag = Arc::new(AtomicBool::new(false));
        let bridge = {
            let flag = Arc::clone(&cancelled_flag);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                flag.store(true, Ordering::Relaxed);
            })
        };

        let walker = FileWalker::new(
            root_id,
            settings.max_file_size,
            settings.max_depth,
            filters,
        )
        .with_cancellation_flag(cancelled_flag);

        let walk_result = tokio::task::spawn_blocking(move || walker.walk())
            .await
            .map_err(|e| ScoutError::other(format!("walk task panicked: {}", e)));
        bridge.abort();
        let outcome = walk_result??;

        report.files_scanned = outcome.files.len();
        report.files_skipped = outcome.skipped;

        let chunker = Chunker::new(settings.chunk_size, settings.overlap);

        for file in outcome.files {
            if cancel.is_cancelled() {
                return Err(IndexingError::Cancelled.into());
            }

            let chunks = chunker.chunk_file(&file);
            if chunks.is_empty() {
                continue;
            }
            let total_chunks = chunks.len();

            let fingerprints: Vec<Fingerprint> = chunks
                .iter()
                .map(|c| Fingerprint::new(root_id, &c.relative_path, c.sequence, &c.text))
                .collect();

            // Also probe the slot one past the end: if it is stored, a longer
            // previous version left trailing points behind, and they must be
            // pruned even when every surviving chunk is unchanged
            let tail_probe = point_id(root_id, &file.relative_path, total_chunks);
            let mut ids: Vec<String> =
                fingerprints.iter().map(|f| f.point_id.clone()).collect();
            ids.push(tail_probe.clone());
            let stored = self.store.retrieve_identities(ids).await?;

            if stored.contains_key(&tail_probe) {
                let pruned = self
                    .store
                    .delete_matching(
                        &PointFilter::for_root(root_id)
                            .with_file_path(file.relative_path.clone())
                            .with_min_chunk_index(total_chunks),
                    )
                    .await?;
                report.chunks_pruned += pruned;
            }

            let mut changed: Vec<(Chunk, Fingerprint)> = chunks
                .into_iter()
                .zip(fingerprints)
                .filter(|(_, fp)| fp.has_changed(stored.get(&fp.point_id)))
                .collect();
            report.chunks_skipped += total_chunks - changed.len();
            if changed.is_empty() {
                continue;
            }

            // Embed the changed chunks in provider-sized batches; a failed
            // batch is counted and the rest of the file still proceeds
            let batch_size = self.config.embedding.batch_size.max(1);
            let mut embedded: Vec<(Chunk, Fingerprint, Vec<f32>)> =
                Vec::with_capacity(changed.len());
            while !changed.is_empty() {
                if cancel.is_cancelled() {
                    return Err(IndexingError::Cancelled.into());
                }
                let take = batch_size.min(changed.len());
                let batch: Vec<(Chunk, Fingerprint)> = changed.drain(..take).collect();
                let texts: Vec<String> = batch.iter().map(|(c, _)| c.text.clone()).collect();
                match self.embedding.embed_batch(texts).await {
                    Ok(vectors) => {
                        embedded.extend(
                            batch
                                .into_iter()
                                .zip(vectors)
                                .map(|((chunk, fp), vector)| (chunk, fp, vector)),
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Embedding failed for {}: {}", file.relative_path, e);
                        report.errors.push(format!(
                            "{}: embedding failed for {} chunks: {}",
                            file.relative_path, take, e
                        ));
                    }
                }
            }
            if embedded.is_empty() {
                continue;
            }

            let analyses = self.analyze_chunks(&embedded, &mut report.errors).await;

            let indexed_at = chrono::Utc::now().timestamp();
            let points: Vec<IndexedPoint> = embedded
                .into_iter()
                .zip(analyses)
                .map(|((chunk, fp, vector), analysis)| IndexedPoint {
                    id: fp.point_id.clone(),
                    vector,
                    payload: PointPayload {
                        root_id: root_id.to_string(),
                        file_path: chunk.relative_path,
                        language: chunk.language,
                        chunk_index: chunk.sequence,
                        start_line: chunk.start_line,
                        end_line: chunk.end_line,
                        content: chunk.text,
                        content_hash: fp.content_hash,
                        schema_version: PAYLOAD_SCHEMA_VERSION,
                        indexed_at,
                        analysis,
                    },
                })
                .collect();

            let stored_count = points.len();
            self.store.upsert(points).await?;
            report.chunks_embedded += stored_count;
        }

        Ok(())
    }

    /// Analyze embedded chunks concurrently up to the configured in-flight cap.
    ///
    /// Returns one entry per input chunk, in input order. Analysis failures
    /// degrade inside the gateway; the degraded errors are appended to the
    /// run's error list here.
    async fn analyze_chunks(
        &self,
        embedded: &[(Chunk, Fingerprint, Vec<f32>)],
        errors: &mut Vec<String>,
    ) -> Vec<Option<ChunkAnalysis>> {
        if !self.analysis.is_enabled() || embedded.is_empty() {
            return vec![None; embedded.len()];
        }

        let tasks: Vec<_> = embedded
            .iter()
            .enumerate()
            .map(|(position, (chunk, _, _))| {
                let gateway = Arc::clone(&self.analysis);
                async move {
                    let (analysis, err) =
                        gateway.analyze(&chunk.text, chunk.language.as_deref()).await;
                    (position, chunk.relative_path.as_str(), analysis, err)
                }
            })
            .collect();
        let outcomes: Vec<_> = futures::stream::iter(tasks)
            .buffer_unordered(self.config.indexing.max_in_flight.max(1))
            .collect()
            .await;

        let mut analyses = vec![None; embedded.len()];
        for (position, path, analysis, err) in outcomes {
            if let Some(e) = err {
                errors.push(format!("{}: analysis failed: {}", path, e));
            }
            analyses[position] = Some(analysis);
        }
        analyses
    }
}
