// LLM Analyzer
// Chunked generative-model analysis of a document:
// - fixed-size chunks sent concurrently under a semaphore
// - per-chunk timeout; transport failures drop the chunk
// - unparseable responses replaced by a deterministic mock

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{ChunkAnalysis, Evidence, Highlight, PartialResult, Provider};
use crate::services::providers::TextGenerator;
use crate::services::text_processor::chunk_text;

use super::response_parser::{parse_chunk_response, ChunkParse};

pub const DEFAULT_CHUNK_CHARS: usize = 2500;
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
pub const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 25;

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an academic integrity reviewer. For the passage you are given, estimate:
1. how likely it is that the passage was written by an AI model
2. how likely it is that the passage was copied or closely paraphrased from an existing source

Respond with a single JSON object and nothing else, using exactly these fields:
- aiProbability: number between 0 and 1
- aiHighlights: array of {"sentence": string, "reason": string} for sentences that read as machine-written
- plagiarismProbability: number between 0 and 1
- plagiarismHighlights: array of {"sentence": string, "reason": string} for sentences that look copied
- sources: array of {"title": string, "url": string} for likely original sources

Example:
{"aiProbability": 0.72, "aiHighlights": [{"sentence": "...", "reason": "generic transitions"}], "plagiarismProbability": 0.1, "plagiarismHighlights": [], "sources": []}"#;

fn user_prompt(index: usize, total: usize, chunk: &str) -> String {
    format!(
        "Analyze passage {} of {} and return JSON only.\n\n{}",
        index + 1,
        total,
        chunk
    )
}

/// Deterministic stand-in for a chunk whose response could not be parsed.
pub fn mock_chunk_analysis(chunk_index: usize, chunk_text: &str) -> ChunkAnalysis {
    let mut hasher = Sha256::new();
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(chunk_text.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());

    let mut rng = StdRng::from_seed(seed);
    ChunkAnalysis {
        ai_probability: rng.gen_range(0.15..0.45),
        ai_highlights: vec![],
        plagiarism_probability: rng.gen_range(0.0..0.2),
        plagiarism_highlights: vec![],
        sources: vec![],
        is_fallback: true,
    }
}

/// Document-level view over the usable chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerativeSummary {
    pub ai_probability: f64,
    pub plagiarism_probability: f64,
    pub ai_highlights: Vec<Highlight>,
    /// Usable chunks in document order (parsed and mocked).
    pub chunks: Vec<ChunkAnalysis>,
    pub total_chunks: usize,
    pub failed_chunks: usize,
}

impl GenerativeSummary {
    pub fn from_chunks(chunks: Vec<ChunkAnalysis>, total_chunks: usize) -> Option<Self> {
        if chunks.is_empty() {
            return None;
        }
        let n = chunks.len() as f64;
        let ai_probability = chunks.iter().map(|c| c.ai_probability).sum::<f64>() / n;
        let plagiarism_probability =
            chunks.iter().map(|c| c.plagiarism_probability).sum::<f64>() / n;
        let ai_highlights = chunks
            .iter()
            .flat_map(|c| c.ai_highlights.iter().cloned())
            .collect();
        let failed_chunks = total_chunks.saturating_sub(chunks.len());
        Some(Self {
            ai_probability,
            plagiarism_probability,
            ai_highlights,
            chunks,
            total_chunks,
            failed_chunks,
        })
    }

    pub fn fallback_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_fallback).count()
    }

    /// Plagiarism contribution for the merge stage.
    pub fn plagiarism_partial(&self) -> PartialResult {
        let evidence = self
            .chunks
            .iter()
            .flat_map(|chunk| {
                let source = chunk.sources.first();
                let url = source.map(|s| s.url.clone()).unwrap_or_default();
                let title = source.map(|s| s.title.clone()).unwrap_or_default();
                chunk.plagiarism_highlights.iter().map(move |h| {
                    Evidence::new(
                        Provider::GenerativeModel,
                        h.sentence.clone(),
                        url.clone(),
                        title.clone(),
                        chunk.plagiarism_probability,
                    )
                })
            })
            .collect();
        PartialResult::with_score(self.plagiarism_probability, evidence)
            .with_query_counts(self.total_chunks, self.failed_chunks)
    }
}

pub struct GenerativeAnalyzer {
    generator: Arc<dyn TextGenerator>,
    chunk_chars: usize,
    max_concurrency: usize,
    chunk_timeout: Duration,
}

impl GenerativeAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chunk_timeout: Duration::from_secs(DEFAULT_CHUNK_TIMEOUT_SECS),
        }
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn model_id(&self) -> String {
        self.generator.model_id()
    }

    /// `None` when no chunk produced a usable analysis.
    pub async fn analyze(&self, text: &str) -> Option<GenerativeSummary> {
        let started = Instant::now();
        let chunks = chunk_text(text, self.chunk_chars);
        let total = chunks.len();
        if total == 0 {
            return None;
        }
        info!(
            model = %self.generator.model_id(),
            chunks = total,
            "[LLM_ANALYZER] starting chunk analysis"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<(usize, Option<ChunkAnalysis>)> = JoinSet::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let generator = Arc::clone(&self.generator);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.chunk_timeout;

            join_set.spawn(async move {
                let response = {
                    // Permit covers the request only
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (index, None);
                    };
                    let prompt = user_prompt(index, total, &chunk);
                    tokio::time::timeout(timeout, generator.generate(ANALYSIS_SYSTEM_PROMPT, &prompt))
                        .await
                };

                let analysis = match response {
                    Ok(Ok(content)) => match parse_chunk_response(&content) {
                        ChunkParse::Parsed(analysis) => Some(analysis),
                        ChunkParse::Fallback(reason) => {
                            warn!(chunk = index, reason = %reason, "[LLM_ANALYZER] unparseable response, using mock");
                            Some(mock_chunk_analysis(index, &chunk))
                        }
                    },
                    Ok(Err(e)) => {
                        warn!(chunk = index, error = %e, "[LLM_ANALYZER] chunk request failed");
                        None
                    }
                    Err(_) => {
                        warn!(
                            chunk = index,
                            timeout_secs = timeout.as_secs(),
                            "[LLM_ANALYZER] chunk request timed out"
                        );
                        None
                    }
                };
                (index, analysis)
            });
        }

        let mut settled: Vec<(usize, ChunkAnalysis)> = Vec::with_capacity(total);
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((index, Some(analysis))) => settled.push((index, analysis)),
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "[LLM_ANALYZER] chunk task failed"),
            }
        }
        // Stable document order for highlights and evidence
        settled.sort_by_key(|(index, _)| *index);

        let summary =
            GenerativeSummary::from_chunks(settled.into_iter().map(|(_, a)| a).collect(), total);
        match &summary {
            Some(s) => info!(
                usable = s.chunks.len(),
                fallback = s.fallback_chunks(),
                failed = s.failed_chunks,
                ai_probability = s.ai_probability,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[LLM_ANALYZER] chunk analysis done"
            ),
            None => warn!(
                chunks = total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[LLM_ANALYZER] no usable chunk, generative side unavailable"
            ),
        }
        summary
    }
}
