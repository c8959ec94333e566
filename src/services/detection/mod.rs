// Detection Module
// Plagiarism and AI-likelihood detection organized into specialized submodules:
// - sources: per-provider text-matching adapters
// - fan_out: concurrent adapter execution with a bounded deadline
// - merge: score aggregation and evidence dedup
// - classifier / llm_analyzer / response_parser / ai_probability: AI-likelihood branch
// - verdict: final label decision table
// - engine: request entry point wiring it all together

pub mod sources;
pub mod fan_out;
pub mod merge;
pub mod classifier;
pub mod response_parser;
pub mod llm_analyzer;
pub mod ai_probability;
pub mod verdict;
pub mod engine;

#[cfg(test)]
pub mod testing;

pub use ai_probability::{blend, AiAssessment, AiBranch};
pub use classifier::ClassifierProbe;
pub use engine::{DetectionEngine, EngineBuilder, EngineError};
pub use fan_out::{AdapterRegistry, FanOutCoordinator};
pub use llm_analyzer::{mock_chunk_analysis, GenerativeAnalyzer, GenerativeSummary};
pub use merge::{dedup_key, merge, MergedEvidence};
pub use response_parser::{parse_chunk_response, ChunkParse};
pub use sources::{default_adapters, SourceAdapter, SourceError, SourceHttp};
pub use verdict::classify;
