//! Service layer: archive expansion, AI adapters, asset assembly

pub mod archive_expander;
pub mod asset_analyzer;
pub mod asset_assembler;
pub mod gemini_client;
pub mod study_synthesizer;

pub use archive_expander::{expand_archive, is_archive, ExpandedEntry, ExpanderError};
pub use asset_analyzer::{AnalysisError, Analyzer, AssetAnalyzer};
pub use asset_assembler::{assemble, derive_ai_name, file_extension, MAX_PREVIEW_BYTES};
pub use gemini_client::{GeminiClient, GeminiError};
pub use study_synthesizer::{StudySynthesizer, Synthesizer, SynthesisError, NARRATIVE_ASSET_LIMIT};
