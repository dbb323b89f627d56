//! Review orchestration: prompt rendering, LLM and GitHub clients, and the
//! pipeline driving one run from repository materialization through comment
//! publication.

pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
