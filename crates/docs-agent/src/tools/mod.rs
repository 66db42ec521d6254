//! Tools the agent can call.
//!
//! Every capability is a [`Tool`] implementor keyed by a [`ToolName`].
//! Tools are collected into a [`ToolSet`] which handles dispatch, argument
//! validation, truncation and timeouts. Tools never fail the loop: problems
//! come back as result strings the model can read and react to.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], argument helpers.
//! - [`names`]: the fixed [`ToolName`] enumeration.
//! - [`retrieval`]: `semantic_search`, `add_documents`, `create_collection`,
//!   `list_collections` over a [`VectorStore`](crate::vector::VectorStore).
//! - [`pdf`]: `pdf_to_chunks` and the token-budgeted word chunker.

pub mod core;
pub mod names;
pub mod pdf;
pub mod retrieval;

pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_TIMEOUT, Tool, ToolFuture, ToolSet, parse_tool_args,
    truncate_result, validate_tool_arguments,
};
pub use names::ToolName;
pub use pdf::{PdfToChunks, chunk_words, count_tokens};
pub use retrieval::{AddDocuments, CreateCollection, ListCollections, NO_RESULTS, SemanticSearch};
