//! Exa web search adapter.
mod client;
mod types;

pub use client::{EXA_API_BASE, ExaSearch};
pub use types::{ExaContents, ExaResult, ExaSearchRequest, ExaSearchResponse, ExaTextOptions};
