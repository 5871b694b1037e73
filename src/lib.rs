//! hotel-enricher: LLM enrichment for hotel listings
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod llm;
pub mod engine;
pub mod storage;
