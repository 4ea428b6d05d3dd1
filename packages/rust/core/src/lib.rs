//! Core pipeline orchestration and domain logic for copydesk.
//!
//! This crate ties together fetching, keyword extraction, research, link
//! ranking, drafting, and export into the end-to-end enrichment batch.

pub mod draft;
pub mod export;
pub mod pipeline;
pub mod validate;
