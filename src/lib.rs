//! Tern: Hierarchical Planning and Execution for Vision-Language Navigation
//!
//! A navigation agent that decomposes a long-horizon natural-language
//! instruction into verifiable sub-tasks via a hosted vision-language model,
//! monitors progress with fresh panoramic observations, and amortizes model
//! cost by caching decomposed primitive actions between planning calls.

pub mod config;
pub mod env;
pub mod episode;
pub mod executor;
pub mod model;
pub mod planner;
