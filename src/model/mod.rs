//! Model gateway for the hosted vision-language model.
//!
//! This module provides:
//! - [`api::VlmClient`] -- multi-modal chat completion client with
//!   structured-record recovery (fence stripping + balanced-brace repair)
//!   and the typed failure taxonomy [`api::GatewayError`].
//! - [`prompt`] -- the three request-kind templates (initial planning,
//!   verification + replanning, global task completion).
//! - [`response`] -- validated records with per-kind required-key checks
//!   performed once at the gateway boundary.

pub mod api;
pub mod prompt;
pub mod response;

// Re-export the most commonly used types at the module level.
pub use api::{GatewayError, VlmClient};
pub use response::{CompletionCheck, InitialPlan, Verification};
