//! LLM Provider implementations for PitchScout.
//!
//! All providers implement the `pitchscout_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! `retry` bounds how long callers keep asking.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryOutcome, RetryPolicy, Verdict, retry};
pub use router::ProviderRouter;
