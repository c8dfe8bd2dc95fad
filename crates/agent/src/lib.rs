//! The answer pipeline: the heart of PitchScout.
//!
//! A question about a pitcher goes through four steps:
//!
//! 1. **Resolve players** from the question, or from recent conversation
//! 2. **Track the topic** per user, resetting memory when it changes
//! 3. **Size retrieval** so the pitch records fit the model's context
//! 4. **Generate** a grounded answer, retrying quota and empty replies
//!
//! [`AnswerEngine`] runs the pipeline; [`build_engine`] wires it from config.

pub mod builder;
pub mod engine;
pub mod prompt;
pub mod retrieval;
pub mod roster;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::{build_connector, build_engine};
pub use engine::{AnswerEngine, AnswerError, AnswerReport, EngineSettings};
pub use retrieval::{AdaptiveRetriever, RetrievalBounds, RetrievalError, RetrievalPlan, cap_per_player};
pub use roster::{Roster, RosterError};
