//! Token estimation utilities.
//!
//! Character-composition heuristic: a CJK ideograph (U+4E00..=U+9FFF)
//! costs 1.2 tokens, any other character 0.75. Not a tokenizer, but it is
//! deterministic, so budget comparisons made with it are stable across
//! calls. Computed in integer hundredths so the floor is exact.

use crate::message::Message;

const CJK_COST_HUNDREDTHS: usize = 120;
const OTHER_COST_HUNDREDTHS: usize = 75;

/// Whether a character is in the CJK Unified Ideographs block.
pub fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Estimate the token count for a string.
///
/// `floor(cjk * 1.2 + other * 0.75)`.
pub fn estimate_tokens(text: &str) -> usize {
    let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
        if is_cjk_ideograph(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });
    (cjk * CJK_COST_HUNDREDTHS + other * OTHER_COST_HUNDREDTHS) / 100
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Each message costs ~4 tokens of overhead for role name and delimiters.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let overhead = 4;
    overhead + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
