//! The pitcher roster and player-name extraction.
//!
//! Extraction is a bounded match against a fixed list of full names, not
//! general entity recognition: a full-name substring match first, then a
//! surname match when the question holds exactly one Latin-alphabet word.

use pitchscout_core::message::Message;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("Roster entry '{0}' must be exactly 'First Last'")]
    InvalidName(String),

    #[error("Roster entry '{0}' appears more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone)]
struct Player {
    full_name: String,
    full_lower: String,
    surname_lower: String,
}

/// An ordered, immutable set of known pitchers.
#[derive(Debug, Clone)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Build a roster. Every name must split into exactly a first and a last
    /// name, and names must be unique (case-insensitively).
    pub fn new<I, S>(names: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut players: Vec<Player> = Vec::new();
        for name in names {
            let full_name: String = name.into();
            let parts: Vec<&str> = full_name.split_whitespace().collect();
            let [_, last] = parts.as_slice() else {
                return Err(RosterError::InvalidName(full_name));
            };
            let surname_lower = last.to_lowercase();
            let full_lower = parts.join(" ").to_lowercase();

            if players.iter().any(|p| p.full_lower == full_lower) {
                return Err(RosterError::Duplicate(full_name));
            }
            players.push(Player {
                full_name: parts.join(" "),
                full_lower,
                surname_lower,
            });
        }
        Ok(Self { players })
    }

    /// Full names in roster order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.full_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players a question is about, in roster order. Empty means
    /// "unspecified".
    pub fn extract(&self, question: &str) -> Vec<String> {
        let lower = question.to_lowercase();
        let by_full_name: Vec<String> = self
            .players
            .iter()
            .filter(|p| lower.contains(&p.full_lower))
            .map(|p| p.full_name.clone())
            .collect();
        if !by_full_name.is_empty() {
            debug!(players = ?by_full_name, "Players named in question");
            return by_full_name;
        }

        let mut words = alphabetic_runs(question);
        let (Some(word), None) = (words.next(), words.next()) else {
            return Vec::new();
        };
        let word = word.to_ascii_lowercase();
        let by_surname: Vec<String> = self
            .players
            .iter()
            .filter(|p| p.surname_lower == word)
            .map(|p| p.full_name.clone())
            .collect();
        if !by_surname.is_empty() {
            debug!(players = ?by_surname, "Players matched by surname");
        }
        by_surname
    }

    /// Recover players from recent history: scan the last `scan` messages,
    /// newest first, and return the first non-empty extraction.
    pub fn recall(&self, history: &[Message], scan: usize) -> Vec<String> {
        let players = history
            .iter()
            .rev()
            .take(scan)
            .map(|m| self.extract(&m.content))
            .find(|found| !found.is_empty())
            .unwrap_or_default();
        if !players.is_empty() {
            debug!(players = ?players, "Players recalled from conversation history");
        }
        players
    }
}

/// Maximal runs of ASCII letters (`[A-Za-z]+`).
fn alphabetic_runs(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|run| !run.is_empty())
}
