//! Ingestion of pitch-event records into the vector store.
//!
//! Records arrive as JSON Lines, one object per pitch. They are grouped by
//! `(player_name, game_date)` into one document per pitcher per game, so a
//! retrieval hit brings back a whole outing rather than a single pitch.

use pitchscout_core::error::StoreError;
use pitchscout_core::retrieval::{Document, PLAYER_FIELD, VectorStore};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::{info, warn};

/// Metadata field carrying the game date.
pub const GAME_DATE_FIELD: &str = "game_date";

/// One pitch: column name to value, in source column order.
pub type PitchRecord = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an ingestion run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub batches: usize,
    /// The collection already held documents and `force` was not set.
    pub skipped: bool,
}

/// Parse JSON Lines. Blank lines are ignored; anything else must be an object.
pub fn parse_jsonl(reader: impl BufRead) -> Result<Vec<PitchRecord>, IngestError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(map)) => records.push(map),
            Ok(_) => {
                return Err(IngestError::Parse {
                    line: idx + 1,
                    reason: "expected a JSON object".into(),
                });
            }
            Err(e) => {
                return Err(IngestError::Parse {
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(records)
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| {
            let rounded = (f * 100.0).round() / 100.0;
            if rounded.fract() == 0.0 {
                format!("{rounded:.1}")
            } else {
                rounded.to_string()
            }
        }),
        other => Some(other.to_string()),
    }
}

/// One pitch as `column name: value` pairs joined with `" | "`.
fn render_record(record: &PitchRecord) -> String {
    record
        .iter()
        .filter_map(|(col, value)| {
            render_value(value).map(|v| format!("{}: {v}", col.replace('_', " ")))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn field(record: &PitchRecord, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Group pitches into one document per `(player, game date)`, ordered by
/// player then date. Records missing either field are skipped.
pub fn group_records(records: &[PitchRecord]) -> Vec<Document> {
    let mut groups: BTreeMap<(String, String), Vec<&PitchRecord>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        match (field(record, PLAYER_FIELD), field(record, GAME_DATE_FIELD)) {
            (Some(player), Some(date)) => groups.entry((player, date)).or_default().push(record),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "Records without player_name or game_date were skipped");
    }

    groups
        .into_iter()
        .map(|((player, date), pitches)| {
            let lines = pitches
                .iter()
                .map(|r| render_record(r))
                .collect::<Vec<_>>()
                .join("\n");
            let text = format!("【球員：{player}】【比賽日期：{date}】\n{lines}");
            Document::new(format!("{player}|{date}"), text)
                .with_meta(PLAYER_FIELD, player)
                .with_meta(GAME_DATE_FIELD, date)
        })
        .collect()
}

/// Add documents in batches. A non-empty store is left alone unless `force`.
pub async fn ingest(
    store: &dyn VectorStore,
    documents: Vec<Document>,
    batch_size: usize,
    force: bool,
) -> Result<IngestReport, IngestError> {
    let existing = store.count().await?;
    if existing > 0 && !force {
        info!(existing, "Collection already populated, skipping ingestion");
        return Ok(IngestReport {
            skipped: true,
            ..IngestReport::default()
        });
    }

    let batch_size = batch_size.max(1);
    let mut report = IngestReport::default();
    let total = documents.len();
    let mut remaining = documents.into_iter().peekable();

    while remaining.peek().is_some() {
        let batch: Vec<Document> = remaining.by_ref().take(batch_size).collect();
        report.documents += store.add(batch).await?;
        report.batches += 1;
        info!(added = report.documents, total, "Ingestion progress");
    }

    Ok(report)
}
