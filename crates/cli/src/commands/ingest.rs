//! `pitchscout ingest`: Load pitch records into the vector store.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pitchscout_agent::build_connector;
use pitchscout_memory::{group_records, ingest, parse_jsonl};
use pitchscout_providers::router::build_from_config;

pub async fn run(file: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let reader = BufReader::new(
        File::open(file).map_err(|e| format!("Cannot open {}: {e}", file.display()))?,
    );
    let records = parse_jsonl(reader)?;
    let documents = group_records(&records);
    println!(
        "📥 {} pitch records → {} player-game documents",
        records.len(),
        documents.len()
    );

    let router = build_from_config(&config);
    let connector = build_connector(&config, &router)?;
    println!("   Store: {}", connector.describe());
    let store = connector.connect().await?;

    let report = ingest(
        store.as_ref(),
        documents,
        config.vector_store.ingest_batch_size,
        force,
    )
    .await?;

    if report.skipped {
        println!("⚠️  Collection already has documents; nothing added. Use --force to add anyway.");
    } else {
        println!(
            "✅ Added {} documents in {} batches",
            report.documents, report.batches
        );
    }

    Ok(())
}
