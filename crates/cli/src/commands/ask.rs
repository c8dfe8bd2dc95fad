//! `pitchscout ask`: Answer one question and print it.

use pitchscout_agent::build_engine;

pub async fn run(question: &str, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let engine = build_engine(&config)?;

    eprint!("  Thinking...");
    let answer = engine.answer(question, user).await;
    eprint!("\r              \r");
    println!("{answer}");

    Ok(())
}
