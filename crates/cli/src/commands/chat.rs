//! `pitchscout chat`: Interactive question session.

use std::io::Write;

use pitchscout_agent::build_engine;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let engine = build_engine(&config)?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║     PitchScout — 2022 WBC Team USA pitchers    ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Store:     {}", engine.store().describe());
    println!("  Pitchers:  {}", engine.roster().len());
    println!();
    println!("  Ask about a pitcher by name; follow-ups remember who you meant.");
    println!("  Type 'roster' to list pitchers, 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        match question {
            "" => {}
            "exit" | "quit" => break,
            "roster" | "名單" => {
                for name in engine.roster().names() {
                    println!("    {name}");
                }
                println!();
            }
            _ => {
                eprint!("  ...");
                let answer = engine.answer(question, user).await;
                eprint!("\r     \r");
                println!();
                for line in answer.lines() {
                    println!("  PitchScout > {line}");
                }
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! ⚾");
    println!();

    Ok(())
}
