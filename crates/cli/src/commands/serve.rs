//! `pitchscout serve`: Start the HTTP gateway.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("⚾ PitchScout Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Webhook:   {}",
        if config.gateway.channel_access_token.is_some() {
            "POST /callback (push enabled)"
        } else {
            "POST /callback (no channel access token, replies disabled)"
        }
    );
    println!(
        "   Signature: {}",
        if config.gateway.channel_secret.is_some() {
            "required"
        } else {
            "not checked"
        }
    );

    pitchscout_gateway::start(config).await?;

    Ok(())
}
