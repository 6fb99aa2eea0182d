//! fairdice CLI binary

use anyhow::{bail, Context};
use clap::Parser;
use fairdice::cli::{roll, roll_local, Cli, Commands, DiceNode};
use fairdice::{
    create_commitment, verify_commitment, Commitment, Config, DieFace, Identity, Nonce,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Respond { listen, timeout } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            config.validate()?;

            let mut node = DiceNode::bind(&config).await?;
            tracing::info!("Responder ready on {}. Press Ctrl+C to stop.", node.local_addr());
            node.run_event_loop().await;
        }

        Commands::Roll {
            peer,
            identity,
            timeout,
        } => {
            if let Some(peer) = peer {
                config.peer_addr = peer;
            }
            if let Some(identity) = identity {
                config.identity = identity;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            config.validate()?;

            let outcome = roll(&config)
                .await
                .with_context(|| format!("dice roll against {} failed", config.peer_addr))?;
            println!("{}", outcome);
        }

        Commands::Local { identity } => {
            if let Some(identity) = identity {
                config.identity = identity;
            }
            config.validate()?;

            let (initiator, responder) = roll_local(&config).await?;
            println!("initiator view: {}", initiator);
            println!("responder view: {}", responder);
        }

        Commands::Commit {
            identity,
            value,
            nonce,
        } => {
            let identity = Identity::new(identity)?;
            let value = DieFace::new(value)?;
            let nonce = match nonce {
                Some(hex_str) => Nonce::from_hex(&hex_str)?,
                None => Nonce::generate(),
            };

            let commitment = create_commitment(&identity, value, &nonce);
            println!("commitment: {}", commitment);
            println!("nonce:      {}", nonce.to_hex());
        }

        Commands::Verify {
            identity,
            value,
            nonce,
            commitment,
        } => {
            let identity = Identity::new(identity)?;
            let value = DieFace::new(value)?;
            let nonce = Nonce::from_hex(&nonce)?;
            let commitment = Commitment::from_hex(&commitment)?;

            if verify_commitment(&identity, &commitment, value, &nonce).is_err() {
                bail!("opening does not match commitment");
            }
            println!("ok: {} committed to {}", identity, value);
        }
    }

    Ok(())
}
