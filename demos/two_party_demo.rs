//! Two-party demo: a responder node and two initiators on localhost
//!
//! 1. Start a responder node (Bob)
//! 2. Alice rolls against it over TCP
//! 3. Carol rolls at the same time on her own connection
//! 4. Mallory tries to open her commitment to a different face
//!
//! Run with: cargo run --example two_party_demo

use fairdice::cli::{roll, DiceNode};
use fairdice::p2p::{Channel, DiceMessage, RevealPacket, TcpChannel};
use fairdice::{create_commitment, Config, DieFace, Identity, Nonce};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,fairdice=debug")
        .init();

    let base = Config {
        listen_addr: "127.0.0.1:0".to_string(),
        timeout_secs: 5,
        ..Config::default()
    };

    println!("\n== fairdice two-party demo ==\n");

    // Start Bob
    let mut node = DiceNode::bind(&base).await?;
    let addr = node.local_addr().to_string();
    println!("Responder listening on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let node_task = tokio::spawn(async move {
        node.run_until(async {
            let _ = stop_rx.await;
        })
        .await;
    });

    // Scenario 1: two honest initiators in parallel
    println!("\n-- Scenario 1: honest rolls --");
    let alice = Config {
        identity: "alice".to_string(),
        peer_addr: addr.clone(),
        ..base.clone()
    };
    let carol = Config {
        identity: "carol".to_string(),
        peer_addr: addr.clone(),
        ..base.clone()
    };

    let (a, c) = tokio::join!(roll(&alice), roll(&carol));
    println!("alice: {}", a?);
    println!("carol: {}", c?);

    // Scenario 2: Mallory commits to 4, then claims 5
    println!("\n-- Scenario 2: tampered opening --");
    let mallory = Identity::new("mallory")?;
    let nonce = Nonce::generate();
    let commitment = create_commitment(&mallory, DieFace::new(4)?, &nonce);

    let mut channel = TcpChannel::connect(&addr).await?;
    channel
        .send(DiceMessage::Commit {
            identity: mallory.clone(),
            commitment,
        })
        .await?;
    let reply = channel.receive(Duration::from_secs(5)).await?;
    println!("mallory saw {:?}", reply);

    channel
        .send(DiceMessage::Reveal(RevealPacket {
            identity: mallory,
            value: DieFace::new(5)?,
            nonce,
            commitment,
        }))
        .await?;

    match channel.receive(Duration::from_secs(5)).await {
        Err(e) => println!("responder dropped mallory: {}", e),
        Ok(msg) => println!("unexpected reply: {:?}", msg),
    }

    let _ = stop_tx.send(());
    node_task.await?;

    println!("\n== demo complete ==\n");
    Ok(())
}
