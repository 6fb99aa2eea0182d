//! Full dice runs over real TCP connections

use fairdice::cli::{roll, DiceNode};
use fairdice::p2p::{Channel, DiceMessage, RevealPacket, TcpChannel};
use fairdice::{create_commitment, combine, Config, DiceError, DieFace, Identity, Nonce};
use std::time::Duration;
use tokio::sync::oneshot;

fn node_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        timeout_secs: 2,
        sweep_interval_ms: 20,
        ..Config::default()
    }
}

/// Spawn a responder node; dropping the returned sender stops it
async fn spawn_node(config: Config) -> (String, oneshot::Sender<()>) {
    let mut node = DiceNode::bind(&config).await.unwrap();
    let addr = node.local_addr().to_string();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        node.run_until(async {
            let _ = rx.await;
        })
        .await;
    });

    (addr, tx)
}

#[tokio::test]
async fn test_concurrent_initiators_each_get_an_outcome() {
    let (addr, _stop) = spawn_node(node_config()).await;

    let mut handles = Vec::new();
    for name in ["alice", "carol", "dave"] {
        let config = Config {
            identity: name.to_string(),
            peer_addr: addr.clone(),
            ..node_config()
        };
        handles.push(tokio::spawn(async move { roll(&config).await }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(
            outcome.result,
            combine(outcome.initiator_value, outcome.responder_value)
        );
    }
}

#[tokio::test]
async fn test_tampered_reveal_gets_connection_dropped() {
    let (addr, _stop) = spawn_node(node_config()).await;
    let mut channel = TcpChannel::connect(&addr).await.unwrap();
    let timeout = Duration::from_secs(2);

    let alice = Identity::new("alice").unwrap();
    let nonce = Nonce::generate();
    let commitment = create_commitment(&alice, DieFace::new(4).unwrap(), &nonce);

    channel
        .send(DiceMessage::Commit {
            identity: alice.clone(),
            commitment,
        })
        .await
        .unwrap();
    let reply = channel.receive(timeout).await.unwrap();
    assert!(matches!(reply, DiceMessage::PeerValue { .. }));

    // Claim 5 under a commitment to 4
    channel
        .send(DiceMessage::Reveal(RevealPacket {
            identity: alice,
            value: DieFace::new(5).unwrap(),
            nonce,
            commitment,
        }))
        .await
        .unwrap();

    let result = channel.receive(timeout).await;
    assert!(matches!(result, Err(DiceError::Transport(_))));
}

#[tokio::test]
async fn test_reveal_first_gets_no_value() {
    let (addr, _stop) = spawn_node(node_config()).await;
    let mut channel = TcpChannel::connect(&addr).await.unwrap();

    let alice = Identity::new("alice").unwrap();
    let nonce = Nonce::generate();
    let value = DieFace::new(4).unwrap();

    channel
        .send(DiceMessage::Reveal(RevealPacket {
            identity: alice.clone(),
            value,
            commitment: create_commitment(&alice, value, &nonce),
            nonce,
        }))
        .await
        .unwrap();

    // The node aborts and closes instead of answering with a value
    let result = channel.receive(Duration::from_secs(2)).await;
    assert!(matches!(result, Err(DiceError::Transport(_))));
}

#[tokio::test]
async fn test_stalled_initiator_is_expired() {
    let config = Config {
        timeout_secs: 1,
        ..node_config()
    };
    let (addr, _stop) = spawn_node(config).await;
    let mut channel = TcpChannel::connect(&addr).await.unwrap();

    let alice = Identity::new("alice").unwrap();
    let nonce = Nonce::generate();
    channel
        .send(DiceMessage::Commit {
            commitment: create_commitment(&alice, DieFace::new(2).unwrap(), &nonce),
            identity: alice,
        })
        .await
        .unwrap();
    let reply = channel.receive(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(reply, DiceMessage::PeerValue { .. }));

    // Never reveal; the node's sweep drops the run and closes the connection
    let result = channel.receive(Duration::from_secs(5)).await;
    assert!(matches!(result, Err(DiceError::Transport(_))));
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let config = Config {
        timeout_secs: 1,
        ..node_config()
    };
    let mut node = DiceNode::bind(&config).await.unwrap();
    let addr = node.local_addr().to_string();

    // Connect and never commit
    let (tx, rx) = oneshot::channel::<()>();
    let client = tokio::spawn(async move {
        let mut channel = TcpChannel::connect(&addr).await.unwrap();
        let result = channel.receive(Duration::from_secs(4)).await;
        let _ = tx.send(());
        result
    });

    node.run_until(async {
        let _ = rx.await;
    })
    .await;

    let result = client.await.unwrap();
    assert!(matches!(result, Err(DiceError::Transport(_))));
    assert_eq!(node.engine().pending_peers(), 0);
    assert_eq!(node.engine().active_runs(), 0);
}

#[tokio::test]
async fn test_dropped_peer_cannot_start_over() {
    let (addr, _stop) = spawn_node(node_config()).await;
    let mut channel = TcpChannel::connect(&addr).await.unwrap();
    let timeout = Duration::from_secs(2);

    let alice = Identity::new("alice").unwrap();
    let value = DieFace::new(3).unwrap();
    let nonce = Nonce::generate();

    // Out-of-order opening gets the connection dropped
    channel
        .send(DiceMessage::Reveal(RevealPacket {
            identity: alice.clone(),
            value,
            commitment: create_commitment(&alice, value, &nonce),
            nonce: nonce.clone(),
        }))
        .await
        .unwrap();
    let result = channel.receive(timeout).await;
    assert!(matches!(result, Err(DiceError::Transport(_))));

    // A fresh commit on the same socket is never answered
    let _ = channel
        .send(DiceMessage::Commit {
            commitment: create_commitment(&alice, value, &nonce),
            identity: alice,
        })
        .await;
    let result = channel.receive(Duration::from_millis(500)).await;
    assert!(!matches!(result, Ok(DiceMessage::PeerValue { .. })));
}

#[tokio::test]
async fn test_roll_against_silent_peer_times_out() {
    // A bare listener that accepts and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let config = Config {
        peer_addr: addr,
        timeout_secs: 1,
        ..node_config()
    };
    let result = roll(&config).await;
    assert!(matches!(
        result,
        Err(DiceError::Timeout { ref state, .. }) if state == "AwaitingPeerValue"
    ));
}
