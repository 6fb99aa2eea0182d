//! fairdice application integrating all components

use crate::config::Config;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::p2p::{MemoryChannel, NetworkEvent, NetworkManager, TcpChannel};
use crate::protocol::{
    run_initiator, run_responder, EngineAction, InitiatorSession, ResponderEngine,
    ResponderSession,
};
use crate::types::PeerID;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Responder node: one listener, one isolated run per connected initiator
pub struct DiceNode {
    network: NetworkManager,
    engine: ResponderEngine,
    sweep_interval: Duration,
}

impl DiceNode {
    /// Bind the listener from `config`
    pub async fn bind(config: &Config) -> Result<Self> {
        let network = NetworkManager::bind(&config.listen_addr).await?;

        Ok(Self {
            network,
            engine: ResponderEngine::new(config.timeout()),
            sweep_interval: config.sweep_interval(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.network.local_addr()
    }

    pub fn engine(&self) -> &ResponderEngine {
        &self.engine
    }

    /// Run the event loop until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut sweep = tokio::time::interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down responder node");
                    break;
                }
                event = self.network.next_event() => match event {
                    Some(event) => self.handle_network_event(event).await,
                    None => break,
                },
                _ = sweep.tick() => self.expire_stale().await,
            }
        }
    }

    /// Run the event loop until Ctrl+C
    pub async fn run_event_loop(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    /// Handle network events
    async fn handle_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::PeerConnected(peer_id) => {
                tracing::info!("Peer connected: {}", peer_id);
                self.engine.register_peer(&peer_id, Instant::now());
            }
            NetworkEvent::PeerDisconnected(peer_id) => {
                if self.engine.get_run(&peer_id).is_some() {
                    tracing::warn!("Peer {} left mid-run", peer_id);
                }
                self.engine.remove_peer(&peer_id);
                tracing::info!("Peer disconnected: {}", peer_id);
            }
            NetworkEvent::MessageReceived { from, message } => {
                tracing::debug!("Received {} from {}", message.kind(), from);
                match self.engine.handle_message(&from, message, Instant::now()) {
                    Ok(EngineAction::Reply(reply)) => {
                        if let Err(e) = self.network.send_to_peer(&from, &reply).await {
                            self.abort_peer(&from, &format!("could not answer: {}", e), false)
                                .await;
                        }
                    }
                    Ok(EngineAction::Completed(outcome)) => {
                        tracing::info!("Dice roll with {} verified: {}", from, outcome);
                        self.close_peer(&from).await;
                    }
                    Err(e) => self.abort_peer(&from, &e.to_string(), e.is_adversarial()).await,
                }
            }
            NetworkEvent::MalformedMessage { from, error } => {
                self.abort_peer(&from, &error.to_string(), false).await;
            }
        }
    }

    async fn expire_stale(&mut self) {
        for (peer_id, err) in self.engine.expire_stale(Instant::now()) {
            self.abort_peer(&peer_id, &err.to_string(), false).await;
        }
    }

    async fn abort_peer(&mut self, peer_id: &PeerID, reason: &str, adversarial: bool) {
        if adversarial {
            tracing::warn!("Peer {} sent a bad opening, dropping: {}", peer_id, reason);
        } else {
            tracing::warn!("Run with {} aborted: {}", peer_id, reason);
        }
        self.close_peer(peer_id).await;
    }

    /// Forget the peer and close its connection in both directions
    async fn close_peer(&mut self, peer_id: &PeerID) {
        self.engine.remove_peer(peer_id);
        self.network.disconnect(peer_id).await;
    }
}

/// Roll against a remote responder as the initiator
pub async fn roll(config: &Config) -> Result<Outcome> {
    let identity = config.identity()?;
    tracing::info!("Rolling as {} against {}", identity, config.peer_addr);

    let mut channel = TcpChannel::connect(&config.peer_addr).await?;
    run_initiator(InitiatorSession::new(identity), &mut channel, config.timeout()).await
}

/// Play both roles over an in-memory channel; returns (initiator, responder) views
pub async fn roll_local(config: &Config) -> Result<(Outcome, Outcome)> {
    let identity = config.identity()?;
    let (mut initiator_end, mut responder_end) = MemoryChannel::pair();

    let (initiator, responder) = tokio::join!(
        run_initiator(
            InitiatorSession::new(identity),
            &mut initiator_end,
            config.timeout()
        ),
        run_responder(ResponderSession::new(), &mut responder_end, config.timeout()),
    );

    Ok((initiator?, responder?))
}
