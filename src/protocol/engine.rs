//! Responder engine manages one isolated run per connected initiator

use crate::crypto::{Blake2bCommitment, CommitmentScheme};
use crate::error::{DiceError, Result};
use crate::outcome::Outcome;
use crate::p2p::DiceMessage;
use crate::types::PeerID;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::responder::ResponderSession;
use super::types::ResponderState;

/// A run waiting for its reveal
struct ActiveRun<S: CommitmentScheme> {
    session: ResponderSession<S>,
    deadline: Instant,
}

/// Actions resulting from handling messages
#[derive(Debug, PartialEq)]
pub enum EngineAction {
    /// Send this message back to the peer
    Reply(DiceMessage),
    /// The run verified; nothing more is sent
    Completed(Outcome),
}

/// Responder engine keyed by peer connection
///
/// Runs never share state. A failed or expired run is dropped together with
/// everything it held. Only registered peers may start a run, and a peer that
/// stays silent past its deadline is expired like a stalled run.
pub struct ResponderEngine<S: CommitmentScheme = Blake2bCommitment> {
    scheme: S,
    timeout: Duration,
    /// Connected peers still in `Listening`, with their commit deadline
    pending: HashMap<PeerID, Instant>,
    active_runs: HashMap<PeerID, ActiveRun<S>>,
    finished: HashMap<PeerID, Outcome>,
}

impl ResponderEngine<Blake2bCommitment> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_scheme(Blake2bCommitment, timeout)
    }
}

impl<S: CommitmentScheme> ResponderEngine<S> {
    pub fn with_scheme(scheme: S, timeout: Duration) -> Self {
        Self {
            scheme,
            timeout,
            pending: HashMap::new(),
            active_runs: HashMap::new(),
            finished: HashMap::new(),
        }
    }

    /// Admit a newly connected peer; it must commit within the timeout
    pub fn register_peer(&mut self, peer: &PeerID, now: Instant) {
        self.pending.insert(peer.clone(), now + self.timeout);
    }

    /// Handle an incoming message from `from`
    pub fn handle_message(
        &mut self,
        from: &PeerID,
        message: DiceMessage,
        now: Instant,
    ) -> Result<EngineAction> {
        if self.finished.contains_key(from) {
            return Err(DiceError::protocol(
                ResponderState::Done,
                "no further messages",
                message.kind(),
            ));
        }

        let Some(mut run) = self.active_runs.remove(from) else {
            return match self.pending.remove(from) {
                Some(deadline) if now > deadline => Err(DiceError::Timeout {
                    state: ResponderState::Listening.to_string(),
                    after: self.timeout,
                }),
                Some(_) => self.start_run(from, message, now),
                None => Err(DiceError::protocol(
                    ResponderState::Listening,
                    "registered peer",
                    message.kind(),
                )),
            };
        };

        if now > run.deadline {
            return Err(run.session.abort_with(DiceError::Timeout {
                state: String::new(),
                after: self.timeout,
            }));
        }

        let outcome = run
            .session
            .receive_reveal(message)
            .and_then(|_| run.session.finish())?;

        tracing::info!("Run with {} complete: {}", from, outcome);
        self.finished.insert(from.clone(), outcome);
        Ok(EngineAction::Completed(outcome))
    }

    fn start_run(&mut self, from: &PeerID, message: DiceMessage, now: Instant) -> Result<EngineAction> {
        let mut session = ResponderSession::with_scheme(self.scheme.clone());
        session.receive_commit(message)?;
        let reply = session.generate_value()?;
        session.await_reveal()?;

        tracing::debug!("Started run with {}", from);
        self.active_runs.insert(
            from.clone(),
            ActiveRun {
                session,
                deadline: now + self.timeout,
            },
        );

        Ok(EngineAction::Reply(reply))
    }

    /// Abort every run whose commit or reveal is overdue
    pub fn expire_stale(&mut self, now: Instant) -> Vec<(PeerID, DiceError)> {
        let mut aborted = Vec::new();

        let silent: Vec<PeerID> = self
            .pending
            .iter()
            .filter(|(_, deadline)| now > **deadline)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in silent {
            self.pending.remove(&peer);
            aborted.push((
                peer,
                DiceError::Timeout {
                    state: ResponderState::Listening.to_string(),
                    after: self.timeout,
                },
            ));
        }

        let expired: Vec<PeerID> = self
            .active_runs
            .iter()
            .filter(|(_, run)| now > run.deadline)
            .map(|(peer, _)| peer.clone())
            .collect();

        for peer in expired {
            if let Some(mut run) = self.active_runs.remove(&peer) {
                let err = run.session.abort_with(DiceError::Timeout {
                    state: String::new(),
                    after: self.timeout,
                });
                aborted.push((peer, err));
            }
        }
        aborted
    }

    /// Abort an in-flight run; returns whether one existed
    ///
    /// A peer that had not committed yet is forgotten as well.
    pub fn cancel_run(&mut self, peer: &PeerID) -> bool {
        self.pending.remove(peer);
        match self.active_runs.remove(peer) {
            Some(mut run) => {
                run.session.abort();
                true
            }
            None => false,
        }
    }

    /// Forget everything about a peer, e.g. after it disconnected
    pub fn remove_peer(&mut self, peer: &PeerID) {
        self.cancel_run(peer);
        self.finished.remove(peer);
    }

    pub fn get_run(&self, peer: &PeerID) -> Option<&ResponderSession<S>> {
        self.active_runs.get(peer).map(|run| &run.session)
    }

    pub fn outcome_for(&self, peer: &PeerID) -> Option<&Outcome> {
        self.finished.get(peer)
    }

    pub fn active_runs(&self) -> usize {
        self.active_runs.len()
    }

    /// Peers connected but not yet committed
    pub fn pending_peers(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InitiatorSession;
    use crate::types::{DieFace, Identity};

    fn peer(name: &str) -> PeerID {
        PeerID(name.to_string())
    }

    fn initiator(name: &str) -> InitiatorSession {
        InitiatorSession::new(Identity::new(name).unwrap())
    }

    /// Engine with the named peers already connected at `now`
    fn engine_with(timeout: Duration, peers: &[&str], now: Instant) -> ResponderEngine {
        let mut engine = ResponderEngine::new(timeout);
        for name in peers {
            engine.register_peer(&peer(name), now);
        }
        engine
    }

    fn reply_value(action: EngineAction) -> DiceMessage {
        match action {
            EngineAction::Reply(msg) => msg,
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = ResponderEngine::new(Duration::from_secs(5));
        assert_eq!(engine.active_runs(), 0);
        assert_eq!(engine.pending_peers(), 0);
    }

    #[test]
    fn test_full_run_through_engine() {
        let now = Instant::now();
        let mut engine = engine_with(Duration::from_secs(5), &["a"], now);
        let mut alice = initiator("alice");

        let commit = alice.commit().unwrap();
        let reply = reply_value(engine.handle_message(&peer("a"), commit, now).unwrap());
        assert_eq!(engine.active_runs(), 1);
        assert_eq!(
            engine.get_run(&peer("a")).unwrap().state(),
            ResponderState::AwaitingReveal
        );

        alice.await_peer_value().unwrap();
        alice.receive_peer_value(reply).unwrap();
        let reveal = alice.reveal().unwrap();
        let alice_outcome = alice.finish().unwrap();

        let action = engine.handle_message(&peer("a"), reveal, now).unwrap();
        assert_eq!(action, EngineAction::Completed(alice_outcome));
        assert_eq!(engine.active_runs(), 0);
        assert_eq!(engine.outcome_for(&peer("a")), Some(&alice_outcome));
    }

    #[test]
    fn test_runs_are_isolated_per_peer() {
        let now = Instant::now();
        let mut engine = engine_with(Duration::from_secs(5), &["a", "c"], now);

        let mut alice = initiator("alice");
        let mut carol = initiator("carol");

        let a_reply = reply_value(
            engine
                .handle_message(&peer("a"), alice.commit().unwrap(), now)
                .unwrap(),
        );
        let c_reply = reply_value(
            engine
                .handle_message(&peer("c"), carol.commit().unwrap(), now)
                .unwrap(),
        );
        assert_eq!(engine.active_runs(), 2);

        // Carol's reveal sent on Alice's connection must not verify
        carol.await_peer_value().unwrap();
        carol.receive_peer_value(c_reply).unwrap();
        let carol_reveal = carol.reveal().unwrap();

        let result = engine.handle_message(&peer("a"), carol_reveal, now);
        assert!(matches!(result, Err(DiceError::CommitmentMismatch { .. })));

        // Alice's run is gone, Carol's is untouched
        assert!(engine.get_run(&peer("a")).is_none());
        assert!(engine.get_run(&peer("c")).is_some());

        alice.await_peer_value().unwrap();
        alice.receive_peer_value(a_reply).unwrap();
        assert!(alice.reveal().is_ok());
    }

    #[test]
    fn test_reveal_without_commit_is_rejected() {
        let now = Instant::now();
        let mut engine = engine_with(Duration::from_secs(5), &["a"], now);
        let msg = DiceMessage::PeerValue {
            value: DieFace::new(1).unwrap(),
        };

        let result = engine.handle_message(&peer("a"), msg, now);
        assert!(matches!(result, Err(DiceError::Protocol { .. })));
        assert_eq!(engine.active_runs(), 0);
        assert_eq!(engine.pending_peers(), 0);
    }

    #[test]
    fn test_unregistered_peer_cannot_start() {
        let mut engine = ResponderEngine::new(Duration::from_secs(5));

        let result = engine.handle_message(&peer("a"), initiator("alice").commit().unwrap(), Instant::now());
        match result {
            Err(DiceError::Protocol { state, received, .. }) => {
                assert_eq!(state, "Listening");
                assert_eq!(received, "Commit");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(engine.active_runs(), 0);
    }

    #[test]
    fn test_silent_peer_is_expired() {
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let mut engine = engine_with(timeout, &["a", "b"], start);
        assert_eq!(engine.pending_peers(), 2);

        // b commits in time, a never says anything
        engine
            .handle_message(&peer("b"), initiator("bob").commit().unwrap(), start)
            .unwrap();
        assert_eq!(engine.pending_peers(), 1);
        assert!(engine.expire_stale(start).is_empty());

        let expired = engine.expire_stale(start + timeout * 2);
        let silent: Vec<_> = expired
            .iter()
            .filter(|(_, err)| matches!(err, DiceError::Timeout { state, .. } if state == "Listening"))
            .map(|(p, _)| p.clone())
            .collect();
        assert_eq!(silent, vec![peer("a")]);
        assert_eq!(engine.pending_peers(), 0);
    }

    #[test]
    fn test_late_commit_times_out() {
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let mut engine = engine_with(timeout, &["a"], start);

        let result = engine.handle_message(
            &peer("a"),
            initiator("alice").commit().unwrap(),
            start + timeout * 2,
        );
        assert!(matches!(
            result,
            Err(DiceError::Timeout { ref state, .. }) if state == "Listening"
        ));
        assert_eq!(engine.active_runs(), 0);
        assert_eq!(engine.pending_peers(), 0);
    }

    #[test]
    fn test_finished_peer_cannot_start_again() {
        let now = Instant::now();
        let mut engine = engine_with(Duration::from_secs(5), &["a"], now);
        let mut alice = initiator("alice");

        let reply = reply_value(
            engine
                .handle_message(&peer("a"), alice.commit().unwrap(), now)
                .unwrap(),
        );
        alice.await_peer_value().unwrap();
        alice.receive_peer_value(reply).unwrap();
        engine
            .handle_message(&peer("a"), alice.reveal().unwrap(), now)
            .unwrap();

        let result = engine.handle_message(&peer("a"), initiator("alice").commit().unwrap(), now);
        assert!(matches!(result, Err(DiceError::Protocol { .. })));

        engine.remove_peer(&peer("a"));
        assert!(engine.outcome_for(&peer("a")).is_none());
    }

    #[test]
    fn test_expire_stale_runs() {
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let mut engine = engine_with(timeout, &["a"], start);

        engine
            .handle_message(&peer("a"), initiator("alice").commit().unwrap(), start)
            .unwrap();

        assert!(engine.expire_stale(start).is_empty());

        let expired = engine.expire_stale(start + timeout * 2);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, peer("a"));
        assert!(matches!(
            &expired[0].1,
            DiceError::Timeout { state, .. } if state == "AwaitingReveal"
        ));
        assert_eq!(engine.active_runs(), 0);
    }

    #[test]
    fn test_late_reveal_times_out() {
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let mut engine = engine_with(timeout, &["a"], start);
        let mut alice = initiator("alice");

        let reply = reply_value(
            engine
                .handle_message(&peer("a"), alice.commit().unwrap(), start)
                .unwrap(),
        );
        alice.await_peer_value().unwrap();
        alice.receive_peer_value(reply).unwrap();

        let result = engine.handle_message(&peer("a"), alice.reveal().unwrap(), start + timeout * 2);
        assert!(matches!(result, Err(DiceError::Timeout { .. })));
        assert!(engine.outcome_for(&peer("a")).is_none());
    }

    #[test]
    fn test_cancel_run() {
        let now = Instant::now();
        let mut engine = engine_with(Duration::from_secs(5), &["a", "b"], now);
        engine
            .handle_message(&peer("a"), initiator("alice").commit().unwrap(), now)
            .unwrap();

        assert!(engine.cancel_run(&peer("a")));
        assert!(!engine.cancel_run(&peer("a")));
        assert_eq!(engine.active_runs(), 0);

        // Cancelling a silent peer forgets it without a run to abort
        assert!(!engine.cancel_run(&peer("b")));
        assert_eq!(engine.pending_peers(), 0);
    }
}
