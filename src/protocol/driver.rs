//! Drive a single run over a channel
//!
//! Every wait is bounded by `timeout`. On any error the session is aborted
//! before returning, so nothing further goes out on the channel.

use crate::crypto::CommitmentScheme;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::p2p::Channel;
use std::time::Duration;

use super::initiator::InitiatorSession;
use super::responder::ResponderSession;

/// Run the initiator role to completion
pub async fn run_initiator<S, C>(
    mut session: InitiatorSession<S>,
    channel: &mut C,
    timeout: Duration,
) -> Result<Outcome>
where
    S: CommitmentScheme,
    C: Channel + ?Sized,
{
    let commit = session.commit()?;
    channel
        .send(commit)
        .await
        .map_err(|e| session.abort_with(e))?;

    session.await_peer_value()?;
    let reply = channel
        .receive(timeout)
        .await
        .map_err(|e| session.abort_with(e))?;
    session.receive_peer_value(reply)?;

    let reveal = session.reveal()?;
    channel
        .send(reveal)
        .await
        .map_err(|e| session.abort_with(e))?;

    let outcome = session.finish()?;
    tracing::info!("Run complete: {}", outcome);
    Ok(outcome)
}

/// Run the responder role to completion
pub async fn run_responder<S, C>(
    mut session: ResponderSession<S>,
    channel: &mut C,
    timeout: Duration,
) -> Result<Outcome>
where
    S: CommitmentScheme,
    C: Channel + ?Sized,
{
    let commit = channel
        .receive(timeout)
        .await
        .map_err(|e| session.abort_with(e))?;
    session.receive_commit(commit)?;

    let reply = session.generate_value()?;
    channel
        .send(reply)
        .await
        .map_err(|e| session.abort_with(e))?;

    session.await_reveal()?;
    let reveal = channel
        .receive(timeout)
        .await
        .map_err(|e| session.abort_with(e))?;
    session.receive_reveal(reveal)?;

    let outcome = session.finish()?;
    tracing::info!("Run complete: {}", outcome);
    Ok(outcome)
}
