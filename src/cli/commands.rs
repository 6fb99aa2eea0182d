//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fairdice")]
#[command(about = "fairdice - commit-reveal dice roll between two parties", long_about = None)]
pub struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve as responder for any number of initiators
    Respond {
        /// Address to listen on
        #[arg(short, long)]
        listen: Option<String>,

        /// Seconds to wait for each reveal
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Roll against a responder as the initiator
    Roll {
        /// Responder address
        #[arg(short, long)]
        peer: Option<String>,

        /// Identity bound into the commitment
        #[arg(short, long)]
        identity: Option<String>,

        /// Seconds to wait for the responder's value
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Play both roles in-process
    Local {
        /// Identity of the initiator
        #[arg(short, long)]
        identity: Option<String>,
    },

    /// Compute a commitment offline
    Commit {
        /// Identity bound into the commitment
        #[arg(short, long)]
        identity: String,

        /// Die face (1-6)
        #[arg(short, long)]
        value: u8,

        /// Nonce as 64 hex chars; random if omitted
        #[arg(short, long)]
        nonce: Option<String>,
    },

    /// Check an opening against a commitment offline
    Verify {
        /// Identity bound into the commitment
        #[arg(short, long)]
        identity: String,

        /// Claimed die face (1-6)
        #[arg(short, long)]
        value: u8,

        /// Nonce as 64 hex chars
        #[arg(short, long)]
        nonce: String,

        /// Commitment as 64 hex chars
        #[arg(short = 'm', long)]
        commitment: String,
    },
}
