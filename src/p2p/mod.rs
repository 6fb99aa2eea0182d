//! Transport module for fairdice

pub mod channel;
pub mod framed;
pub mod message;
pub mod network_manager;

pub use channel::{Channel, MemoryChannel};
pub use framed::{FramedChannel, TcpChannel};
pub use message::{DiceMessage, MessageKind, RevealPacket};
pub use network_manager::{NetworkEvent, NetworkManager};
