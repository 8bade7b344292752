//! Per-handshake state the extension engine reads and updates.

pub mod context;
pub mod key_exchange;
pub mod negotiation;

pub use context::{HandshakeContext, KeyShareState, PeerHello, RenegotiationState, ResumptionState};
pub use key_exchange::KeyExchange;
pub use negotiation::NegotiationState;
