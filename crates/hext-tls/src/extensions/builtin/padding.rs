//! padding (RFC 7685). Outgoing padding is sized by the emitter.

use crate::extensions::HandlerResult;
use crate::handshake::context::HandshakeContext;

/// The contents carry no meaning and are ignored.
pub(crate) fn server_handle(_ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    tracing::trace!(len = data.len(), "ignoring padding");
    Ok(None)
}
