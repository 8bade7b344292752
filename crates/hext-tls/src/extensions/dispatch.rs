//! The receive side: walk an extension block, enforce the cross-extension
//! rules and hand each record to its handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{trace, warn};

use super::{find_custom, records, registry, ExtensionType, MessageKind};
use crate::handshake::context::HandshakeContext;
use crate::{AlertDescription, TlsError, TlsRole, VersionClass};

fn fatal(alert: AlertDescription, reason: String) -> TlsError {
    warn!(?alert, %reason, "rejecting extension block");
    TlsError::fatal(alert, reason)
}

/// Process the extension block of a received `kind` message.
///
/// Records are handled in wire order. The first failure aborts the block
/// with the alert to send; handlers that ran before it keep their effects.
pub fn dispatch(ctx: &mut HandshakeContext, kind: MessageKind, blob: &[u8]) -> Result<(), TlsError> {
    let config = Arc::clone(&ctx.config);
    let role = ctx.role();
    let version = ctx.version();
    let class = VersionClass::from(version);
    let msg_ctx = kind.context();
    let mut seen = BTreeSet::new();

    let mut iter = records(blob).peekable();
    while let Some(rec) = iter.next() {
        let rec = rec.map_err(|e| fatal(AlertDescription::DecodeError, e.to_string()))?;
        let ty = rec.ext_type;
        let is_last = iter.peek().is_none();

        if role == TlsRole::Client && !ctx.negotiation.is_advertised(ty) {
            return Err(fatal(
                AlertDescription::UnsupportedExtension,
                format!("{ty} in {kind:?} was never offered"),
            ));
        }
        if !seen.insert(ty) || ctx.negotiation.is_negotiated(ty) {
            return Err(fatal(
                AlertDescription::IllegalParameter,
                format!("duplicate {ty} in {kind:?}"),
            ));
        }

        let custom = find_custom(&config.custom_extensions, ty, msg_ctx);
        if version.is_tls13() && custom.is_none() && !config.tls13_policy.permits(kind, ty) {
            if kind == MessageKind::ClientHello {
                trace!(ext = %ty, "skipping extension not allowed in TLS 1.3 ClientHello");
                continue;
            }
            return Err(fatal(
                AlertDescription::UnsupportedExtension,
                format!("{ty} not allowed in TLS 1.3 {kind:?}"),
            ));
        }

        if kind == MessageKind::ClientHello && ty == ExtensionType::PreSharedKey && !is_last {
            return Err(fatal(
                AlertDescription::IllegalParameter,
                "pre_shared_key is not the last extension".into(),
            ));
        }

        if let Some(handler) = registry::lookup(role, kind, class, ty) {
            match handler(ctx, rec.data) {
                Ok(reply) => {
                    ctx.negotiation.mark_negotiated(ty);
                    if let Some(sender) = reply {
                        ctx.negotiation.register_sender(ty, sender);
                    }
                    trace!(ext = %ty, len = rec.data.len(), "extension handled");
                }
                Err(e) => {
                    let e = match e {
                        e @ TlsError::Fatal { .. } => e,
                        other => TlsError::fatal(
                            other.alert().unwrap_or(AlertDescription::HandshakeFailure),
                            format!("{ty}: {other}"),
                        ),
                    };
                    warn!(ext = %ty, error = %e, "extension handler failed");
                    return Err(e);
                }
            }
        } else if let Some(custom) = custom {
            if let Err(code) = (custom.parse_cb)(msg_ctx, rec.data) {
                let alert =
                    AlertDescription::from_u8(code).unwrap_or(AlertDescription::HandshakeFailure);
                return Err(fatal(alert, format!("custom extension {ty} rejected")));
            }
            ctx.negotiation.mark_negotiated(ty);
            trace!(ext = %ty, "custom extension parsed");
        } else {
            trace!(ext = %ty, ?kind, "ignoring extension without handler");
        }
    }
    Ok(())
}
