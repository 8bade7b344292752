//! server_name (RFC 6066 section 3).

use hext_utils::wire::Reader;

use super::{decode_error, expect_empty, expect_end, illegal_parameter, send_empty};
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::TlsError;

const NAME_TYPE_HOST_NAME: u8 = 0;

pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let Some(host) = ctx.config.server_name.as_deref().filter(|h| !h.is_empty()) else {
        return Ok(None);
    };
    let host = host.as_bytes();
    if host.len() > 0xFFFF - 5 {
        return Err(TlsError::Internal(format!("server name of {} bytes", host.len())));
    }
    Ok(Some(Emission::new(5 + host.len(), move |w| {
        w.append_nested(2, |list| {
            list.append_u8(NAME_TYPE_HOST_NAME)?;
            list.append_var(host, 2)
        })
    })))
}

/// Stores the host name and acknowledges with an empty body.
pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let mut r = Reader::new(data);
    let mut list = r.read_nested(2)?;
    expect_end(&r, "server name list")?;
    if list.is_empty() {
        return Err(decode_error("empty server name list"));
    }
    let mut host = None;
    let mut seen_types = Vec::new();
    while !list.is_empty() {
        let name_type = list.read_u8()?;
        let name = list.read_var(2)?;
        if seen_types.contains(&name_type) {
            return Err(illegal_parameter(format!("duplicate server name type {name_type}")));
        }
        seen_types.push(name_type);
        if name_type == NAME_TYPE_HOST_NAME {
            if name.is_empty() {
                return Err(decode_error("empty host name"));
            }
            host = Some(name.to_vec());
        }
    }
    if let Some(h) = &host {
        tracing::debug!(host = %String::from_utf8_lossy(h), "client sent server name");
    }
    ctx.peer.server_name = host;
    Ok(Some(send_empty))
}

pub(crate) fn client_handle(_ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    expect_empty(data, "server_name acknowledgement")?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TlsConfig;
    use crate::{AlertDescription, TlsRole};

    fn server() -> HandshakeContext {
        HandshakeContext::new(Arc::new(TlsConfig::builder().role(TlsRole::Server).build()))
    }

    #[test]
    fn test_client_send_host_name() {
        let ctx = HandshakeContext::new(Arc::new(
            TlsConfig::builder().server_name("a.example").build(),
        ));
        let emission = client_send(&ctx).unwrap().unwrap();
        assert_eq!(emission.len(), 5 + 9);
    }

    #[test]
    fn test_no_server_name_configured() {
        let ctx = HandshakeContext::new(Arc::new(TlsConfig::builder().build()));
        assert!(client_send(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_server_stores_host() {
        let mut ctx = server();
        let data = [0, 8, 0, 0, 5, b'h', b'o', b's', b't', b'1'];
        assert!(server_handle(&mut ctx, &data).unwrap().is_some());
        assert_eq!(ctx.peer().server_name.as_deref(), Some(&b"host1"[..]));
    }

    #[test]
    fn test_server_rejects_empty_list() {
        let mut ctx = server();
        let err = server_handle(&mut ctx, &[0, 0]).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::DecodeError));
    }

    #[test]
    fn test_server_rejects_duplicate_name_type() {
        let mut ctx = server();
        let data = [0, 8, 0, 0, 1, b'a', 0, 0, 1, b'b'];
        let err = server_handle(&mut ctx, &data).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::IllegalParameter));
    }

    #[test]
    fn test_client_requires_empty_ack() {
        let mut ctx = HandshakeContext::new(Arc::new(TlsConfig::builder().build()));
        assert!(client_handle(&mut ctx, &[]).unwrap().is_none());
        assert!(client_handle(&mut ctx, &[0]).is_err());
    }
}
