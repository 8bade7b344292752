//! supported_versions (RFC 8446 section 4.2.1).

use super::{decode_error, illegal_parameter, read_u16_list};
use crate::config::TlsConfig;
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::{ProtocolVersion, TlsError};

const KNOWN_VERSIONS: [ProtocolVersion; 4] = [
    ProtocolVersion::TLS13,
    ProtocolVersion::TLS12,
    ProtocolVersion::TLS11,
    ProtocolVersion::TLS10,
];

/// Decode the ClientHello form: a u8-prefixed list of versions.
pub fn parse_client_versions(data: &[u8]) -> Result<Vec<ProtocolVersion>, TlsError> {
    let versions = read_u16_list(data, 1, "supported_versions")?;
    Ok(versions.into_iter().map(ProtocolVersion).collect())
}

/// The highest offered version inside the configured range. Unknown and
/// GREASE values never match.
pub fn select_version(config: &TlsConfig, offered: &[ProtocolVersion]) -> Option<ProtocolVersion> {
    offered
        .iter()
        .copied()
        .filter(|v| KNOWN_VERSIONS.contains(v) && config.allows_version(*v))
        .max()
}

fn offered_versions(config: &TlsConfig) -> impl Iterator<Item = ProtocolVersion> + '_ {
    KNOWN_VERSIONS.into_iter().filter(|v| config.allows_version(*v))
}

pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.allows_tls13() {
        return Ok(None);
    }
    let count = offered_versions(config).count();
    Ok(Some(Emission::new(1 + 2 * count, move |w| {
        w.append_nested(1, |l| offered_versions(config).try_for_each(|v| l.append_u16(v.0)))
    })))
}

pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    ctx.peer.supported_versions = parse_client_versions(data)?;
    if !ctx.version().is_tls13() {
        return Ok(None);
    }
    Ok(Some(server_reply))
}

fn server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    let version = ctx.version();
    Ok(Some(Emission::new(2, move |w| w.append_u16(version.0))))
}

/// The server's selection must be TLS 1.3 and something we offered.
pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let [hi, lo] = data else {
        return Err(decode_error(format!("supported_versions of {} bytes", data.len())));
    };
    let selected = ProtocolVersion(u16::from_be_bytes([*hi, *lo]));
    if selected != ProtocolVersion::TLS13 || !ctx.config.allows_version(selected) {
        return Err(illegal_parameter(format!(
            "server selected version 0x{:04x}",
            selected.0
        )));
    }
    ctx.set_version(selected);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{AlertDescription, TlsRole};

    #[test]
    fn test_select_highest_common() {
        let config = TlsConfig::builder().build();
        let offered = [
            ProtocolVersion(0x7a7a),
            ProtocolVersion::TLS12,
            ProtocolVersion::TLS13,
        ];
        assert_eq!(select_version(&config, &offered), Some(ProtocolVersion::TLS13));

        let config = TlsConfig::builder().max_version(ProtocolVersion::TLS12).build();
        assert_eq!(select_version(&config, &offered), Some(ProtocolVersion::TLS12));

        assert_eq!(select_version(&config, &[ProtocolVersion::TLS11]), None);
    }

    #[test]
    fn test_parse_client_versions() {
        assert_eq!(
            parse_client_versions(&[4, 3, 4, 3, 3]).unwrap(),
            vec![ProtocolVersion::TLS13, ProtocolVersion::TLS12]
        );
        assert!(parse_client_versions(&[3, 3, 4, 3]).is_err());
        assert!(parse_client_versions(&[0]).is_err());
    }

    #[test]
    fn test_client_lists_range_descending() {
        let ctx = HandshakeContext::new(Arc::new(TlsConfig::builder().build()));
        let emission = client_send(&ctx).unwrap().unwrap();
        assert_eq!(emission.len(), 5);
        let mut emitter = crate::extensions::ExtensionEmitter::new();
        emitter.push(crate::extensions::ExtensionType::SupportedVersions, emission);
        let mut block = Vec::new();
        emitter.write(&mut block, 100).unwrap();
        assert_eq!(block, vec![0, 43, 0, 5, 4, 3, 4, 3, 3]);
    }

    #[test]
    fn test_client_without_tls13_sends_nothing() {
        let config = TlsConfig::builder().max_version(ProtocolVersion::TLS12).build();
        let ctx = HandshakeContext::new(Arc::new(config));
        assert!(client_send(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_client_rejects_downgraded_selection() {
        let mut ctx = HandshakeContext::new(Arc::new(TlsConfig::builder().build()));
        let err = client_handle(&mut ctx, &[3, 3]).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::IllegalParameter));
        let err = client_handle(&mut ctx, &[3, 4, 0]).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::DecodeError));
        client_handle(&mut ctx, &[3, 4]).unwrap();
        assert_eq!(ctx.version(), ProtocolVersion::TLS13);
    }

    #[test]
    fn test_server_replies_under_tls13() {
        let config = TlsConfig::builder().role(TlsRole::Server).build();
        let mut ctx = HandshakeContext::new(Arc::new(config));
        ctx.set_version(ProtocolVersion::TLS13);
        assert!(server_handle(&mut ctx, &[2, 3, 4]).unwrap().is_some());
        assert_eq!(ctx.peer().supported_versions, vec![ProtocolVersion::TLS13]);
    }
}
