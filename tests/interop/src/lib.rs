//! End-to-end tests for hext.
//! A client context and a server context exchange hello extension blocks
//! through the public API, the way a handshake layer would drive them.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use hext_tls::config::{ClientTicket, TlsConfig, TlsConfigBuilder};
    use hext_tls::extensions::{CustomExtension, ExtensionContext, ExtensionType, MessageKind};
    use hext_tls::handshake::HandshakeContext;
    use hext_tls::session::{global_ticket_keys, SessionState, SessionTicketKeys};
    use hext_tls::{AlertDescription, CipherSuite, ProtocolVersion, TlsError, TlsRole};

    const HELLO_PREFIX_LEN: usize = 80;
    const NOW: u32 = 1_700_000_000;

    fn client(builder: TlsConfigBuilder) -> HandshakeContext {
        HandshakeContext::new(Arc::new(builder.build())).with_time(NOW)
    }

    fn server(builder: TlsConfigBuilder) -> HandshakeContext {
        HandshakeContext::new(Arc::new(builder.role(TlsRole::Server).build())).with_time(NOW)
    }

    fn client_hello(ctx: &mut HandshakeContext) -> Vec<u8> {
        let mut out = Vec::new();
        ctx.build_client_hello_extensions(HELLO_PREFIX_LEN, &mut out).unwrap();
        out
    }

    /// Server side of one hello exchange: returns the ServerHello and
    /// EncryptedExtensions blocks (the latter empty before TLS 1.3).
    fn server_respond(ctx: &mut HandshakeContext, ch: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        ctx.pre_negotiate_version(ProtocolVersion::TLS12, ch)?;
        ctx.dispatch(MessageKind::ClientHello, ch)?;
        let mut sh = Vec::new();
        ctx.build_reply_extensions(MessageKind::ServerHello, &mut sh)?;
        let mut ee = Vec::new();
        if ctx.version().is_tls13() {
            ctx.build_reply_extensions(MessageKind::EncryptedExtensions, &mut ee)?;
        }
        Ok((sh, ee))
    }

    fn client_receive(ctx: &mut HandshakeContext, sh: &[u8], ee: &[u8]) -> Result<(), TlsError> {
        ctx.pre_negotiate_version(ProtocolVersion::TLS12, sh)?;
        ctx.dispatch(MessageKind::ServerHello, sh)?;
        if ctx.version().is_tls13() {
            ctx.dispatch(MessageKind::EncryptedExtensions, ee)?;
        }
        Ok(())
    }

    fn types(blob: &[u8]) -> Vec<ExtensionType> {
        hext_tls::extensions::records(blob)
            .map(|r| r.unwrap().ext_type)
            .collect()
    }

    fn tls12_state(master_secret: &[u8], issued_at: u32) -> SessionState {
        let mut state = SessionState::new(
            ProtocolVersion::TLS12,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            master_secret,
            issued_at,
        );
        state.extended_master_secret = true;
        state
    }

    // -------------------------------------------------------
    // 1. TLS 1.2 full handshake: SNI, ALPN, EMS, tickets, RI
    // -------------------------------------------------------
    #[test]
    fn test_tls12_full_exchange() {
        let keys = Arc::new(SessionTicketKeys::generate().unwrap());
        let mut c = client(
            TlsConfig::builder()
                .server_name("www.example.com")
                .alpn(&[b"h2", b"http/1.1"]),
        );
        let mut s = server(
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .alpn(&[b"http/1.1"])
                .ticket_keys(keys),
        );

        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert_eq!(s.version(), ProtocolVersion::TLS12);
        assert!(ee.is_empty());
        assert_eq!(s.peer().server_name.as_deref(), Some(&b"www.example.com"[..]));
        assert!(!s.negotiation().is_negotiated(ExtensionType::KeyShare));

        let reply = types(&sh);
        for t in [
            ExtensionType::ServerName,
            ExtensionType::EcPointFormats,
            ExtensionType::Alpn,
            ExtensionType::ExtendedMasterSecret,
            ExtensionType::SessionTicket,
            ExtensionType::RenegotiationInfo,
        ] {
            assert!(reply.contains(&t), "missing {t}");
        }

        client_receive(&mut c, &sh, &ee).unwrap();
        assert_eq!(c.version(), ProtocolVersion::TLS12);
        assert_eq!(c.app_protocol().selected(), Some(&b"http/1.1"[..]));
        assert_eq!(s.app_protocol().selected(), Some(&b"http/1.1"[..]));
        assert!(c.extended_master_secret() && s.extended_master_secret());
        assert!(c.renegotiation().secure && s.renegotiation().secure);
        assert!(c.resumption().expect_new_session_ticket);
    }

    // -------------------------------------------------------
    // 2. TLS 1.3 full handshake: key share, SH/EE split
    // -------------------------------------------------------
    #[test]
    fn test_tls13_full_exchange() {
        let mut c = client(
            TlsConfig::builder()
                .server_name("api.example.com")
                .alpn(&[b"h2"]),
        );
        let mut s = server(TlsConfig::builder().alpn(&[b"h2"]));

        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert_eq!(s.version(), ProtocolVersion::TLS13);
        assert_eq!(types(&sh), vec![ExtensionType::SupportedVersions, ExtensionType::KeyShare]);
        assert_eq!(types(&ee), vec![ExtensionType::ServerName, ExtensionType::Alpn]);
        // pre-1.3 only extensions were skipped, not processed
        assert!(!s.negotiation().is_negotiated(ExtensionType::ExtendedMasterSecret));
        assert!(!s.negotiation().is_negotiated(ExtensionType::SessionTicket));

        client_receive(&mut c, &sh, &ee).unwrap();
        assert_eq!(c.version(), ProtocolVersion::TLS13);
        assert!(c.app_protocol().alpn_negotiated());
        let client_secret = c.shared_secret().unwrap().to_vec();
        assert_eq!(client_secret.len(), 32);
        assert_eq!(s.shared_secret(), Some(client_secret.as_slice()));
    }

    // -------------------------------------------------------
    // 3. TLS 1.2 session ticket: issue, store, resume
    // -------------------------------------------------------
    #[test]
    fn test_tls12_ticket_resumption() {
        let keys = Arc::new(SessionTicketKeys::generate().unwrap());
        let server_config = || {
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .ticket_keys(Arc::clone(&keys))
        };

        // first connection: full handshake, server issues a ticket
        let mut c = client(TlsConfig::builder().max_version(ProtocolVersion::TLS12));
        let mut s = server(server_config());
        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert!(s.resumed_session().is_none());
        client_receive(&mut c, &sh, &ee).unwrap();
        let nst = s.issue_new_session_ticket(&tls12_state(&[0x77; 48], NOW)).unwrap();
        let nst = c.receive_new_session_ticket(&nst).unwrap();

        // second connection, ten seconds later
        let ticket = ClientTicket {
            ticket: nst.ticket,
            received_at: NOW,
            age_add: 0,
        };
        let mut c2 = HandshakeContext::new(Arc::new(
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .resumption_ticket(ticket)
                .build(),
        ))
        .with_time(NOW + 10);
        let mut s2 = HandshakeContext::new(Arc::new(server_config().role(TlsRole::Server).build()))
            .with_time(NOW + 10);
        let ch = client_hello(&mut c2);
        server_respond(&mut s2, &ch).unwrap();

        let resumed = s2.resumed_session().unwrap();
        assert_eq!(resumed.cipher_suite, CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256);
        assert_eq!(resumed.master_secret.bytes(), &[0x77; 48][..]);
        assert!(resumed.extended_master_secret);
        assert!(resumed.resumable);
    }

    // -------------------------------------------------------
    // 4. TLS 1.3 PSK resumption with a ticket identity
    // -------------------------------------------------------
    #[test]
    fn test_tls13_psk_resumption() {
        let keys = Arc::new(SessionTicketKeys::generate().unwrap());
        let state = SessionState::new(
            ProtocolVersion::TLS13,
            CipherSuite::TLS_AES_128_GCM_SHA256,
            &[0x13; 32],
            NOW - 30,
        );
        let ticket = hext_tls::session::issue_ticket(&keys, &state).unwrap();

        let mut c = client(
            TlsConfig::builder()
                .server_name("resume.example")
                .resumption_ticket(ClientTicket {
                    ticket,
                    received_at: NOW - 30,
                    age_add: 0x0102_0304,
                }),
        );
        let mut s = server(TlsConfig::builder().ticket_keys(keys));

        let ch = client_hello(&mut c);
        let ch_types = types(&ch);
        assert_eq!(ch_types.last(), Some(&ExtensionType::PreSharedKey));
        assert!(c.resumption().psk_offered);

        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert_eq!(s.resumption().psk_selected, Some(0));
        assert_eq!(
            s.resumed_session().map(|r| r.cipher_suite),
            Some(CipherSuite::TLS_AES_128_GCM_SHA256)
        );
        assert!(types(&sh).contains(&ExtensionType::PreSharedKey));

        client_receive(&mut c, &sh, &ee).unwrap();
        assert_eq!(c.resumption().psk_selected, Some(0));
    }

    // -------------------------------------------------------
    // 5. Expired and foreign tickets fall back silently
    // -------------------------------------------------------
    #[test]
    fn test_bad_tickets_fall_back_to_full_handshake() {
        let keys = Arc::new(SessionTicketKeys::generate().unwrap());
        let other = SessionTicketKeys::generate().unwrap();
        let expired = hext_tls::session::issue_ticket(&keys, &tls12_state(&[1; 48], NOW - 2)).unwrap();
        let foreign = hext_tls::session::issue_ticket(&other, &tls12_state(&[1; 48], NOW)).unwrap();

        for ticket in [expired, foreign] {
            let mut c = client(
                TlsConfig::builder()
                    .max_version(ProtocolVersion::TLS12)
                    .resumption_ticket(ClientTicket {
                        ticket,
                        received_at: NOW,
                        age_add: 0,
                    }),
            );
            let mut s = server(
                TlsConfig::builder()
                    .ticket_lifetime_hint(1)
                    .ticket_keys(Arc::clone(&keys)),
            );
            let ch = client_hello(&mut c);
            let (sh, ee) = server_respond(&mut s, &ch).unwrap();
            assert!(s.resumed_session().is_none());
            // a new ticket is still promised
            assert!(types(&sh).contains(&ExtensionType::SessionTicket));
            client_receive(&mut c, &sh, &ee).unwrap();
        }
    }

    // -------------------------------------------------------
    // 6. Process-wide ticket keys shared between servers
    // -------------------------------------------------------
    #[test]
    fn test_global_ticket_keys_shared() {
        let a = Arc::clone(global_ticket_keys(b"interop long-term key").unwrap());
        let b = Arc::clone(global_ticket_keys(b"ignored on later calls").unwrap());
        assert!(Arc::ptr_eq(&a, &b));

        let s1 = server(TlsConfig::builder().ticket_keys(a));
        let body = s1.issue_new_session_ticket(&tls12_state(&[9; 48], NOW)).unwrap();
        let nst = hext_tls::session::decode_new_session_ticket(&body).unwrap();

        let mut c = client(
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .resumption_ticket(ClientTicket {
                    ticket: nst.ticket,
                    received_at: NOW,
                    age_add: 0,
                }),
        );
        let mut s2 = server(TlsConfig::builder().ticket_keys(b));
        let ch = client_hello(&mut c);
        server_respond(&mut s2, &ch).unwrap();
        assert!(s2.resumed_session().is_some());
    }

    // -------------------------------------------------------
    // 7. ALPN without overlap, and a server that ignores ALPN
    // -------------------------------------------------------
    #[test]
    fn test_alpn_no_overlap_is_fatal() {
        let mut c = client(TlsConfig::builder().alpn(&[b"h2"]));
        let mut s = server(TlsConfig::builder().alpn(&[b"imap"]));
        let ch = client_hello(&mut c);
        let err = server_respond(&mut s, &ch).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::NoApplicationProtocol));
        assert_eq!(err.to_alert().map(|a| a.to_bytes()), Some([2, 120]));
    }

    #[test]
    fn test_server_without_alpn_ignores_offer() {
        let mut c = client(TlsConfig::builder().alpn(&[b"h2"]));
        let mut s = server(TlsConfig::builder());
        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert!(!types(&ee).contains(&ExtensionType::Alpn));
        client_receive(&mut c, &sh, &ee).unwrap();
        assert_eq!(c.app_protocol().selected(), None);
    }

    // -------------------------------------------------------
    // 8. ALPN wins over NPN on a TLS 1.2 server
    // -------------------------------------------------------
    #[test]
    fn test_alpn_suppresses_npn_reply() {
        let mut c = client(
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .alpn(&[b"h2"])
                .npn(&[b"h2"]),
        );
        let mut s = server(TlsConfig::builder().alpn(&[b"h2"]).npn(&[b"h2", b"spdy/3"]));
        let ch = client_hello(&mut c);
        assert!(types(&ch).contains(&ExtensionType::NextProtocolNegotiation));
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        let reply = types(&sh);
        assert!(reply.contains(&ExtensionType::Alpn));
        assert!(!reply.contains(&ExtensionType::NextProtocolNegotiation));
        client_receive(&mut c, &sh, &ee).unwrap();
        assert!(c.app_protocol().alpn_negotiated());
        assert!(c.build_next_protocol().is_err());
    }

    // -------------------------------------------------------
    // 9. Secure renegotiation binds the previous Finished
    // -------------------------------------------------------
    #[test]
    fn test_secure_renegotiation() {
        let cvd = [0xC1; 12];
        let svd = [0x5E; 12];
        let config = |role| {
            Arc::new(
                TlsConfig::builder()
                    .role(role)
                    .max_version(ProtocolVersion::TLS12)
                    .build(),
            )
        };
        let mut c = HandshakeContext::renegotiating(config(TlsRole::Client), &cvd, &svd);
        let mut s = HandshakeContext::renegotiating(config(TlsRole::Server), &cvd, &svd);
        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        client_receive(&mut c, &sh, &ee).unwrap();
        assert!(c.renegotiation().secure && s.renegotiation().secure);

        // a server that lost the previous Finished must refuse
        let mut c = HandshakeContext::renegotiating(config(TlsRole::Client), &cvd, &svd);
        let mut s = HandshakeContext::new(config(TlsRole::Server));
        let ch = client_hello(&mut c);
        let err = server_respond(&mut s, &ch).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::HandshakeFailure));
    }

    // -------------------------------------------------------
    // 10. Application-registered extension both ways
    // -------------------------------------------------------
    #[test]
    fn test_custom_extension_round_trip() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let custom = CustomExtension {
            extension_type: 0xFE00,
            context: ExtensionContext::CLIENT_HELLO | ExtensionContext::SERVER_HELLO,
            add_cb: Arc::new(|ctx: ExtensionContext| -> Option<Vec<u8>> {
                if ctx.contains(ExtensionContext::CLIENT_HELLO) {
                    Some(b"ping".to_vec())
                } else {
                    Some(b"pong".to_vec())
                }
            }),
            parse_cb: Arc::new(move |_: ExtensionContext, data: &[u8]| -> Result<(), u8> {
                counter.fetch_add(1, Ordering::SeqCst);
                if data == b"ping" || data == b"pong" {
                    Ok(())
                } else {
                    Err(AlertDescription::IllegalParameter as u8)
                }
            }),
        };
        let mut c = client(
            TlsConfig::builder()
                .max_version(ProtocolVersion::TLS12)
                .custom_extension(custom.clone()),
        );
        let mut s = server(TlsConfig::builder().custom_extension(custom));
        let ch = client_hello(&mut c);
        let (sh, ee) = server_respond(&mut s, &ch).unwrap();
        assert!(types(&sh).contains(&ExtensionType::Unknown(0xFE00)));
        client_receive(&mut c, &sh, &ee).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(c.negotiation().is_negotiated(ExtensionType::from(0xFE00)));
    }

    // -------------------------------------------------------
    // 11. Client refuses unsolicited and downgraded replies
    // -------------------------------------------------------
    #[test]
    fn test_client_refuses_unsolicited_extension() {
        let mut c = client(TlsConfig::builder().max_version(ProtocolVersion::TLS12));
        let mut s = server(TlsConfig::builder().max_version(ProtocolVersion::TLS12));
        let ch = client_hello(&mut c);
        let (mut sh, ee) = server_respond(&mut s, &ch).unwrap();
        // heartbeat was never offered
        sh.extend_from_slice(&[0, 15, 0, 1, 1]);
        let err = client_receive(&mut c, &sh, &ee).unwrap_err();
        assert_eq!(err.alert(), Some(AlertDescription::UnsupportedExtension));
    }

    #[test]
    fn test_no_common_group_leaves_secret_unset() {
        let mut c = client(
            TlsConfig::builder()
                .supported_groups(&[hext_tls::crypt::NamedGroup::X25519])
                .key_share_group(hext_tls::crypt::NamedGroup::X25519),
        );
        let mut s = server(
            TlsConfig::builder().supported_groups(&[hext_tls::crypt::NamedGroup::SECP256R1]),
        );
        let ch = client_hello(&mut c);
        let (sh, _) = server_respond(&mut s, &ch).unwrap();
        assert!(!types(&sh).contains(&ExtensionType::KeyShare));
        assert_eq!(s.key_share().retry_group, None);
        assert!(s.shared_secret().is_none());
    }
}
