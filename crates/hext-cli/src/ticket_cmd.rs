//! Session ticket issue and inspection.

use std::time::{SystemTime, UNIX_EPOCH};

use hext_tls::session::{
    decrypt_ticket, issue_ticket, process_ticket, ClientIdentity, ServerNameEntry, SessionState,
    SessionTicketKeys,
};
use hext_tls::CipherSuite;
use hext_utils::hex;

use crate::extensions_cmd::parse_version;

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn parse_cipher(s: &str) -> Result<CipherSuite, Box<dyn std::error::Error>> {
    let code = u16::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("invalid cipher suite {s}: {e}"))?;
    Ok(CipherSuite(code))
}

pub fn issue(
    key: &str,
    tls_version: &str,
    cipher: &str,
    master_secret: &str,
    server_name: Option<&str>,
    timestamp: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ticket = seal(key, tls_version, cipher, master_secret, server_name, timestamp)?;
    println!("{}", hex::encode(&ticket));
    Ok(())
}

fn seal(
    key: &str,
    tls_version: &str,
    cipher: &str,
    master_secret: &str,
    server_name: Option<&str>,
    timestamp: Option<u32>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let keys = SessionTicketKeys::derive(key.as_bytes())?;
    tracing::debug!(key_name = %hex::encode(keys.key_name()), "derived ticket keys");
    let secret = hex::decode(master_secret)?;
    let mut state = SessionState::new(
        parse_version(tls_version)?,
        parse_cipher(cipher)?,
        &secret,
        timestamp.unwrap_or_else(now_secs),
    );
    state.server_name = server_name.map(|host| ServerNameEntry {
        name_type: 0,
        host: host.as_bytes().to_vec(),
    });
    Ok(issue_ticket(&keys, &state)?)
}

pub fn inspect(
    key: &str,
    ticket: &str,
    lifetime: u32,
    now: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    for line in report(key, ticket, lifetime, now.unwrap_or_else(now_secs))? {
        println!("{line}");
    }
    Ok(())
}

fn report(
    key: &str,
    ticket: &str,
    lifetime: u32,
    now: u32,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let keys = SessionTicketKeys::derive(key.as_bytes())?;
    let ticket = hex::decode(ticket.trim())?;
    let state = decrypt_ticket(&keys, &ticket).map_err(|e| format!("ticket rejected: {e}"))?;

    let mut lines = vec![
        format!("version:        0x{:04x}", state.version.0),
        format!("cipher_suite:   0x{:04x}", state.cipher_suite.0),
        format!("issued_at:      {}", state.timestamp),
        format!("ems:            {}", state.extended_master_secret),
    ];
    if state.master_secret.is_wrapped() {
        lines.push(format!("master_secret:  wrapped, {} bytes", state.master_secret.bytes().len()));
    } else {
        lines.push(format!("master_secret:  {} bytes", state.master_secret.bytes().len()));
    }
    if let Some(sn) = &state.server_name {
        lines.push(format!("server_name:    {}", String::from_utf8_lossy(&sn.host)));
    }
    if let ClientIdentity::Certificate(der) = &state.client_identity {
        lines.push(format!("client_cert:    {} bytes", der.len()));
    }
    let status = match process_ticket(&keys, &ticket, lifetime, now) {
        Some(_) => "valid",
        None => "expired",
    };
    lines.push(format!("status:         {status}"));
    Ok(lines)
}
