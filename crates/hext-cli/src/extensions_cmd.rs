//! Extension block listing and ClientHello construction.

use std::collections::BTreeSet;
use std::sync::Arc;

use hext_tls::config::TlsConfig;
use hext_tls::extensions::records;
use hext_tls::handshake::HandshakeContext;
use hext_tls::ProtocolVersion;
use hext_utils::hex;

pub fn run(blob: &str) -> Result<(), Box<dyn std::error::Error>> {
    let data = hex::decode(blob.trim())?;
    for line in describe(&data)? {
        println!("{line}");
    }
    Ok(())
}

/// One line per record; duplicates are flagged, not rejected.
fn describe(data: &[u8]) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut seen = BTreeSet::new();
    let mut lines = Vec::new();
    for rec in records(data) {
        let rec = rec.map_err(|e| format!("malformed block after {} records: {e}", lines.len()))?;
        let mut line = format!(
            "{:<28} 0x{:04x}  len={}",
            rec.ext_type.to_string(),
            rec.ext_type.code(),
            rec.data.len()
        );
        if !seen.insert(rec.ext_type) {
            line.push_str("  (duplicate)");
        }
        lines.push(line);
    }
    Ok(lines)
}

pub(crate) fn parse_version(s: &str) -> Result<ProtocolVersion, Box<dyn std::error::Error>> {
    match s {
        "1.0" => Ok(ProtocolVersion::TLS10),
        "1.1" => Ok(ProtocolVersion::TLS11),
        "1.2" => Ok(ProtocolVersion::TLS12),
        "1.3" => Ok(ProtocolVersion::TLS13),
        _ => Err(format!("unsupported TLS version: {s} (use 1.0 to 1.3)").into()),
    }
}

pub fn client_hello(
    server_name: Option<&str>,
    alpn: Option<&str>,
    tls_version: &str,
    prefix_len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let (block, _) = build_client_hello(server_name, alpn, tls_version, prefix_len)?;
    println!("{}", hex::encode(&block));
    for line in describe(&block)? {
        eprintln!("  {line}");
    }
    Ok(())
}

fn build_client_hello(
    server_name: Option<&str>,
    alpn: Option<&str>,
    tls_version: &str,
    prefix_len: usize,
) -> Result<(Vec<u8>, HandshakeContext), Box<dyn std::error::Error>> {
    let max = parse_version(tls_version)?;
    let mut builder = TlsConfig::builder().max_version(max);
    if max < ProtocolVersion::TLS12 {
        builder = builder.min_version(max);
    }
    if let Some(name) = server_name {
        builder = builder.server_name(name);
    }
    if let Some(list) = alpn {
        let protos: Vec<&[u8]> = list.split(',').map(str::as_bytes).collect();
        builder = builder.alpn(&protos);
    }
    let mut ctx = HandshakeContext::new(Arc::new(builder.build()));
    let mut block = Vec::new();
    ctx.build_client_hello_extensions(prefix_len, &mut block)?;
    Ok((block, ctx))
}
