#![no_main]
use hext_tls::session::{decode_new_session_ticket, process_ticket, SessionTicketKeys};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let keys = SessionTicketKeys::from_parts(*b"HXT!fuzz-keyname", [7u8; 32], [9u8; 32]);
    let _ = process_ticket(&keys, data, 172_800, 1_700_000_000);
    let _ = decode_new_session_ticket(data);
});
