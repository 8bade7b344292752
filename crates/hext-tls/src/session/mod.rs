//! Session-ticket resumption (RFC 5077 envelope).

pub mod keys;
pub mod ticket;

pub use keys::{global as global_ticket_keys, SessionTicketKeys};
pub use ticket::{
    decode_new_session_ticket, decrypt_ticket, encode_new_session_ticket, issue_ticket,
    process_ticket, ClientIdentity, KeyInfo, MasterSecret, NewSessionTicket, ResumedSession,
    ServerNameEntry, SessionState, TicketError,
};
