#![forbid(unsafe_code)]
#![doc = "Common error types, alert codes, and protocol identifiers for hext."]

pub mod alert;
pub mod error;
pub mod version;

pub use alert::*;
pub use error::*;
pub use version::*;
