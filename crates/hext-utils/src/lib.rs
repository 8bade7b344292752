#![forbid(unsafe_code)]
#![doc = "Utility functions for hext: wire-format cursor, hex encoding."]

#[cfg(feature = "wire")]
pub mod wire;

#[cfg(feature = "hex")]
pub mod hex;
