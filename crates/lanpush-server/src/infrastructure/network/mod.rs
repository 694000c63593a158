//! Network infrastructure.
//!
//! - **`lan_address`** – Discovers the outbound LAN IPv4 address that goes
//!   into the pairing payload.

pub mod lan_address;
