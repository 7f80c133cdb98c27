//! Deterministic well-known MAC generation (§3, §6).
//!
//! `well_known_mac(server_id) = base + server_id`, treating the 6-byte base
//! as a big-endian 48-bit integer. `server_id` must be in `[0, 1024)`.

use crate::error::ConfigError;

/// Base MAC for well-known MAC generation: `04:27:28:7A:00:00`.
pub const WELL_KNOWN_MAC_BASE: [u8; 6] = [0x04, 0x27, 0x28, 0x7A, 0x00, 0x00];

/// Upper bound (exclusive) on `server_id` accepted by [`well_known_mac`].
pub const MAX_SERVER_ID: u32 = 1024;

fn mac_to_u64(mac: [u8; 6]) -> u64 {
    mac.iter().fold(0u64, |acc, byte| (acc << 8) | *byte as u64)
}

fn u64_to_mac(value: u64) -> [u8; 6] {
    let bytes = value.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

/// Compute the deterministic well-known MAC for `server_id`.
///
/// Distinct `server_id`s in range always produce distinct MACs, since the
/// mapping is an injective addition over a 48-bit space.
pub fn well_known_mac(server_id: u32) -> Result<[u8; 6], ConfigError> {
    if server_id >= MAX_SERVER_ID {
        return Err(ConfigError::ServerIdOutOfRange(server_id));
    }
    let base = mac_to_u64(WELL_KNOWN_MAC_BASE);
    Ok(u64_to_mac(base + server_id as u64))
}

/// Derive `server_id` from a port name by taking its trailing decimal
/// digits, e.g. `"Ethernet0"` -> `0`, `"Ethernet124"` -> `124`.
pub fn server_id_from_port_name(name: &str) -> Option<u32> {
    let digit_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digit_start..].parse().ok()
}
