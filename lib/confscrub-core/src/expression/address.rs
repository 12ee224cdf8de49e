use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::value::ValueSanitizer;

/// Replaces an IP address or CIDR block by a private address of the same family.
///
/// - IPv4 maps into `10.0.0.0/8`, the last three octets taken from the value hash
/// - IPv6 maps into `fd00::/16`, the last seven hextets taken from the value hash
///
/// A CIDR block keeps its prefix length. Returns `None` when `raw` is neither.
pub(crate) fn sanitize_address(values: &ValueSanitizer, raw: &str) -> Option<String> {
    if let Some((address, prefix)) = raw.split_once('/') {
        let ip = address.parse::<IpAddr>().ok()?;
        let prefix_len = prefix.parse::<u8>().ok()?;
        let max_len = if ip.is_ipv4() { 32 } else { 128 };
        if prefix_len > max_len {
            return None;
        }
        let sanitized = replacement(values, address, ip);
        return Some(format!("{sanitized}/{prefix}"));
    }

    let ip = raw.parse::<IpAddr>().ok()?;
    Some(replacement(values, raw, ip).to_string())
}

fn replacement(values: &ValueSanitizer, raw: &str, ip: IpAddr) -> IpAddr {
    let digest = values.digest(raw);
    match ip {
        IpAddr::V4(_) => {
            let [first, second, third, ..] = digest;
            IpAddr::V4(Ipv4Addr::new(10, first, second, third))
        }
        IpAddr::V6(_) => {
            let mut segments = [0xfd00_u16; 8];
            for (segment, pair) in segments.iter_mut().skip(1).zip(digest.chunks_exact(2)) {
                if let [high, low] = pair {
                    *segment = u16::from_be_bytes([*high, *low]);
                }
            }
            IpAddr::V6(Ipv6Addr::from(segments))
        }
    }
}
