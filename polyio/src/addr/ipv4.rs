//! IPv4 address values.

use std::{fmt, net, str::FromStr};

use super::AddrParseError;

/// An IPv4 address: four bytes in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv4Address {
    octets: [u8; 4],
}

impl Ipv4Address {
    /// The "no address" value, `0.0.0.0`.
    pub const NONE: Ipv4Address = Ipv4Address::new([0, 0, 0, 0]);
    /// The wildcard bind address, `0.0.0.0`.
    pub const ANY: Ipv4Address = Ipv4Address::new([0, 0, 0, 0]);
    /// The limited broadcast address, `255.255.255.255`.
    pub const BROADCAST: Ipv4Address = Ipv4Address::new([255, 255, 255, 255]);
    /// The loopback address, `127.0.0.1`.
    pub const LOCALHOST: Ipv4Address = Ipv4Address::new([127, 0, 0, 1]);

    /// Build an address from its four octets.
    pub const fn new(octets: [u8; 4]) -> Self {
        Self { octets }
    }

    /// The four octets in transmission order.
    pub const fn octets(&self) -> [u8; 4] {
        self.octets
    }

    /// The address as a `u32` with network-order semantics: the first
    /// transmitted octet is the most significant byte.
    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.octets)
    }

    /// Build an address from a `u32` with network-order semantics.
    pub fn from_u32(value: u32) -> Self {
        Self::new(value.to_be_bytes())
    }

    /// Parse text into an address without reporting a cause.
    ///
    /// Tries the numeric `d.d.d.d` form first and falls back to
    /// resolving the text as a DNS A record, taking the first address
    /// returned.
    pub fn try_parse(text: &str) -> Option<Ipv4Address> {
        if let Ok(parsed) = text.parse::<net::Ipv4Addr>() {
            return Some(parsed.into());
        }
        resolve_a_record(text)
    }
}

// Resolve through the system resolver; (host, 0) goes through
// getaddrinfo under the hood.
fn resolve_a_record(host: &str) -> Option<Ipv4Address> {
    use std::net::ToSocketAddrs;

    let addresses = (host, 0u16).to_socket_addrs().ok()?;
    for address in addresses {
        if let net::SocketAddr::V4(v4) = address {
            return Some((*v4.ip()).into());
        }
    }
    None
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Self::new(octets)
    }
}

impl From<net::Ipv4Addr> for Ipv4Address {
    fn from(address: net::Ipv4Addr) -> Self {
        Self::new(address.octets())
    }
}

impl From<Ipv4Address> for net::Ipv4Addr {
    fn from(address: Ipv4Address) -> Self {
        net::Ipv4Addr::from(address.octets)
    }
}

impl FromStr for Ipv4Address {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ipv4Address::try_parse(text).ok_or_else(|| AddrParseError::new("IPv4", text))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.octets[0], self.octets[1], self.octets[2], self.octets[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        assert_eq!(Ipv4Address::NONE.octets(), [0, 0, 0, 0]);
        assert_eq!(Ipv4Address::ANY, Ipv4Address::NONE);
        assert_eq!(Ipv4Address::BROADCAST.octets(), [255, 255, 255, 255]);
        assert_eq!(Ipv4Address::LOCALHOST.octets(), [127, 0, 0, 1]);
    }

    #[test]
    fn parse_format_round_trip() {
        let address: Ipv4Address = "127.0.0.1".parse().unwrap();
        assert_eq!(address.octets(), [127, 0, 0, 1]);
        assert_eq!(address.to_string(), "127.0.0.1");
        assert_eq!(address.to_u32(), 0x7F00_0001);
    }

    #[test]
    fn u32_helper_uses_network_order_semantics() {
        let address = Ipv4Address::from_u32(0xC0A8_0001);
        assert_eq!(address.to_string(), "192.168.0.1");
        assert_eq!(address.to_u32(), 0xC0A8_0001);
    }

    #[test]
    fn rejects_malformed_numeric_text() {
        assert!(Ipv4Address::try_parse("1.2.3.4.5").is_none());
        assert!(Ipv4Address::try_parse("256.0.0.1").is_none());
        assert!(Ipv4Address::try_parse("").is_none());
        assert!("no#such#host".parse::<Ipv4Address>().is_err());
    }

    #[test]
    fn resolves_localhost() {
        let address = Ipv4Address::try_parse("localhost");
        // Every sane resolver maps localhost onto loopback.
        assert_eq!(address, Some(Ipv4Address::LOCALHOST));
    }

    #[test]
    fn formats_without_leading_zeros() {
        let address = Ipv4Address::new([1, 2, 3, 4]);
        assert_eq!(address.to_string(), "1.2.3.4");
        assert_eq!("1.2.3.4".parse::<Ipv4Address>().unwrap(), address);
    }
}
