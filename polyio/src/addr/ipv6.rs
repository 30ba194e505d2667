//! IPv6 address values.

use std::{fmt, net, str::FromStr};

use super::AddrParseError;

/// An IPv6 address: sixteen bytes in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv6Address {
    octets: [u8; 16],
}

impl Ipv6Address {
    /// The "no address" value, `::`.
    pub const NONE: Ipv6Address = Ipv6Address::new([0; 16]);
    /// The wildcard bind address, `::`.
    pub const ANY: Ipv6Address = Ipv6Address::new([0; 16]);
    /// The loopback address, `::1`.
    pub const LOCALHOST: Ipv6Address =
        Ipv6Address::new([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    /// The all-ones address.
    pub const BROADCAST: Ipv6Address = Ipv6Address::new([255; 16]);

    /// Build an address from its sixteen octets.
    pub const fn new(octets: [u8; 16]) -> Self {
        Self { octets }
    }

    /// The sixteen octets in transmission order.
    pub const fn octets(&self) -> [u8; 16] {
        self.octets
    }

    /// Parse text into an address without reporting a cause.
    ///
    /// Tries the numeric form first. The literal `localhost` (any
    /// case) maps to `::1` without consulting DNS; any other
    /// non-numeric text is resolved as a DNS AAAA record.
    pub fn try_parse(text: &str) -> Option<Ipv6Address> {
        if let Ok(parsed) = text.parse::<net::Ipv6Addr>() {
            return Some(parsed.into());
        }
        // "localhost" does not reliably resolve to an AAAA record on
        // every resolver configuration.
        if text.eq_ignore_ascii_case("localhost") {
            return Some(Ipv6Address::LOCALHOST);
        }
        resolve_aaaa_record(text)
    }

    // The eight 16-bit groups, host order.
    fn words(&self) -> [u16; 8] {
        let mut words = [0u16; 8];
        for (index, word) in words.iter_mut().enumerate() {
            *word = u16::from_be_bytes([self.octets[2 * index], self.octets[2 * index + 1]]);
        }
        words
    }
}

fn resolve_aaaa_record(host: &str) -> Option<Ipv6Address> {
    use std::net::ToSocketAddrs;

    let addresses = (host, 0u16).to_socket_addrs().ok()?;
    for address in addresses {
        if let net::SocketAddr::V6(v6) = address {
            return Some((*v6.ip()).into());
        }
    }
    None
}

impl From<[u8; 16]> for Ipv6Address {
    fn from(octets: [u8; 16]) -> Self {
        Self::new(octets)
    }
}

impl From<net::Ipv6Addr> for Ipv6Address {
    fn from(address: net::Ipv6Addr) -> Self {
        Self::new(address.octets())
    }
}

impl From<Ipv6Address> for net::Ipv6Addr {
    fn from(address: Ipv6Address) -> Self {
        net::Ipv6Addr::from(address.octets)
    }
}

impl FromStr for Ipv6Address {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ipv6Address::try_parse(text).ok_or_else(|| AddrParseError::new("IPv6", text))
    }
}

impl fmt::Display for Ipv6Address {
    /// Canonical lowercase-hex groups. The longest run of two or more
    /// zero groups is compressed to `::`; a single zero group between
    /// non-zero neighbours renders as `:0:`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.words();

        let mut best_start = 0;
        let mut best_length = 0;
        let mut run_start = 0;
        let mut in_run = false;
        for (index, word) in words.iter().enumerate() {
            if *word == 0 {
                if !in_run {
                    run_start = index;
                    in_run = true;
                }
            } else if in_run {
                in_run = false;
                let length = index - run_start;
                if length > best_length {
                    best_start = run_start;
                    best_length = length;
                }
            }
        }
        if in_run {
            let length = words.len() - run_start;
            if length > best_length {
                best_start = run_start;
                best_length = length;
            }
        }

        for (index, word) in words.iter().enumerate() {
            if index == best_start && best_length > 1 {
                f.write_str("::")?;
            } else if index == best_start && best_length == 1 {
                f.write_str(":0:")?;
            } else if index < best_start || index >= best_start + best_length {
                write!(f, "{word:x}")?;
                if index + 1 < words.len() && index + 1 != best_start {
                    f.write_str(":")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(octets: [u8; 16]) -> String {
        Ipv6Address::new(octets).to_string()
    }

    #[test]
    fn constants() {
        assert_eq!(Ipv6Address::NONE.to_string(), "::");
        assert_eq!(Ipv6Address::ANY, Ipv6Address::NONE);
        assert_eq!(Ipv6Address::LOCALHOST.to_string(), "::1");
        assert_eq!(Ipv6Address::BROADCAST.octets(), [255; 16]);
    }

    #[test]
    fn compresses_the_longest_zero_run() {
        // 1::1, not 1:0:0:0:0:0:0:1.
        let octets = [0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(format(octets), "1::1");
    }

    #[test]
    fn single_zero_group_renders_as_zero() {
        let mut octets = [0u8; 16];
        // 1:0:2:3:4:5:6:7
        octets[1] = 1;
        for (word, value) in (2..8).enumerate() {
            octets[2 * (word + 2) + 1] = value as u8;
        }
        assert_eq!(format(octets), "1:0:2:3:4:5:6:7");
    }

    #[test]
    fn leading_and_trailing_runs_compress() {
        let mut trailing = [0u8; 16];
        trailing[1] = 1;
        assert_eq!(format(trailing), "1::");

        let mut leading = [0u8; 16];
        leading[15] = 1;
        assert_eq!(format(leading), "::1");
    }

    #[test]
    fn first_of_two_equal_runs_wins() {
        // 1:0:0:2:0:0:3:4 keeps the first two-group run compressed.
        let words: [u16; 8] = [1, 0, 0, 2, 0, 0, 3, 4];
        let mut octets = [0u8; 16];
        for (index, word) in words.iter().enumerate() {
            octets[2 * index..2 * index + 2].copy_from_slice(&word.to_be_bytes());
        }
        assert_eq!(format(octets), "1::2:0:0:3:4");
    }

    #[test]
    fn parse_format_round_trip() {
        for text in ["::", "::1", "1::1", "fe80::1", "2001:db8::8a2e:370:7334"] {
            let address: Ipv6Address = text.parse().unwrap();
            assert_eq!(address.to_string(), text);
        }
    }

    #[test]
    fn localhost_literal_maps_to_loopback() {
        assert_eq!(
            Ipv6Address::try_parse("localhost"),
            Some(Ipv6Address::LOCALHOST)
        );
        assert_eq!(
            Ipv6Address::try_parse("LOCALHOST"),
            Some(Ipv6Address::LOCALHOST)
        );
    }

    #[test]
    fn rejects_malformed_text() {
        assert!("1::2::3".parse::<Ipv6Address>().is_err());
        assert!("fffff::1".parse::<Ipv6Address>().is_err());
        assert!("".parse::<Ipv6Address>().is_err());
    }
}
