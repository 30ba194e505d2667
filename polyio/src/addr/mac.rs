//! Link-layer (MAC) address values.

use std::{fmt, str::FromStr};

use super::AddrParseError;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress {
    octets: [u8; 6],
}

impl MacAddress {
    /// Build an address from its six octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self { octets }
    }

    /// The six octets in transmission order.
    pub const fn octets(&self) -> [u8; 6] {
        self.octets
    }

    /// Parse `HH-HH-HH-HH-HH-HH` text; exactly six dash-separated hex
    /// bytes, nothing else.
    pub fn try_parse(text: &str) -> Option<MacAddress> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in text.split('-') {
            if count == octets.len() || part.len() != 2 {
                return None;
            }
            octets[count] = u8::from_str_radix(part, 16).ok()?;
            count += 1;
        }
        if count != octets.len() {
            return None;
        }
        Some(MacAddress::new(octets))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self::new(octets)
    }
}

impl FromStr for MacAddress {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        MacAddress::try_parse(text).ok_or_else(|| AddrParseError::new("MAC", text))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}",
            self.octets[0],
            self.octets[1],
            self.octets[2],
            self.octets[3],
            self.octets[4],
            self.octets[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format_round_trip() {
        let address: MacAddress = "00-1A-2B-3C-4D-5E".parse().unwrap();
        assert_eq!(address.octets(), [0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);
        assert_eq!(address.to_string(), "00-1A-2B-3C-4D-5E");
    }

    #[test]
    fn accepts_lowercase_hex() {
        let address: MacAddress = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(address.to_string(), "AA-BB-CC-DD-EE-FF");
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(MacAddress::try_parse("00-1A-2B-3C-4D").is_none());
        assert!(MacAddress::try_parse("00-1A-2B-3C-4D-5E-6F").is_none());
        assert!(MacAddress::try_parse("00:1A:2B:3C:4D:5E").is_none());
        assert!(MacAddress::try_parse("0-1A-2B-3C-4D-5E").is_none());
        assert!(MacAddress::try_parse("GG-1A-2B-3C-4D-5E").is_none());
        assert!(MacAddress::try_parse("").is_none());
    }
}
