//! Address value types: IPv4, IPv6, MAC and Unix-domain paths, plus a
//! tagged union over them.

mod ipv4;
mod ipv6;
mod mac;
mod unix;

use std::fmt;

pub use ipv4::Ipv4Address;
pub use ipv6::Ipv6Address;
pub use mac::MacAddress;
pub use unix::{UnixPath, UNIX_PATH_MAX};

/// Error returned when address or endpoint text does not match the
/// documented grammar and cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} address: {text:?}")]
pub struct AddrParseError {
    kind: &'static str,
    text: String,
}

impl AddrParseError {
    pub(crate) fn new(kind: &'static str, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// An address of any supported family, as found on a network
/// interface.
///
/// The integer carried with a MAC address is the interface index of
/// the NIC the address was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressTuple {
    /// No address, or an address of an unsupported family.
    #[default]
    Invalid,
    /// A link-layer address with the owning interface index.
    Mac {
        /// The hardware address.
        address: MacAddress,
        /// Index of the interface the address belongs to.
        interface_index: u32,
    },
    /// An IPv4 address.
    Ipv4(Ipv4Address),
    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

impl AddressTuple {
    /// Whether the tuple holds a usable address.
    pub fn is_valid(&self) -> bool {
        !matches!(self, AddressTuple::Invalid)
    }

    /// The IPv4 address, if that is what the tuple holds.
    pub fn as_ipv4(&self) -> Option<Ipv4Address> {
        match self {
            AddressTuple::Ipv4(address) => Some(*address),
            _ => None,
        }
    }

    /// The IPv6 address, if that is what the tuple holds.
    pub fn as_ipv6(&self) -> Option<Ipv6Address> {
        match self {
            AddressTuple::Ipv6(address) => Some(*address),
            _ => None,
        }
    }

    /// The MAC address and interface index, if that is what the tuple
    /// holds.
    pub fn as_mac(&self) -> Option<(MacAddress, u32)> {
        match self {
            AddressTuple::Mac {
                address,
                interface_index,
            } => Some((*address, *interface_index)),
            _ => None,
        }
    }
}

impl From<Ipv4Address> for AddressTuple {
    fn from(address: Ipv4Address) -> Self {
        AddressTuple::Ipv4(address)
    }
}

impl From<Ipv6Address> for AddressTuple {
    fn from(address: Ipv6Address) -> Self {
        AddressTuple::Ipv6(address)
    }
}

impl fmt::Display for AddressTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressTuple::Invalid => f.write_str("invalid"),
            AddressTuple::Mac {
                address,
                interface_index,
            } => write!(f, "{address}%{interface_index}"),
            AddressTuple::Ipv4(address) => address.fmt(f),
            AddressTuple::Ipv6(address) => address.fmt(f),
        }
    }
}
