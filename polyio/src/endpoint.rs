//! Endpoints: an address plus a port, and for IPv6 the flow
//! information and scope identifier.

use std::{fmt, str::FromStr};

use crate::addr::{AddrParseError, Ipv4Address, Ipv6Address};

/// The wildcard port.
pub const ANY_PORT: u16 = 0;

fn parse_port(text: &str) -> Option<u16> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// Leading digits only; a missing or empty scope is zero.
fn parse_scope_id(text: &str) -> u32 {
    let mut value: u32 = 0;
    for byte in text.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        value = value.wrapping_mul(10).wrapping_add(u32::from(byte - b'0'));
    }
    value
}

/// An IPv4 address and port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv4Endpoint {
    address: Ipv4Address,
    port: u16,
}

impl Ipv4Endpoint {
    /// Build an endpoint from an address and port.
    pub const fn new(address: Ipv4Address, port: u16) -> Self {
        Self { address, port }
    }

    /// An endpoint on the wildcard address with the given port.
    pub const fn any(port: u16) -> Self {
        Self::new(Ipv4Address::ANY, port)
    }

    /// The address part.
    pub const fn address(&self) -> Ipv4Address {
        self.address
    }

    /// The port part.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Parse `d.d.d.d` or `d.d.d.d:p` text without reporting a cause.
    pub fn try_parse(text: &str) -> Option<Ipv4Endpoint> {
        match text.split_once(':') {
            None => Some(Self::new(Ipv4Address::try_parse(text)?, ANY_PORT)),
            Some((address, port)) => Some(Self::new(
                Ipv4Address::try_parse(address)?,
                parse_port(port)?,
            )),
        }
    }
}

impl From<Ipv4Address> for Ipv4Endpoint {
    fn from(address: Ipv4Address) -> Self {
        Self::new(address, ANY_PORT)
    }
}

impl FromStr for Ipv4Endpoint {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ipv4Endpoint::try_parse(text).ok_or_else(|| AddrParseError::new("IPv4 endpoint", text))
    }
}

impl fmt::Display for Ipv4Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// An IPv6 address, port, flow information and scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ipv6Endpoint {
    address: Ipv6Address,
    port: u16,
    flow_info: u32,
    scope_id: u32,
}

impl Ipv6Endpoint {
    /// Build an endpoint from an address and port; flow information
    /// and scope identifier are zero.
    pub const fn new(address: Ipv6Address, port: u16) -> Self {
        Self::with_flow_and_scope(address, port, 0, 0)
    }

    /// Build an endpoint with explicit flow information and scope
    /// identifier.
    pub const fn with_flow_and_scope(
        address: Ipv6Address,
        port: u16,
        flow_info: u32,
        scope_id: u32,
    ) -> Self {
        Self {
            address,
            port,
            flow_info,
            scope_id,
        }
    }

    /// An endpoint on the wildcard address with the given port.
    pub const fn any(port: u16) -> Self {
        Self::new(Ipv6Address::ANY, port)
    }

    /// The address part.
    pub const fn address(&self) -> Ipv6Address {
        self.address
    }

    /// The port part.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The flow information; zero unless constructed explicitly.
    pub const fn flow_info(&self) -> u32 {
        self.flow_info
    }

    /// The scope identifier.
    pub const fn scope_id(&self) -> u32 {
        self.scope_id
    }

    /// Parse `addr`, `addr%scope`, `[addr]:p` or `[addr%scope]:p`
    /// text without reporting a cause.
    pub fn try_parse(text: &str) -> Option<Ipv6Endpoint> {
        if let Some(rest) = text.strip_prefix('[') {
            let (inside, after) = rest.split_once(']')?;
            let (address, scope_id) = match inside.split_once('%') {
                None => (Ipv6Address::try_parse(inside)?, 0),
                Some((address, scope)) => {
                    (Ipv6Address::try_parse(address)?, parse_scope_id(scope))
                }
            };
            let port = match after.strip_prefix(':') {
                None if after.is_empty() => ANY_PORT,
                None => return None,
                Some(port) => parse_port(port)?,
            };
            Some(Self::with_flow_and_scope(address, port, 0, scope_id))
        } else {
            let (address, scope_id) = match text.split_once('%') {
                None => (Ipv6Address::try_parse(text)?, 0),
                Some((address, scope)) => {
                    (Ipv6Address::try_parse(address)?, parse_scope_id(scope))
                }
            };
            Some(Self::with_flow_and_scope(address, ANY_PORT, 0, scope_id))
        }
    }
}

impl From<Ipv6Address> for Ipv6Endpoint {
    fn from(address: Ipv6Address) -> Self {
        Self::new(address, ANY_PORT)
    }
}

impl FromStr for Ipv6Endpoint {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ipv6Endpoint::try_parse(text).ok_or_else(|| AddrParseError::new("IPv6 endpoint", text))
    }
}

impl fmt::Display for Ipv6Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port != ANY_PORT {
            f.write_str("[")?;
            self.address.fmt(f)?;
            if self.scope_id != 0 {
                write!(f, "%{}", self.scope_id)?;
            }
            write!(f, "]:{}", self.port)
        } else {
            self.address.fmt(f)?;
            if self.scope_id != 0 {
                write!(f, "%{}", self.scope_id)?;
            }
            Ok(())
        }
    }
}
