//! Opaque socket address storage.
//!
//! [`SockAddr`] is the only address representation that crosses the
//! capability interface; raw `sockaddr*` pointers exist solely inside
//! the OS implementation. The storage is large enough for any address
//! family the core supports and carries its own length, like the
//! `(sockaddr_storage, socklen_t)` pair it stands in for.

use crate::{
    addr::{Ipv4Address, Ipv6Address, UnixPath},
    defs::SocketFamily,
    endian::{from_network_byte_order, to_network_byte_order},
    endpoint::{Ipv4Endpoint, Ipv6Endpoint},
};

const STORAGE_SIZE: usize = 128;

const IPV4_LEN: usize = 16; // sockaddr_in
const IPV6_LEN: usize = 28; // sockaddr_in6
const UNIX_HEADER_LEN: usize = 2; // sun_family

// BSD-derived kernels prefix sockaddr with a one-byte length.
cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))] {
        const BSD_LAYOUT: bool = true;
    } else {
        const BSD_LAYOUT: bool = false;
    }
}

/// A raw socket address: family-tagged bytes plus a length.
#[repr(C, align(8))]
#[derive(Clone, Copy)]
pub struct SockAddr {
    storage: [u8; STORAGE_SIZE],
    len: u32,
}

impl SockAddr {
    /// An empty, zero-length address, ready to be filled by the OS.
    pub fn zeroed() -> SockAddr {
        SockAddr {
            storage: [0; STORAGE_SIZE],
            len: 0,
        }
    }

    /// Build the `sockaddr_in` image of an IPv4 endpoint.
    pub fn from_ipv4_endpoint(endpoint: &Ipv4Endpoint) -> SockAddr {
        let mut address = SockAddr::zeroed();
        address.write_family(SocketFamily::InternetV4, IPV4_LEN);
        address.storage[2..4]
            .copy_from_slice(&to_network_byte_order(endpoint.port()).to_ne_bytes());
        address.storage[4..8].copy_from_slice(&endpoint.address().octets());
        address.len = IPV4_LEN as u32;
        address
    }

    /// Build the `sockaddr_in6` image of an IPv6 endpoint.
    pub fn from_ipv6_endpoint(endpoint: &Ipv6Endpoint) -> SockAddr {
        let mut address = SockAddr::zeroed();
        address.write_family(SocketFamily::InternetV6, IPV6_LEN);
        address.storage[2..4]
            .copy_from_slice(&to_network_byte_order(endpoint.port()).to_ne_bytes());
        address.storage[4..8]
            .copy_from_slice(&to_network_byte_order(endpoint.flow_info()).to_ne_bytes());
        address.storage[8..24].copy_from_slice(&endpoint.address().octets());
        address.storage[24..28]
            .copy_from_slice(&to_network_byte_order(endpoint.scope_id()).to_ne_bytes());
        address.len = IPV6_LEN as u32;
        address
    }

    /// Build the `sockaddr_un` image of a Unix-domain path.
    pub fn from_unix_path(path: &UnixPath) -> SockAddr {
        let mut address = SockAddr::zeroed();
        let bytes = path.as_bytes();
        // Keep the customary trailing NUL when it fits; a maximum
        // length path is passed unterminated, the length tells the
        // kernel where it ends.
        let mut len = UNIX_HEADER_LEN + bytes.len();
        if bytes.len() < crate::addr::UNIX_PATH_MAX {
            len += 1;
        }
        address.write_family(SocketFamily::Unix, len);
        address.storage[UNIX_HEADER_LEN..UNIX_HEADER_LEN + bytes.len()].copy_from_slice(bytes);
        address.len = len as u32;
        address
    }

    /// The raw address family tag.
    pub fn family_raw(&self) -> i32 {
        if BSD_LAYOUT {
            i32::from(self.storage[1])
        } else {
            i32::from(u16::from_ne_bytes([self.storage[0], self.storage[1]]))
        }
    }

    /// The address family, if it is one the core knows.
    pub fn family(&self) -> Option<SocketFamily> {
        SocketFamily::from_raw(self.family_raw())
    }

    /// Reconstruct the IPv4 endpoint, if this is an `AF_INET` address
    /// of sufficient length.
    pub fn to_ipv4_endpoint(&self) -> Option<Ipv4Endpoint> {
        if self.family() != Some(SocketFamily::InternetV4) || (self.len as usize) < 8 {
            return None;
        }
        let port =
            from_network_byte_order(u16::from_ne_bytes([self.storage[2], self.storage[3]]));
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&self.storage[4..8]);
        Some(Ipv4Endpoint::new(Ipv4Address::new(octets), port))
    }

    /// Reconstruct the IPv6 endpoint, if this is an `AF_INET6` address
    /// of sufficient length.
    pub fn to_ipv6_endpoint(&self) -> Option<Ipv6Endpoint> {
        if self.family() != Some(SocketFamily::InternetV6) || (self.len as usize) < IPV6_LEN {
            return None;
        }
        let port =
            from_network_byte_order(u16::from_ne_bytes([self.storage[2], self.storage[3]]));
        let flow_info = from_network_byte_order(u32::from_ne_bytes([
            self.storage[4],
            self.storage[5],
            self.storage[6],
            self.storage[7],
        ]));
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.storage[8..24]);
        let scope_id = from_network_byte_order(u32::from_ne_bytes([
            self.storage[24],
            self.storage[25],
            self.storage[26],
            self.storage[27],
        ]));
        Some(Ipv6Endpoint::with_flow_and_scope(
            Ipv6Address::new(octets),
            port,
            flow_info,
            scope_id,
        ))
    }

    /// Reconstruct the Unix-domain path, if this is an `AF_UNIX`
    /// address.
    pub fn to_unix_path(&self) -> Option<UnixPath> {
        if self.family() != Some(SocketFamily::Unix) || (self.len as usize) < UNIX_HEADER_LEN {
            return None;
        }
        let path = &self.storage[UNIX_HEADER_LEN..(self.len as usize).min(STORAGE_SIZE)];
        let end = path.iter().position(|b| *b == 0).unwrap_or(path.len());
        UnixPath::from_bytes(&path[..end])
    }

    /// Number of meaningful bytes in the storage.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the address has not been filled in.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity of the storage.
    pub fn capacity(&self) -> usize {
        STORAGE_SIZE
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(STORAGE_SIZE) as u32;
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.storage
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.storage.as_mut_ptr()
    }

    fn write_family(&mut self, family: SocketFamily, total_len: usize) {
        if BSD_LAYOUT {
            self.storage[0] = total_len as u8;
            self.storage[1] = family.raw() as u8;
        } else {
            self.storage[0..2].copy_from_slice(&(family.raw() as u16).to_ne_bytes());
        }
    }
}

impl std::fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(endpoint) = self.to_ipv4_endpoint() {
            return write!(f, "SockAddr({endpoint})");
        }
        if let Some(endpoint) = self.to_ipv6_endpoint() {
            return write!(f, "SockAddr({endpoint})");
        }
        if let Some(path) = self.to_unix_path() {
            return write!(f, "SockAddr(unix:{path})");
        }
        write!(f, "SockAddr(family={}, len={})", self.family_raw(), self.len)
    }
}

impl PartialEq for SockAddr {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.storage[..self.len as usize] == other.storage[..other.len as usize]
    }
}

impl Eq for SockAddr {}
