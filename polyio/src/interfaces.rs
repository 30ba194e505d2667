//! Enumeration of the host's network interfaces.
//!
//! A read-only snapshot: names, up/loopback classification, and every
//! address (with netmask, broadcast and destination where the
//! interface carries them) as [`AddressTuple`]s.

use std::{collections::BTreeMap, io};

use crate::addr::AddressTuple;

/// One address of an interface, with its companions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressInfo {
    /// The address itself.
    pub address: AddressTuple,
    /// The netmask, when the family has one.
    pub netmask: AddressTuple,
    /// The broadcast address, on broadcast interfaces.
    pub broadcast_address: AddressTuple,
    /// The peer address, on point-to-point interfaces.
    pub destination_address: AddressTuple,
}

/// One network interface and its addresses.
#[derive(Debug, Clone)]
pub struct Interface {
    name: String,
    is_up: bool,
    is_loopback: bool,
    addresses: Vec<AddressInfo>,
}

impl Interface {
    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the interface was up when the snapshot was taken.
    pub fn is_up(&self) -> bool {
        self.is_up
    }

    /// Whether this is a loopback interface.
    pub fn is_loopback(&self) -> bool {
        self.is_loopback
    }

    /// The addresses attached to the interface.
    pub fn addresses(&self) -> &[AddressInfo] {
        &self.addresses
    }
}

/// A snapshot of the host's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct Interfaces {
    map: BTreeMap<String, Interface>,
}

impl Interfaces {
    /// Snapshot every interface on the host.
    pub fn collect() -> io::Result<Interfaces> {
        Self::collect_filtered(None)
    }

    /// Snapshot a single interface by name. The result is empty when
    /// no such interface exists.
    pub fn collect_interface(name: &str) -> io::Result<Interfaces> {
        Self::collect_filtered(Some(name))
    }

    /// Whether the snapshot contains an interface with this name.
    pub fn have_interface(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.map.get(name)
    }

    /// Iterate over all interfaces, ordered by name.
    pub fn all(&self) -> impl Iterator<Item = &Interface> {
        self.map.values()
    }

    /// Number of interfaces in the snapshot.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {

use std::ffi::CStr;

use crate::addr::{Ipv4Address, Ipv6Address};
#[cfg(target_os = "linux")]
use crate::addr::MacAddress;

impl Interfaces {
    fn collect_filtered(filter: Option<&str>) -> io::Result<Interfaces> {
        let mut addresses: *mut libc::ifaddrs = std::ptr::null_mut();
        syscall!(getifaddrs(&mut addresses))?;

        let mut map: BTreeMap<String, Interface> = BTreeMap::new();
        let mut cursor = addresses;
        while !cursor.is_null() {
            let entry = unsafe { &*cursor };
            cursor = entry.ifa_next;

            let name = unsafe { CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();
            if filter.is_some_and(|wanted| wanted != name) {
                continue;
            }

            let flags = entry.ifa_flags;
            let is_up = flags & libc::IFF_UP as u32 != 0;
            let is_loopback = flags & libc::IFF_LOOPBACK as u32 != 0;
            let has_broadcast = flags & libc::IFF_BROADCAST as u32 != 0;
            let has_destination = flags & libc::IFF_POINTOPOINT as u32 != 0;

            let interface = map.entry(name.clone()).or_insert_with(|| Interface {
                name,
                is_up,
                is_loopback,
                addresses: Vec::new(),
            });

            if entry.ifa_addr.is_null() {
                continue;
            }
            let mut info = AddressInfo {
                address: unsafe { convert_address(entry.ifa_addr) },
                ..AddressInfo::default()
            };
            if !entry.ifa_netmask.is_null() {
                info.netmask = unsafe { convert_address(entry.ifa_netmask) };
            }
            let companion = companion_address(entry);
            if !companion.is_null() {
                if has_broadcast {
                    info.broadcast_address = unsafe { convert_address(companion) };
                } else if has_destination {
                    info.destination_address = unsafe { convert_address(companion) };
                }
            }
            interface.addresses.push(info);
        }
        unsafe { libc::freeifaddrs(addresses) };

        Ok(Interfaces { map })
    }
}

// The broadcast and destination addresses share one slot.
#[cfg(target_os = "linux")]
fn companion_address(entry: &libc::ifaddrs) -> *mut libc::sockaddr {
    entry.ifa_ifu
}

#[cfg(not(target_os = "linux"))]
fn companion_address(entry: &libc::ifaddrs) -> *mut libc::sockaddr {
    entry.ifa_dstaddr
}

unsafe fn convert_address(address: *const libc::sockaddr) -> AddressTuple {
    match i32::from((*address).sa_family) {
        libc::AF_INET => {
            let inet = &*(address as *const libc::sockaddr_in);
            AddressTuple::Ipv4(Ipv4Address::new(inet.sin_addr.s_addr.to_ne_bytes()))
        }
        libc::AF_INET6 => {
            let inet6 = &*(address as *const libc::sockaddr_in6);
            AddressTuple::Ipv6(Ipv6Address::new(inet6.sin6_addr.s6_addr))
        }
        #[cfg(target_os = "linux")]
        libc::AF_PACKET => {
            let link = &*(address as *const libc::sockaddr_ll);
            match link.sll_hatype {
                libc::ARPHRD_ETHER | libc::ARPHRD_LOOPBACK if link.sll_halen == 6 => {
                    let mut octets = [0u8; 6];
                    octets.copy_from_slice(&link.sll_addr[..6]);
                    AddressTuple::Mac {
                        address: MacAddress::new(octets),
                        interface_index: link.sll_ifindex as u32,
                    }
                }
                _ => AddressTuple::Invalid,
            }
        }
        _ => AddressTuple::Invalid,
    }
}

    } else {

use windows_sys::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, NO_ERROR};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetAdaptersAddresses, GAA_FLAG_INCLUDE_PREFIX, IF_TYPE_SOFTWARE_LOOPBACK,
    IP_ADAPTER_ADDRESSES_LH,
};
use windows_sys::Win32::NetworkManagement::Ndis::IfOperStatusUp;
use windows_sys::Win32::Networking::WinSock::AF_UNSPEC;

use crate::{addr::MacAddress, sockaddr::SockAddr};

impl Interfaces {
    fn collect_filtered(filter: Option<&str>) -> io::Result<Interfaces> {
        let mut buffer: Vec<u8> = vec![0; 16 * 1024];
        let mut size = buffer.len() as u32;
        for _ in 0..3 {
            let result = unsafe {
                GetAdaptersAddresses(
                    AF_UNSPEC as u32,
                    GAA_FLAG_INCLUDE_PREFIX,
                    std::ptr::null_mut(),
                    buffer.as_mut_ptr() as *mut IP_ADAPTER_ADDRESSES_LH,
                    &mut size,
                )
            };
            if result == NO_ERROR {
                return Ok(Interfaces {
                    map: unsafe { walk_adapters(buffer.as_ptr() as *const _, filter) },
                });
            }
            if result != ERROR_BUFFER_OVERFLOW {
                return Err(io::Error::from_raw_os_error(result as i32));
            }
            buffer.resize(size as usize, 0);
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            "GetAdaptersAddresses kept overflowing",
        ))
    }
}

unsafe fn walk_adapters(
    mut adapter: *const IP_ADAPTER_ADDRESSES_LH,
    filter: Option<&str>,
) -> BTreeMap<String, Interface> {
    let mut map = BTreeMap::new();
    while !adapter.is_null() {
        let entry = &*adapter;
        adapter = entry.Next;

        let name = wide_to_string(entry.FriendlyName);
        if filter.is_some_and(|wanted| wanted != name) {
            continue;
        }
        let is_up = entry.OperStatus == IfOperStatusUp;
        let is_loopback = entry.IfType == IF_TYPE_SOFTWARE_LOOPBACK;
        let mut addresses = Vec::new();

        if entry.PhysicalAddressLength == 6 {
            let mut octets = [0u8; 6];
            octets.copy_from_slice(&entry.PhysicalAddress[..6]);
            addresses.push(AddressInfo {
                address: AddressTuple::Mac {
                    address: MacAddress::new(octets),
                    interface_index: entry.Anonymous1.Anonymous.IfIndex,
                },
                ..AddressInfo::default()
            });
        }

        let mut unicast = entry.FirstUnicastAddress;
        while !unicast.is_null() {
            let address = &*unicast;
            unicast = address.Next;
            let tuple = convert_socket_address(
                address.Address.lpSockaddr as *const u8,
                address.Address.iSockaddrLength as usize,
            );
            if tuple.is_valid() {
                addresses.push(AddressInfo {
                    address: tuple,
                    ..AddressInfo::default()
                });
            }
        }

        map.insert(
            name.clone(),
            Interface {
                name,
                is_up,
                is_loopback,
                addresses,
            },
        );
    }
    map
}

unsafe fn convert_socket_address(raw: *const u8, length: usize) -> AddressTuple {
    let mut storage = SockAddr::zeroed();
    let length = length.min(storage.capacity());
    std::ptr::copy_nonoverlapping(raw, storage.as_mut_ptr(), length);
    storage.set_len(length);
    if let Some(endpoint) = storage.to_ipv4_endpoint() {
        return AddressTuple::Ipv4(endpoint.address());
    }
    if let Some(endpoint) = storage.to_ipv6_endpoint() {
        return AddressTuple::Ipv6(endpoint.address());
    }
    AddressTuple::Invalid
}

unsafe fn wide_to_string(mut cursor: *const u16) -> String {
    let mut units = Vec::new();
    while !cursor.is_null() && *cursor != 0 {
        units.push(*cursor);
        cursor = cursor.add(1);
    }
    String::from_utf16_lossy(&units)
}

    }
}
