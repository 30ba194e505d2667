//! Socket-level definitions shared by the capability interface and the
//! typed wrappers: families, types, protocols, options, handles and
//! timeouts.

use std::{fmt, str::FromStr, time::Duration};

/// Identifier of a kernel socket inside the capability interface.
///
/// The OS implementation converts to the platform representation (a
/// file descriptor on POSIX, a `SOCKET` on Windows) internally; real
/// handles are non-negative.
pub type SocketHandle = i64;

/// The sentinel value of a handle that does not refer to a kernel
/// socket.
pub const INVALID_SOCKET_HANDLE: SocketHandle = -1;

/// Polling granularity for timed non-blocking accept and connect.
pub const TIME_WAIT_SLICE: Duration = Duration::from_millis(10);

/// Address family of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketFamily {
    /// Unspecified family.
    Any,
    /// Unix domain sockets.
    Unix,
    /// IPv4.
    InternetV4,
    /// IPv6.
    InternetV6,
    /// Link-layer packet sockets (Linux only at the OS level).
    Packet,
}

impl SocketFamily {
    /// The platform value passed to `socket(2)`.
    #[cfg(unix)]
    pub fn raw(self) -> i32 {
        match self {
            SocketFamily::Any => libc::AF_UNSPEC,
            SocketFamily::Unix => libc::AF_UNIX,
            SocketFamily::InternetV4 => libc::AF_INET,
            SocketFamily::InternetV6 => libc::AF_INET6,
            #[cfg(target_os = "linux")]
            SocketFamily::Packet => libc::AF_PACKET,
            #[cfg(not(target_os = "linux"))]
            SocketFamily::Packet => libc::AF_UNSPEC,
        }
    }

    /// The platform value passed to `socket(2)`.
    #[cfg(windows)]
    pub fn raw(self) -> i32 {
        use windows_sys::Win32::Networking::WinSock as ws;
        match self {
            SocketFamily::Any => ws::AF_UNSPEC as i32,
            SocketFamily::Unix => ws::AF_UNIX as i32,
            SocketFamily::InternetV4 => ws::AF_INET as i32,
            SocketFamily::InternetV6 => ws::AF_INET6 as i32,
            SocketFamily::Packet => ws::AF_UNSPEC as i32,
        }
    }

    /// Map a raw address family back to the enum, if known.
    #[cfg(unix)]
    pub fn from_raw(value: i32) -> Option<SocketFamily> {
        match value {
            v if v == libc::AF_UNSPEC => Some(SocketFamily::Any),
            v if v == libc::AF_UNIX => Some(SocketFamily::Unix),
            v if v == libc::AF_INET => Some(SocketFamily::InternetV4),
            v if v == libc::AF_INET6 => Some(SocketFamily::InternetV6),
            #[cfg(target_os = "linux")]
            v if v == libc::AF_PACKET => Some(SocketFamily::Packet),
            _ => None,
        }
    }

    /// Map a raw address family back to the enum, if known.
    #[cfg(windows)]
    pub fn from_raw(value: i32) -> Option<SocketFamily> {
        use windows_sys::Win32::Networking::WinSock as ws;
        match value {
            v if v == ws::AF_UNSPEC as i32 => Some(SocketFamily::Any),
            v if v == ws::AF_UNIX as i32 => Some(SocketFamily::Unix),
            v if v == ws::AF_INET as i32 => Some(SocketFamily::InternetV4),
            v if v == ws::AF_INET6 as i32 => Some(SocketFamily::InternetV6),
            _ => None,
        }
    }
}

impl fmt::Display for SocketFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SocketFamily::Any => "Any",
            SocketFamily::Unix => "Unix",
            SocketFamily::InternetV4 => "InternetV4",
            SocketFamily::InternetV6 => "InternetV6",
            SocketFamily::Packet => "Packet",
        };
        f.write_str(text)
    }
}

impl FromStr for SocketFamily {
    type Err = UnknownEnumText;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Any" => Ok(SocketFamily::Any),
            "Unix" => Ok(SocketFamily::Unix),
            "InternetV4" => Ok(SocketFamily::InternetV4),
            "InternetV6" => Ok(SocketFamily::InternetV6),
            "Packet" => Ok(SocketFamily::Packet),
            _ => Err(UnknownEnumText),
        }
    }
}

/// Communication semantics of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// Connection oriented byte stream.
    Stream,
    /// Connectionless datagrams.
    Datagram,
    /// Raw protocol access.
    Raw,
    /// Sequenced, reliable datagrams.
    SeqPacket,
}

impl SocketType {
    /// The platform value passed to `socket(2)`.
    #[cfg(unix)]
    pub fn raw(self) -> i32 {
        match self {
            SocketType::Stream => libc::SOCK_STREAM,
            SocketType::Datagram => libc::SOCK_DGRAM,
            SocketType::Raw => libc::SOCK_RAW,
            SocketType::SeqPacket => libc::SOCK_SEQPACKET,
        }
    }

    /// The platform value passed to `socket(2)`.
    #[cfg(windows)]
    pub fn raw(self) -> i32 {
        use windows_sys::Win32::Networking::WinSock as ws;
        match self {
            SocketType::Stream => ws::SOCK_STREAM as i32,
            SocketType::Datagram => ws::SOCK_DGRAM as i32,
            SocketType::Raw => ws::SOCK_RAW as i32,
            SocketType::SeqPacket => ws::SOCK_SEQPACKET as i32,
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SocketType::Stream => "Stream",
            SocketType::Datagram => "Datagram",
            SocketType::Raw => "Raw",
            SocketType::SeqPacket => "SeqPacket",
        };
        f.write_str(text)
    }
}

impl FromStr for SocketType {
    type Err = UnknownEnumText;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Stream" => Ok(SocketType::Stream),
            "Datagram" => Ok(SocketType::Datagram),
            "Raw" => Ok(SocketType::Raw),
            "SeqPacket" => Ok(SocketType::SeqPacket),
            _ => Err(UnknownEnumText),
        }
    }
}

/// Transport protocol of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketProtocol {
    /// Protocol chosen by the kernel for the (family, type) pair.
    Ip,
    /// ICMP.
    Icmp,
    /// IGMP.
    Igmp,
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// Raw IP packets.
    Raw,
}

impl SocketProtocol {
    /// The platform value passed to `socket(2)`.
    #[cfg(unix)]
    pub fn raw(self) -> i32 {
        match self {
            SocketProtocol::Ip => 0,
            SocketProtocol::Icmp => libc::IPPROTO_ICMP,
            SocketProtocol::Igmp => libc::IPPROTO_IGMP,
            SocketProtocol::Tcp => libc::IPPROTO_TCP,
            SocketProtocol::Udp => libc::IPPROTO_UDP,
            SocketProtocol::Raw => libc::IPPROTO_RAW,
        }
    }

    /// The platform value passed to `socket(2)`.
    #[cfg(windows)]
    pub fn raw(self) -> i32 {
        use windows_sys::Win32::Networking::WinSock as ws;
        match self {
            SocketProtocol::Ip => 0,
            SocketProtocol::Icmp => ws::IPPROTO_ICMP,
            SocketProtocol::Igmp => ws::IPPROTO_IGMP,
            SocketProtocol::Tcp => ws::IPPROTO_TCP,
            SocketProtocol::Udp => ws::IPPROTO_UDP,
            SocketProtocol::Raw => ws::IPPROTO_RAW,
        }
    }
}

impl fmt::Display for SocketProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SocketProtocol::Ip => "IP",
            SocketProtocol::Icmp => "ICMP",
            SocketProtocol::Igmp => "IGMP",
            SocketProtocol::Tcp => "TCP",
            SocketProtocol::Udp => "UDP",
            SocketProtocol::Raw => "Raw",
        };
        f.write_str(text)
    }
}

impl FromStr for SocketProtocol {
    type Err = UnknownEnumText;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "IP" => Ok(SocketProtocol::Ip),
            "ICMP" => Ok(SocketProtocol::Icmp),
            "IGMP" => Ok(SocketProtocol::Igmp),
            "TCP" => Ok(SocketProtocol::Tcp),
            "UDP" => Ok(SocketProtocol::Udp),
            "Raw" => Ok(SocketProtocol::Raw),
            _ => Err(UnknownEnumText),
        }
    }
}

/// Level at which a socket option lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOptionLevel {
    /// Options at the socket level (`SOL_SOCKET`).
    Socket,
    /// Options at the IP level (`IPPROTO_IP`).
    Ip,
}

impl SocketOptionLevel {
    /// The platform value passed to `setsockopt(2)`/`getsockopt(2)`.
    #[cfg(unix)]
    pub fn raw(self) -> i32 {
        match self {
            SocketOptionLevel::Socket => libc::SOL_SOCKET,
            SocketOptionLevel::Ip => libc::IPPROTO_IP,
        }
    }

    /// The platform value passed to `setsockopt(2)`/`getsockopt(2)`.
    #[cfg(windows)]
    pub fn raw(self) -> i32 {
        use windows_sys::Win32::Networking::WinSock as ws;
        match self {
            SocketOptionLevel::Socket => ws::SOL_SOCKET as i32,
            SocketOptionLevel::Ip => ws::IPPROTO_IP,
        }
    }
}

impl fmt::Display for SocketOptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketOptionLevel::Socket => f.write_str("Socket"),
            SocketOptionLevel::Ip => f.write_str("IP"),
        }
    }
}

impl FromStr for SocketOptionLevel {
    type Err = UnknownEnumText;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Socket" => Ok(SocketOptionLevel::Socket),
            "IP" => Ok(SocketOptionLevel::Ip),
            _ => Err(UnknownEnumText),
        }
    }
}

/// A socket option selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    /// `SO_DEBUG`.
    Debug,
    /// `SO_REUSEADDR`.
    ReuseAddress,
    /// `SO_TYPE`.
    Type,
    /// `SO_ERROR`.
    Error,
    /// `SO_DONTROUTE`.
    DontRoute,
    /// `SO_BROADCAST`.
    Broadcast,
    /// `SO_SNDBUF`.
    SendBuffer,
    /// `SO_RCVBUF`.
    ReceiveBuffer,
    /// `SO_KEEPALIVE`.
    KeepAlive,
    /// `SO_OOBINLINE`.
    OutOfBandInline,
    /// `SO_LINGER`.
    Linger,
    /// `SO_RCVTIMEO`.
    ReceiveTimeout,
    /// `SO_SNDTIMEO`.
    SendTimeout,
}

impl SocketOption {
    /// The platform value passed to `setsockopt(2)`/`getsockopt(2)`.
    #[cfg(unix)]
    pub fn raw(self) -> i32 {
        match self {
            SocketOption::Debug => libc::SO_DEBUG,
            SocketOption::ReuseAddress => libc::SO_REUSEADDR,
            SocketOption::Type => libc::SO_TYPE,
            SocketOption::Error => libc::SO_ERROR,
            SocketOption::DontRoute => libc::SO_DONTROUTE,
            SocketOption::Broadcast => libc::SO_BROADCAST,
            SocketOption::SendBuffer => libc::SO_SNDBUF,
            SocketOption::ReceiveBuffer => libc::SO_RCVBUF,
            SocketOption::KeepAlive => libc::SO_KEEPALIVE,
            SocketOption::OutOfBandInline => libc::SO_OOBINLINE,
            SocketOption::Linger => libc::SO_LINGER,
            SocketOption::ReceiveTimeout => libc::SO_RCVTIMEO,
            SocketOption::SendTimeout => libc::SO_SNDTIMEO,
        }
    }

    /// The platform value passed to `setsockopt(2)`/`getsockopt(2)`.
    #[cfg(windows)]
    pub fn raw(self) -> i32 {
        use windows_sys::Win32::Networking::WinSock as ws;
        match self {
            SocketOption::Debug => ws::SO_DEBUG as i32,
            SocketOption::ReuseAddress => ws::SO_REUSEADDR as i32,
            SocketOption::Type => ws::SO_TYPE as i32,
            SocketOption::Error => ws::SO_ERROR as i32,
            SocketOption::DontRoute => ws::SO_DONTROUTE as i32,
            SocketOption::Broadcast => ws::SO_BROADCAST as i32,
            SocketOption::SendBuffer => ws::SO_SNDBUF as i32,
            SocketOption::ReceiveBuffer => ws::SO_RCVBUF as i32,
            SocketOption::KeepAlive => ws::SO_KEEPALIVE as i32,
            SocketOption::OutOfBandInline => ws::SO_OOBINLINE as i32,
            SocketOption::Linger => ws::SO_LINGER as i32,
            SocketOption::ReceiveTimeout => ws::SO_RCVTIMEO as i32,
            SocketOption::SendTimeout => ws::SO_SNDTIMEO as i32,
        }
    }
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SocketOption::Debug => "Debug",
            SocketOption::ReuseAddress => "ReuseAddress",
            SocketOption::Type => "Type",
            SocketOption::Error => "Error",
            SocketOption::DontRoute => "DontRoute",
            SocketOption::Broadcast => "Broadcast",
            SocketOption::SendBuffer => "SendBuffer",
            SocketOption::ReceiveBuffer => "ReceiveBuffer",
            SocketOption::KeepAlive => "KeepAlive",
            SocketOption::OutOfBandInline => "OutOfBandInline",
            SocketOption::Linger => "Linger",
            SocketOption::ReceiveTimeout => "ReceiveTimeout",
            SocketOption::SendTimeout => "SendTimeout",
        };
        f.write_str(text)
    }
}

impl FromStr for SocketOption {
    type Err = UnknownEnumText;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Debug" => Ok(SocketOption::Debug),
            "ReuseAddress" => Ok(SocketOption::ReuseAddress),
            "Type" => Ok(SocketOption::Type),
            "Error" => Ok(SocketOption::Error),
            "DontRoute" => Ok(SocketOption::DontRoute),
            "Broadcast" => Ok(SocketOption::Broadcast),
            "SendBuffer" => Ok(SocketOption::SendBuffer),
            "ReceiveBuffer" => Ok(SocketOption::ReceiveBuffer),
            "KeepAlive" => Ok(SocketOption::KeepAlive),
            "OutOfBandInline" => Ok(SocketOption::OutOfBandInline),
            "Linger" => Ok(SocketOption::Linger),
            "ReceiveTimeout" => Ok(SocketOption::ReceiveTimeout),
            "SendTimeout" => Ok(SocketOption::SendTimeout),
            _ => Err(UnknownEnumText),
        }
    }
}

/// Error returned when parsing one of the socket enums from text fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown enum text")]
pub struct UnknownEnumText;

/// A deadline for a blocking socket operation.
///
/// `Infinite` selects plain blocking mode; any finite value switches
/// the socket to non-blocking for the duration of the operation and
/// restores blocking mode before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Block until the operation completes.
    Infinite,
    /// Give up after the given duration.
    Finite(Duration),
}

impl Timeout {
    /// Whether this is the blocking sentinel.
    #[inline]
    pub fn is_infinite(self) -> bool {
        matches!(self, Timeout::Infinite)
    }

    /// The finite budget, if any.
    #[inline]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Timeout::Infinite => None,
            Timeout::Finite(duration) => Some(duration),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::Finite(duration)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => f.write_str("infinite"),
            Timeout::Finite(duration) => write!(f, "{} ms", duration.as_millis()),
        }
    }
}

/// Value of the `SO_LINGER` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Linger {
    /// Whether lingering on close is enabled.
    pub enabled: bool,
    /// How long close may linger, in whole seconds.
    pub seconds: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_text_round_trip() {
        for family in [
            SocketFamily::Any,
            SocketFamily::Unix,
            SocketFamily::InternetV4,
            SocketFamily::InternetV6,
            SocketFamily::Packet,
        ] {
            assert_eq!(family.to_string().parse::<SocketFamily>(), Ok(family));
        }
        assert!("Bogus".parse::<SocketFamily>().is_err());
    }

    #[test]
    fn protocol_text_round_trip() {
        for protocol in [
            SocketProtocol::Ip,
            SocketProtocol::Icmp,
            SocketProtocol::Igmp,
            SocketProtocol::Tcp,
            SocketProtocol::Udp,
            SocketProtocol::Raw,
        ] {
            assert_eq!(protocol.to_string().parse::<SocketProtocol>(), Ok(protocol));
        }
    }

    #[test]
    fn option_text_round_trip() {
        for option in [
            SocketOption::ReuseAddress,
            SocketOption::Broadcast,
            SocketOption::Linger,
            SocketOption::ReceiveTimeout,
        ] {
            assert_eq!(option.to_string().parse::<SocketOption>(), Ok(option));
        }
        assert_eq!("Socket".parse::<SocketOptionLevel>(), Ok(SocketOptionLevel::Socket));
    }

    #[test]
    fn raw_family_round_trip() {
        for family in [
            SocketFamily::Unix,
            SocketFamily::InternetV4,
            SocketFamily::InternetV6,
        ] {
            assert_eq!(SocketFamily::from_raw(family.raw()), Some(family));
        }
    }

    #[test]
    fn timeout_from_duration_is_finite() {
        let timeout: Timeout = Duration::from_millis(500).into();
        assert!(!timeout.is_infinite());
        assert_eq!(timeout.duration(), Some(Duration::from_millis(500)));
        assert!(Timeout::Infinite.is_infinite());
    }
}
