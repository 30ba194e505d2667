//! Internal macros.

/// Invoke a libc function and convert `-1` into `io::Error::last_os_error()`.
#[cfg(unix)]
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

/// Invoke a Winsock function and convert `SOCKET_ERROR` into
/// `io::Error::last_os_error()`. Winsock reports its error through the
/// same thread slot `GetLastError` reads.
#[cfg(windows)]
macro_rules! wsa_syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { windows_sys::Win32::Networking::WinSock::$fn($($arg, )*) };
        if res == windows_sys::Win32::Networking::WinSock::SOCKET_ERROR {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}
