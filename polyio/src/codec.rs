//! Binary wire codec.
//!
//! Values are appended to a growing `Vec<u8>` at a caller-held cursor
//! and extracted from a byte slice the same way; every primitive
//! advances the cursor by exactly its wire width, and the byte order is
//! selected per call.
//!
//! Strings and byte strings are length-prefixed with a machine-word
//! sized count (bytes for narrow strings, code units for wide ones),
//! followed by the raw units.

use crate::endian::Endianness;

/// Values that can be appended to a wire buffer.
pub trait WireWrite {
    /// Append the value at `offset`, growing `buffer` as needed and
    /// advancing `offset` past the written bytes.
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness);
}

/// Values that can be extracted from a wire buffer.
pub trait WireRead: Sized {
    /// Extract a value at `offset`, advancing it past the consumed
    /// bytes. Returns `None` when the buffer is too short.
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self>;
}

/// Append any [`WireWrite`] value.
pub fn append<T: WireWrite + ?Sized>(
    buffer: &mut Vec<u8>,
    offset: &mut usize,
    value: &T,
    endianness: Endianness,
) {
    value.write_to(buffer, offset, endianness);
}

/// Extract any [`WireRead`] value.
pub fn extract<T: WireRead>(
    buffer: &[u8],
    offset: &mut usize,
    endianness: Endianness,
) -> Option<T> {
    T::read_from(buffer, offset, endianness)
}

fn write_raw(buffer: &mut Vec<u8>, offset: &mut usize, bytes: &[u8]) {
    let end = *offset + bytes.len();
    if buffer.len() < end {
        buffer.resize(end, 0);
    }
    buffer[*offset..end].copy_from_slice(bytes);
    *offset = end;
}

fn read_raw<'a>(buffer: &'a [u8], offset: &mut usize, count: usize) -> Option<&'a [u8]> {
    let end = offset.checked_add(count)?;
    if end > buffer.len() {
        return None;
    }
    let slice = &buffer[*offset..end];
    *offset = end;
    Some(slice)
}

macro_rules! impl_wire_int {
    ($($t:ty),*) => {
        $(
            impl WireWrite for $t {
                fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
                    let bytes = match endianness {
                        Endianness::Little => self.to_le_bytes(),
                        Endianness::Big => self.to_be_bytes(),
                    };
                    write_raw(buffer, offset, &bytes);
                }
            }

            impl WireRead for $t {
                fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
                    let raw = read_raw(buffer, offset, std::mem::size_of::<$t>())?;
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(raw);
                    Some(match endianness {
                        Endianness::Little => <$t>::from_le_bytes(bytes),
                        Endianness::Big => <$t>::from_be_bytes(bytes),
                    })
                }
            }
        )*
    };
}

impl_wire_int!(i8, u8, i16, u16, i32, u32, i64, u64, usize);

impl WireWrite for bool {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        (u8::from(*self)).write_to(buffer, offset, endianness);
    }
}

impl WireRead for bool {
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
        Some(u8::read_from(buffer, offset, endianness)? != 0)
    }
}

impl WireWrite for f32 {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.to_bits().write_to(buffer, offset, endianness);
    }
}

impl WireRead for f32 {
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
        Some(f32::from_bits(u32::read_from(buffer, offset, endianness)?))
    }
}

impl WireWrite for f64 {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.to_bits().write_to(buffer, offset, endianness);
    }
}

impl WireRead for f64 {
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
        Some(f64::from_bits(u64::read_from(buffer, offset, endianness)?))
    }
}

impl WireWrite for [u8] {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.len().write_to(buffer, offset, endianness);
        write_raw(buffer, offset, self);
    }
}

impl WireWrite for Vec<u8> {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.as_slice().write_to(buffer, offset, endianness);
    }
}

impl WireRead for Vec<u8> {
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
        let count = usize::read_from(buffer, offset, endianness)?;
        Some(read_raw(buffer, offset, count)?.to_vec())
    }
}

impl WireWrite for str {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.as_bytes().write_to(buffer, offset, endianness);
    }
}

impl WireWrite for String {
    fn write_to(&self, buffer: &mut Vec<u8>, offset: &mut usize, endianness: Endianness) {
        self.as_str().write_to(buffer, offset, endianness);
    }
}

impl WireRead for String {
    fn read_from(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<Self> {
        let bytes = Vec::<u8>::read_from(buffer, offset, endianness)?;
        String::from_utf8(bytes).ok()
    }
}

/// Append a string as UTF-16 code units: a machine-word count of units
/// followed by the units themselves in the selected byte order.
pub fn append_utf16(buffer: &mut Vec<u8>, offset: &mut usize, text: &str, endianness: Endianness) {
    let units: Vec<u16> = text.encode_utf16().collect();
    units.len().write_to(buffer, offset, endianness);
    for unit in units {
        unit.write_to(buffer, offset, endianness);
    }
}

/// Extract a UTF-16 string written by [`append_utf16`].
pub fn extract_utf16(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<String> {
    let count = usize::read_from(buffer, offset, endianness)?;
    let mut units = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        units.push(u16::read_from(buffer, offset, endianness)?);
    }
    String::from_utf16(&units).ok()
}

/// Append a string as UTF-32 code units: a machine-word count of units
/// followed by one `u32` per scalar value in the selected byte order.
pub fn append_utf32(buffer: &mut Vec<u8>, offset: &mut usize, text: &str, endianness: Endianness) {
    let units: Vec<u32> = text.chars().map(u32::from).collect();
    units.len().write_to(buffer, offset, endianness);
    for unit in units {
        unit.write_to(buffer, offset, endianness);
    }
}

/// Extract a UTF-32 string written by [`append_utf32`].
pub fn extract_utf32(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<String> {
    let count = usize::read_from(buffer, offset, endianness)?;
    let mut text = String::new();
    for _ in 0..count {
        let unit = u32::read_from(buffer, offset, endianness)?;
        text.push(char::from_u32(unit)?);
    }
    Some(text)
}

/// Append a string in the platform's wide-character width: UTF-16 on
/// Windows, UTF-32 elsewhere.
pub fn append_wide(buffer: &mut Vec<u8>, offset: &mut usize, text: &str, endianness: Endianness) {
    #[cfg(windows)]
    append_utf16(buffer, offset, text, endianness);
    #[cfg(not(windows))]
    append_utf32(buffer, offset, text, endianness);
}

/// Extract a string written by [`append_wide`].
pub fn extract_wide(buffer: &[u8], offset: &mut usize, endianness: Endianness) -> Option<String> {
    #[cfg(windows)]
    return extract_utf16(buffer, offset, endianness);
    #[cfg(not(windows))]
    return extract_utf32(buffer, offset, endianness);
}

/// Implement [`WireWrite`]/[`WireRead`] for a fieldless enum at its
/// underlying integer width.
macro_rules! wire_enum {
    ($t:ty as $repr:ty { $($variant:ident = $value:literal),* $(,)? }) => {
        impl $crate::codec::WireWrite for $t {
            fn write_to(
                &self,
                buffer: &mut Vec<u8>,
                offset: &mut usize,
                endianness: $crate::endian::Endianness,
            ) {
                let raw: $repr = match self {
                    $(<$t>::$variant => $value,)*
                };
                raw.write_to(buffer, offset, endianness);
            }
        }

        impl $crate::codec::WireRead for $t {
            fn read_from(
                buffer: &[u8],
                offset: &mut usize,
                endianness: $crate::endian::Endianness,
            ) -> Option<Self> {
                let raw = <$repr as $crate::codec::WireRead>::read_from(buffer, offset, endianness)?;
                match raw {
                    $($value => Some(<$t>::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

wire_enum!(crate::defs::SocketType as i32 {
    Stream = 1,
    Datagram = 2,
    Raw = 3,
    SeqPacket = 5,
});

wire_enum!(crate::defs::SocketProtocol as i32 {
    Ip = 0,
    Icmp = 1,
    Igmp = 2,
    Tcp = 6,
    Udp = 17,
    Raw = 255,
});
