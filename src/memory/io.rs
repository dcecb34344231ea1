//! Byte order aware integer decoding and encoding for raw process memory.
//!
//! Remote memory arrives as plain byte buffers. This module turns those buffers into integers
//! according to the inspected process' [`ByteOrder`], and back again when a
//! [`crate::MemorySnapshot`] is being populated.
//!
//! # Key Components
//!
//! - [`RawIO`] - Trait describing fixed-size integers that can be converted from and to bytes
//! - [`read_at`] / [`write_at`] - Bounds-checked, offset-advancing access in either byte order
//! - [`read_uint`] / [`write_uint`] - Dynamic width (4 or 8 byte) access used for pointers
//!
//! # Examples
//!
//! ```rust
//! use objscope::{memory::io::read_at, ByteOrder};
//!
//! let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02];
//! let mut offset = 0;
//! let little: u32 = read_at(&data, &mut offset, ByteOrder::Little)?;
//! let big: u32 = read_at(&data, &mut offset, ByteOrder::Big)?;
//! assert_eq!(little, 1);
//! assert_eq!(big, 2);
//! assert_eq!(offset, 8);
//! # Ok::<(), objscope::Error>(())
//! ```

use crate::{memory::ByteOrder, PointerWidth, Result};

/// Trait for fixed-size integers that can be decoded from, and encoded to, raw bytes.
///
/// Each implementation names the byte array matching its size through [`RawIO::Bytes`].
pub trait RawIO: Sized + Copy {
    /// Byte array type with the same size as `Self`
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Decode from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
    /// Encode as little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
    /// Encode as big-endian bytes
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_raw_io {
    ($($ty:ty),*) => {
        $(
            impl RawIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_raw_io!(u8, u16, u32, u64);

/// Reads a `T` at `offset` in the given byte order and advances `offset` past it.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Position inside `data`; advanced by `size_of::<T>()` on success
/// * `order` - Byte order of the inspected process
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `data` is too short.
pub fn read_at<T: RawIO>(data: &[u8], offset: &mut usize, order: ByteOrder) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(malformed_error!("Offset overflow reading {} bytes", type_len));
    };
    if end > data.len() {
        return Err(malformed_error!(
            "Buffer of {} bytes too short for read at {}..{}",
            data.len(),
            *offset,
            end
        ));
    }

    let Ok(bytes) = data[*offset..end].try_into() else {
        return Err(malformed_error!("Could not convert {} bytes", type_len));
    };
    *offset = end;

    Ok(match order {
        ByteOrder::Little => T::from_le_bytes(bytes),
        ByteOrder::Big => T::from_be_bytes(bytes),
    })
}

/// Writes `value` at `offset` in the given byte order and advances `offset` past it.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `data` is too short.
pub fn write_at<T: RawIO>(
    data: &mut [u8],
    offset: &mut usize,
    value: T,
    order: ByteOrder,
) -> Result<()> {
    let bytes = match order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    };
    let bytes = bytes.as_ref();

    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(malformed_error!("Offset overflow writing {} bytes", bytes.len()));
    };
    if end > data.len() {
        return Err(malformed_error!(
            "Buffer of {} bytes too short for write at {}..{}",
            data.len(),
            *offset,
            end
        ));
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Reads a pointer-sized unsigned integer, widening 4-byte values to `u64`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `data` is too short.
pub fn read_uint(
    data: &[u8],
    offset: &mut usize,
    width: PointerWidth,
    order: ByteOrder,
) -> Result<u64> {
    match width {
        PointerWidth::Four => Ok(u64::from(read_at::<u32>(data, offset, order)?)),
        PointerWidth::Eight => read_at::<u64>(data, offset, order),
    }
}

/// Writes a pointer-sized unsigned integer, truncating to 32 bits for 4-byte processes.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `data` is too short.
pub fn write_uint(
    data: &mut [u8],
    offset: &mut usize,
    value: u64,
    width: PointerWidth,
    order: ByteOrder,
) -> Result<()> {
    match width {
        #[allow(clippy::cast_possible_truncation)]
        PointerWidth::Four => write_at(data, offset, value as u32, order),
        PointerWidth::Eight => write_at(data, offset, value, order),
    }
}
