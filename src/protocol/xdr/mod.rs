//! The XDR (External Data Representation) module defines the serialization
//! traits and primitive encodings used by every wire type in this crate,
//! according to RFC 4506.
//!
//! XDR is a big-endian format in which every item occupies a multiple of
//! four bytes; variable-length data carries a length prefix and trailing
//! zero padding back to four-byte alignment. All structures that cross the
//! network implement the [`Serialize`] and [`Deserialize`] traits below,
//! usually through the `SerializeStruct!`/`DeserializeStruct!` family of
//! macros.
//!
//! Decoders are defensive: any length prefix larger than
//! [`MAX_OPAQUE_LEN`] is rejected before allocation so a hostile peer
//! cannot trigger a length-bomb allocation with a four-byte field.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};

pub mod mount;
pub mod nfs2;
pub mod nfs3;
pub mod nfs4;
pub mod portmap;
pub mod rpc;

/// The standard endianness used in XDR serialization (big endian).
pub type XDREndian = BigEndian;

/// Hard ceiling on any single decoded variable-length field.
///
/// Anything advertising a larger payload is treated as garbage before any
/// buffer is resized.
pub const MAX_OPAQUE_LEN: usize = 16 * 1024 * 1024;

/// Serializes the implementing type into an XDR byte stream.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// Deserializes an XDR byte stream into the implementing type in place.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Decodes a value of type `T` from the reader.
///
/// Convenience wrapper over [`Deserialize::deserialize`] starting from the
/// type's default value.
pub fn deserialize<T: Default + Deserialize>(src: &mut impl Read) -> std::io::Result<T> {
    let mut value = T::default();
    value.deserialize(src)?;
    Ok(value)
}

/// Encodes a value into a fresh byte vector.
pub fn serialize_to_vec<T: Serialize>(value: &T) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.serialize(&mut buf)?;
    Ok(buf)
}

pub(crate) fn invalid_data(m: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, m.into())
}

/// Number of zero bytes needed to pad `len` bytes to four-byte alignment.
pub(crate) fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn write_padding(len: usize, dest: &mut impl Write) -> std::io::Result<()> {
    const ZEROS: [u8; 4] = [0; 4];
    dest.write_all(&ZEROS[..pad_len(len)])
}

fn read_padding(len: usize, src: &mut impl Read) -> std::io::Result<()> {
    let mut pad: [u8; 4] = [0; 4];
    src.read_exact(&mut pad[..pad_len(len)])
}

/// Booleans are serialized as 4-byte big-endian integers, 0 or 1.
impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self as u32)
    }
}
impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()? > 0;
        Ok(())
    }
}

impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XDREndian>(*self)
    }
}
impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XDREndian>(*self)
    }
}
impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self)
    }
}
impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XDREndian>(*self)
    }
}
impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XDREndian>()?;
        Ok(())
    }
}

/// Fixed-size arrays are raw bytes without a length prefix. XDR requires
/// fixed opaques to be padded; every fixed opaque in this crate is already
/// a multiple of four bytes wide, so no pad bytes are emitted.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)
    }
}
impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)
    }
}

/// Variable-length opaques: 4-byte length prefix, payload, zero padding.
impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        dest.write_all(self)?;
        write_padding(self.len(), dest)
    }
}
impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)? as usize;
        if length > MAX_OPAQUE_LEN {
            return Err(invalid_data(format!(
                "opaque length {length} exceeds ceiling {MAX_OPAQUE_LEN}"
            )));
        }
        self.clear();
        self.resize(length, 0);
        src.read_exact(self)?;
        read_padding(length, src)
    }
}

/// Counted arrays of 32-bit integers: length prefix then the elements.
impl Serialize for Vec<u32> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        for item in self {
            item.serialize(dest)?;
        }
        Ok(())
    }
}
impl Deserialize for Vec<u32> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)? as usize;
        if length > MAX_OPAQUE_LEN / 4 {
            return Err(invalid_data(format!("array length {length} exceeds ceiling")));
        }
        self.clear();
        self.resize(length, 0);
        for item in self.iter_mut() {
            item.deserialize(src)?;
        }
        Ok(())
    }
}

/// Strings are variable-length opaques whose payload must be valid UTF-8.
impl Serialize for String {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_bytes().to_vec().serialize(dest)
    }
}
impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let raw = deserialize::<Vec<u8>>(src)?;
        *self = String::from_utf8(raw).map_err(|_| invalid_data("string is not UTF-8"))?;
        Ok(())
    }
}

/// Optional values are boolean-discriminated unions: a 4-byte 0/1 flag
/// followed by the value when present.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            None => false.serialize(dest),
            Some(value) => {
                true.serialize(dest)?;
                value.serialize(dest)
            }
        }
    }
}
impl<T: Default + Deserialize> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        if deserialize::<bool>(src)? {
            *self = Some(deserialize(src)?);
        } else {
            *self = None;
        }
        Ok(())
    }
}

impl<T: Serialize> Serialize for Box<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_ref().serialize(dest)
    }
}
impl<T: Default + Deserialize> Deserialize for Box<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.as_mut().deserialize(src)
    }
}

/// Implements [`Serialize`] for a struct by serializing each named field in
/// declaration order.
#[macro_export]
macro_rules! SerializeStruct {
    ($t:ident, $($field:ident),*) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $(self.$field.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by deserializing each named
/// field in declaration order.
#[macro_export]
macro_rules! DeserializeStruct {
    ($t:ident, $($field:ident),*) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $(self.$field.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Serialize`] for a fieldless `#[repr(u32)]` enum as its
/// 4-byte discriminant.
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                (*self as u32).serialize(dest)
            }
        }
    };
}

/// Implements [`Deserialize`] for a fieldless enum; unknown discriminants
/// are a decode error, which the dispatcher surfaces as GARBAGE_ARGS.
#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let tag = $crate::xdr::deserialize::<u32>(src)?;
                match num_traits::cast::FromPrimitive::from_u32(tag) {
                    Some(value) => {
                        *self = value;
                        Ok(())
                    }
                    None => Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("invalid {} discriminant: {tag}", stringify!($t)),
                    )),
                }
            }
        }
    };
}

/// Implements [`Serialize`] for a boolean-discriminated union enum with a
/// `Void` arm and a single value-carrying arm.
#[macro_export]
macro_rules! SerializeBoolUnion {
    ($t:ident, $case:ident, $ty:ty) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                match self {
                    $t::Void => false.serialize(dest),
                    $t::$case(v) => {
                        true.serialize(dest)?;
                        v.serialize(dest)
                    }
                }
            }
        }
    };
}

/// Implements [`Deserialize`] for a boolean-discriminated union enum.
#[macro_export]
macro_rules! DeserializeBoolUnion {
    ($t:ident, $case:ident, $ty:ty) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                if $crate::xdr::deserialize::<bool>(src)? {
                    *self = $t::$case($crate::xdr::deserialize::<$ty>(src)?);
                } else {
                    *self = $t::Void;
                }
                Ok(())
            }
        }
    };
}

// Re-export the macros under the xdr module path used by the wire types.
pub use crate::DeserializeBoolUnion;
pub use crate::DeserializeEnum;
pub use crate::DeserializeStruct;
pub use crate::SerializeBoolUnion;
pub use crate::SerializeEnum;
pub use crate::SerializeStruct;

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Serialize + Deserialize + Default + PartialEq + std::fmt::Debug>(value: T) {
        let buf = serialize_to_vec(&value).unwrap();
        assert_eq!(buf.len() % 4, 0, "encoding of {value:?} is not 4-byte aligned");
        let decoded = deserialize::<T>(&mut &buf[..]).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn scalar_round_trips() {
        round_trip(true);
        round_trip(false);
        round_trip(0u32);
        round_trip(u32::MAX);
        round_trip(i32::MIN);
        round_trip(u64::MAX);
        round_trip(i64::MIN);
    }

    #[test]
    fn opaque_padding() {
        for len in 0..9usize {
            let value: Vec<u8> = (0..len as u8).collect();
            let buf = serialize_to_vec(&value).unwrap();
            assert_eq!(buf.len(), 4 + len + pad_len(len));
            // trailing pad bytes are zero
            assert!(buf[4 + len..].iter().all(|&b| b == 0));
            let decoded = deserialize::<Vec<u8>>(&mut &buf[..]).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn opaque_truncated_payload_is_error() {
        // length prefix says 4 bytes but only 3 follow
        let buf = [0, 0, 0, 4, 1, 2, 3];
        assert!(deserialize::<Vec<u8>>(&mut &buf[..]).is_err());
    }

    #[test]
    fn opaque_length_bomb_is_rejected() {
        let mut buf = Vec::new();
        ((MAX_OPAQUE_LEN + 1) as u32).serialize(&mut buf).unwrap();
        assert!(deserialize::<Vec<u8>>(&mut &buf[..]).is_err());
    }

    #[test]
    fn option_round_trips() {
        round_trip::<Option<u32>>(None);
        round_trip(Some(77u32));
    }

    #[test]
    fn string_rejects_bad_utf8() {
        let value: Vec<u8> = vec![0xff, 0xfe, 0x01];
        let buf = serialize_to_vec(&value).unwrap();
        assert!(deserialize::<String>(&mut &buf[..]).is_err());
    }
}
