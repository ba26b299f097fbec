//! Little-endian primitive readers over fixed-layout account buffers.
//!
//! Every reader takes the buffer and an offset and returns the value together
//! with the offset just past it, so records decode as a chain of reads.

use solana_program::pubkey::Pubkey;

use crate::error::DecodeError;

/// A decoded value and the offset of the next field.
pub type ReadResult<T> = Result<(T, usize), DecodeError>;

fn take<const N: usize>(buf: &[u8], offset: usize) -> ReadResult<[u8; N]> {
    let end = offset
        .checked_add(N)
        .filter(|end| *end <= buf.len())
        .ok_or(DecodeError::MalformedBuffer {
            offset,
            needed: N,
            len: buf.len(),
        })?;
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..end]);
    Ok((out, end))
}

pub fn read_u8(buf: &[u8], offset: usize) -> ReadResult<u8> {
    let ([b], next) = take::<1>(buf, offset)?;
    Ok((b, next))
}

pub fn read_u16(buf: &[u8], offset: usize) -> ReadResult<u16> {
    let (bytes, next) = take::<2>(buf, offset)?;
    Ok((u16::from_le_bytes(bytes), next))
}

pub fn read_u64(buf: &[u8], offset: usize) -> ReadResult<u64> {
    let (bytes, next) = take::<8>(buf, offset)?;
    Ok((u64::from_le_bytes(bytes), next))
}

/// 128-bit values are stored as a low and a high 64-bit half.
pub fn read_u128(buf: &[u8], offset: usize) -> ReadResult<u128> {
    let (low, next) = read_u64(buf, offset)?;
    let (high, next) = read_u64(buf, next)?;
    Ok((((high as u128) << 64) | low as u128, next))
}

/// A one-byte flag where only `1` means true.
pub fn read_bool(buf: &[u8], offset: usize) -> ReadResult<bool> {
    let (b, next) = read_u8(buf, offset)?;
    Ok((b == 1, next))
}

pub fn read_pubkey(buf: &[u8], offset: usize) -> ReadResult<Pubkey> {
    let (bytes, next) = take::<32>(buf, offset)?;
    Ok((Pubkey::new_from_array(bytes), next))
}

pub fn read_bytes<const N: usize>(buf: &[u8], offset: usize) -> ReadResult<[u8; N]> {
    take::<N>(buf, offset)
}

/// A presence flag (0 = absent, 1 = present) followed by the value when present.
pub fn read_option<T>(
    buf: &[u8],
    offset: usize,
    read: impl Fn(&[u8], usize) -> ReadResult<T>,
) -> ReadResult<Option<T>> {
    let (tag, next) = read_u8(buf, offset)?;
    match tag {
        0 => Ok((None, next)),
        1 => {
            let (value, next) = read(buf, next)?;
            Ok((Some(value), next))
        }
        tag => Err(DecodeError::InvalidOptionTag { offset, tag }),
    }
}

/// Append-only counterpart of the readers, producing the same layout.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u128(&mut self, value: u128) -> &mut Self {
        self.u64(value as u64).u64((value >> 64) as u64)
    }

    pub fn pubkey(&mut self, value: &Pubkey) -> &mut Self {
        self.bytes(value.as_ref())
    }

    pub fn option_pubkey(&mut self, value: Option<&Pubkey>) -> &mut Self {
        match value {
            Some(key) => self.u8(1).pubkey(key),
            None => self.u8(0),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
