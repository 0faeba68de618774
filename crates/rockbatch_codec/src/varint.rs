//! Base-128 varints, varstrings and little-endian fixed-width integers.
//!
//! A varint stores 7 bits per byte, least significant group first. The high
//! bit of each byte is set when another byte follows. A `u64` needs at most
//! [`MAX_VARINT_LEN`] bytes.

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Decodes one varint from the front of `buf`.
///
/// Returns `(value, consumed)`. `consumed == 0` signals failure: either `buf`
/// ended before a terminating byte, or the encoded value does not fit in 64
/// bits. The sentinel lets callers tell a corrupt length field apart from a
/// clean end of input without an error type.
///
/// ```
/// use rockbatch_codec::varint::decode_varint;
///
/// assert_eq!(decode_varint(&[0xac, 0x02, 0xff]), (300, 2));
/// assert_eq!(decode_varint(&[0x80, 0x80]), (0, 0));
/// ```
#[must_use]
pub fn decode_varint(buf: &[u8]) -> (u64, usize) {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let shift = 7 * i as u32;
        let group = u64::from(byte & 0x7f);
        // The tenth byte only has room for the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return (0, 0);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return (value, i + 1);
        }
    }
    (0, 0)
}

/// Appends the varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`.
#[must_use]
pub const fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Appends `data` as a varstring: varint length followed by the raw bytes.
///
/// A zero-length slice writes the single length byte `0x00` and nothing else.
pub fn put_varstring(out: &mut Vec<u8>, data: &[u8]) {
    encode_varint(data.len() as u64, out);
    out.extend_from_slice(data);
}

/// Decodes one varstring from the front of `buf`.
///
/// Returns the payload slice and the total number of bytes consumed (length
/// prefix plus payload), or `None` if the prefix is malformed or the declared
/// length runs past the end of `buf`.
#[must_use]
pub fn decode_varstring(buf: &[u8]) -> Option<(&[u8], usize)> {
    let (len, prefix) = decode_varint(buf);
    if prefix == 0 {
        return None;
    }
    let len = usize::try_from(len).ok()?;
    let end = prefix.checked_add(len)?;
    let data = buf.get(prefix..end)?;
    Some((data, end))
}

/// Appends `value` as 4 little-endian bytes.
pub fn put_fixed32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends `value` as 8 little-endian bytes.
pub fn put_fixed64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Reads a little-endian `u32` from the first 4 bytes of `buf`.
#[must_use]
pub fn decode_fixed32(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Reads a little-endian `u64` from the first 8 bytes of `buf`.
#[must_use]
pub fn decode_fixed64(buf: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
