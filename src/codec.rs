//! Pure data-transform helpers: hex, base58, base58check, RLP and the
//! two varint flavours (Bitcoin compact-size and LEB128).

use crate::error::{Error, Result};
use crate::utils;
use num_bigint::{BigInt, Sign};

pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes hex, accepting an optional `0x` prefix.
pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    let data = data.strip_prefix("0x").unwrap_or(data);
    Ok(hex::decode(data)?)
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| Error::Base58DecodeError(e.to_string()))
}

/// Encode a base58 string with a checksum
pub fn base58check_encode(data: &[u8]) -> String {
    let mut check_data = Vec::with_capacity(data.len() + 4);
    check_data.extend_from_slice(data);
    check_data.extend_from_slice(&utils::checksum(data));
    base58_encode(&check_data)
}

/// Decode a base58 string and verify its checksum
pub fn base58check_decode(data: &str) -> Result<Vec<u8>> {
    let mut decoded = base58_decode(data)?;

    if decoded.len() < 4 {
        return Err(Error::InvalidChecksum);
    }

    let checksum_index = decoded.len() - 4;
    if decoded[checksum_index..] != utils::checksum(&decoded[..checksum_index]) {
        return Err(Error::InvalidChecksum);
    }

    decoded.truncate(checksum_index);
    Ok(decoded)
}

/// Appends a Bitcoin compact-size integer.
pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Appends an unsigned LEB128 varint, the length prefix of Graphene binary strings.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

const RLP_STRING_OFFSET: u8 = 0x80;
const RLP_LONG_STRING_OFFSET: u8 = 0xb7;
const RLP_LIST_OFFSET: u8 = 0xc0;
const RLP_LONG_LIST_OFFSET: u8 = 0xf7;
const RLP_SHORT_LIMIT: usize = 56;

/// A decoded (or to-be-encoded) RLP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Integers are encoded big-endian with no leading zeroes, zero being the empty string.
    pub fn from_uint(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        RlpItem::Bytes(bytes[first..].to_vec())
    }

    pub fn from_big_int(value: &BigInt) -> Result<Self> {
        match value.sign() {
            Sign::Minus => Err(Error::InvalidArgument(
                "RLP can't encode a negative integer".to_string(),
            )),
            Sign::NoSign => Ok(RlpItem::Bytes(Vec::new())),
            Sign::Plus => Ok(RlpItem::Bytes(value.to_bytes_be().1)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        match self {
            RlpItem::Bytes(data) => {
                if data.len() == 1 && data[0] < RLP_STRING_OFFSET {
                    out.push(data[0]);
                } else {
                    write_rlp_length(out, data.len(), RLP_STRING_OFFSET, RLP_LONG_STRING_OFFSET);
                    out.extend_from_slice(data);
                }
            }
            RlpItem::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_to(&mut payload);
                }
                write_rlp_length(out, payload.len(), RLP_LIST_OFFSET, RLP_LONG_LIST_OFFSET);
                out.extend_from_slice(&payload);
            }
        }
    }

    /// Decodes exactly one item; trailing bytes are an error.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (item, consumed) = decode_item(data)?;
        if consumed != data.len() {
            return Err(Error::RlpDecodeError(format!(
                "{} trailing bytes after item",
                data.len() - consumed
            )));
        }
        Ok(item)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(data) => Some(data),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::Bytes(_) => None,
        }
    }
}

fn write_rlp_length(out: &mut Vec<u8>, len: usize, short_offset: u8, long_offset: u8) {
    if len < RLP_SHORT_LIMIT {
        out.push(short_offset + len as u8);
    } else {
        let bytes = (len as u64).to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let len_bytes = &bytes[first..];
        out.push(long_offset + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
}

fn take(data: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| Error::RlpDecodeError("input is too short".to_string()))
}

fn read_long_length(data: &[u8], len_of_len: usize) -> Result<usize> {
    let bytes = take(data, 1, len_of_len)?;
    if bytes.first() == Some(&0) {
        return Err(Error::RlpDecodeError("length has leading zeroes".to_string()));
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(Error::RlpDecodeError("length is too large".to_string()));
    }
    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len < RLP_SHORT_LIMIT {
        return Err(Error::RlpDecodeError("non-canonical long length".to_string()));
    }
    Ok(len)
}

fn decode_item(data: &[u8]) -> Result<(RlpItem, usize)> {
    let prefix = *data
        .first()
        .ok_or_else(|| Error::RlpDecodeError("empty input".to_string()))?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - RLP_STRING_OFFSET) as usize;
            let body = take(data, 1, len)?;
            if len == 1 && body[0] < RLP_STRING_OFFSET {
                return Err(Error::RlpDecodeError(
                    "single byte must be self-encoded".to_string(),
                ));
            }
            Ok((RlpItem::Bytes(body.to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - RLP_LONG_STRING_OFFSET) as usize;
            let len = read_long_length(data, len_of_len)?;
            let body = take(data, 1 + len_of_len, len)?;
            Ok((RlpItem::Bytes(body.to_vec()), 1 + len_of_len + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - RLP_LIST_OFFSET) as usize;
            let body = take(data, 1, len)?;
            Ok((RlpItem::List(decode_list(body)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - RLP_LONG_LIST_OFFSET) as usize;
            let len = read_long_length(data, len_of_len)?;
            let body = take(data, 1 + len_of_len, len)?;
            Ok((RlpItem::List(decode_list(body)?), 1 + len_of_len + len))
        }
    }
}

fn decode_list(mut body: &[u8]) -> Result<Vec<RlpItem>> {
    let mut items = Vec::new();
    while !body.is_empty() {
        let (item, consumed) = decode_item(body)?;
        items.push(item);
        body = &body[consumed..];
    }
    Ok(items)
}
