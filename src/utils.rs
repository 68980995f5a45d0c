use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use ripemd::Ripemd160;
use secp256k1::{All, Secp256k1};
use sha2::{Digest, Sha256, Sha512};
use sha3::Keccak256;

pub type HmacSha512 = Hmac<Sha512>;
pub type HmacSha256 = Hmac<Sha256>;

/// Process-wide secp256k1 context, built on first use.
pub static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Compute HMAC-SHA512
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut hash = [0u8; 64];
    hash.copy_from_slice(&result[..]);
    hash
}

/// Compute HMAC-SHA256 over the concatenation of `parts`
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Compute SHA256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA256 hash
pub fn hash_twice(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// RIPEMD160(SHA256(data)), the Bitcoin key hash
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Legacy Keccak-256 as used by Ethereum (not NIST SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Calculate checksum (first 4 bytes of double-SHA256 hash)
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = hash_twice(data);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&hash[0..4]);
    checksum
}
