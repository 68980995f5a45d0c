//! Private and public keys with the three ECDSA signature encodings the
//! supported chains expect.

use crate::codec;
use crate::error::{Error, Result};
use crate::utils::{self, SECP256K1};
use k256::ecdsa::hazmat::SignPrimitive;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{constants, Message, SecretKey};
use std::fmt;
use zeroize::Zeroizing;

/// Header offset of a compact signature made with a compressed key.
const COMPACT_HEADER_BASE: u8 = 27 + 4;

const MAX_NONCE_ATTEMPTS: u32 = 1024;

/// A secp256k1 private key. Wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: SecretKey,
    compressed: bool,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl PrivateKey {
    pub fn new(secret: SecretKey, compressed: bool) -> Self {
        PrivateKey { secret, compressed }
    }

    pub fn from_slice(bytes: &[u8], compressed: bool) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| Error::InvalidKey("Invalid private key bytes".to_string()))?;
        Ok(PrivateKey { secret, compressed })
    }

    /// Parses a WIF string, returning its version byte alongside the key.
    pub fn from_wif(wif: &str) -> Result<(u8, Self)> {
        let data = Zeroizing::new(codec::base58check_decode(wif)?);
        let compressed = match data.len() {
            33 => false,
            34 if data[33] == 0x01 => true,
            _ => {
                return Err(Error::InvalidKey(
                    "Invalid WIF private key length".to_string(),
                ))
            }
        };
        let key = PrivateKey::from_slice(&data[1..33], compressed)?;
        Ok((data[0], key))
    }

    pub fn to_wif(&self, version: u8) -> String {
        let mut data = Zeroizing::new(Vec::with_capacity(34));
        data.push(version);
        data.extend_from_slice(&*self.secret_bytes());
        if self.compressed {
            data.push(0x01);
        }
        codec::base58check_encode(&data)
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.secret_bytes())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: secp256k1::PublicKey::from_secret_key(&SECP256K1, &self.secret),
            compressed: self.compressed,
        }
    }

    /// DER-encoded, low-S, RFC6979 signature of a 32-byte digest.
    pub fn sign_der(&self, digest: &[u8; 32]) -> Vec<u8> {
        let message = Message::from_digest(*digest);
        SECP256K1
            .sign_ecdsa(&message, &self.secret)
            .serialize_der()
            .to_vec()
    }

    /// 65-byte `r || s || recovery_id` signature of a 32-byte digest.
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> [u8; 65] {
        let message = Message::from_digest(*digest);
        let (recovery_id, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, &self.secret)
            .serialize_compact();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&compact);
        out[64] = i32::from(recovery_id) as u8;
        out
    }

    /// 65-byte `header || r || s` signature whose r and s both encode as
    /// canonical 32-byte DER integers.
    ///
    /// Nonces are RFC6979 candidates starting from the second one, advancing
    /// until the signature is canonical.
    pub fn sign_canonical(&self, digest: &[u8; 32]) -> Result<[u8; 65]> {
        let secret = self.secret_bytes();
        let signing_key = k256::SecretKey::from_bytes(&FieldBytes::from(*secret))
            .map_err(|_| Error::InvalidKey("Invalid private key bytes".to_string()))?;

        for attempt in 1..=MAX_NONCE_ATTEMPTS {
            let nonce = rfc6979_nonce(&secret, digest, attempt);
            let Some((recovery_id, compact)) =
                sign_with_nonce(&signing_key.to_nonzero_scalar(), &nonce, digest)
            else {
                continue;
            };

            let mut out = [0u8; 65];
            out[0] = COMPACT_HEADER_BASE + recovery_id;
            out[1..].copy_from_slice(&compact);

            if is_canonical(&out) {
                self.check_recovers(digest, &out)?;
                return Ok(out);
            }
        }

        Err(Error::Internal(
            "Failed to produce a canonical signature".to_string(),
        ))
    }

    fn check_recovers(&self, digest: &[u8; 32], signature: &[u8; 65]) -> Result<()> {
        let recovery_id = RecoveryId::try_from(i32::from(signature[0] - COMPACT_HEADER_BASE))?;
        let recoverable = RecoverableSignature::from_compact(&signature[1..], recovery_id)?;
        let recovered = SECP256K1.recover_ecdsa(&Message::from_digest(*digest), &recoverable)?;
        if recovered != self.public_key().key {
            return Err(Error::Internal(
                "Signature does not recover the signing key".to_string(),
            ));
        }
        Ok(())
    }
}

/// Low-S `(recovery_id, r || s)` for nonce `k`, or `None` when the nonce is unusable.
fn sign_with_nonce(d: &Scalar, nonce: &[u8; 32], digest: &[u8; 32]) -> Option<(u8, [u8; 64])> {
    let k = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*nonce)))?;
    let (signature, recovery_id) = d.try_sign_prehashed(k, &FieldBytes::from(*digest)).ok()?;
    let mut compact = [0u8; 64];
    compact.copy_from_slice(&signature.to_bytes());
    Some((recovery_id?.to_byte(), compact))
}

/// The `attempt`-th output of the RFC6979 HMAC-SHA256 generator keyed
/// with `secret || digest`; attempt 0 is the standard deterministic nonce.
fn rfc6979_nonce(secret: &[u8; 32], digest: &[u8; 32], attempt: u32) -> Zeroizing<[u8; 32]> {
    let mut k = Zeroizing::new([0u8; 32]);
    let mut v = Zeroizing::new([1u8; 32]);

    *k = utils::hmac_sha256(&*k, &[&*v, &[0x00], secret, digest]);
    *v = utils::hmac_sha256(&*k, &[&*v]);
    *k = utils::hmac_sha256(&*k, &[&*v, &[0x01], secret, digest]);
    *v = utils::hmac_sha256(&*k, &[&*v]);

    for round in 0..=attempt {
        if round > 0 {
            *k = utils::hmac_sha256(&*k, &[&*v, &[0x00]]);
            *v = utils::hmac_sha256(&*k, &[&*v]);
        }
        *v = utils::hmac_sha256(&*k, &[&*v]);
    }
    v
}

/// Both r and s fit a 32-byte DER integer without padding or sign bit.
fn is_canonical(c: &[u8; 65]) -> bool {
    c[1] & 0x80 == 0
        && !(c[1] == 0 && c[2] & 0x80 == 0)
        && c[33] & 0x80 == 0
        && !(c[33] == 0 && c[34] & 0x80 == 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    key: secp256k1::PublicKey,
    compressed: bool,
}

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|_| Error::InvalidKey("Invalid public key bytes".to_string()))?;
        Ok(PublicKey {
            key,
            compressed: bytes.len() == constants::PUBLIC_KEY_SIZE,
        })
    }

    /// SEC1 encoding in the key's own compression form.
    pub fn serialize(&self) -> Vec<u8> {
        if self.compressed {
            self.key.serialize().to_vec()
        } else {
            self.key.serialize_uncompressed().to_vec()
        }
    }

    pub fn serialize_compressed(&self) -> [u8; 33] {
        self.key.serialize()
    }

    pub fn serialize_uncompressed(&self) -> [u8; 65] {
        self.key.serialize_uncompressed()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&codec::hex_encode(&self.serialize()))
    }
}
