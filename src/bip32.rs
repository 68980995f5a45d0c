use crate::codec;
use crate::error::{Error, Result};
use crate::utils::{self, SECP256K1};
use secp256k1::{PublicKey, SecretKey};
use std::fmt;
use std::str::FromStr;
use tracing::trace;
use zeroize::Zeroize;

/// First hardened index.
pub const HARDENED_BIT: u32 = 0x8000_0000;

const SEED_LENGTHS: [usize; 3] = [16, 32, 64];

/// Sets the hardened bit on an index that must not already carry it.
pub fn hardened(index: u32) -> Result<u32> {
    if index >= HARDENED_BIT {
        return Err(Error::InvalidArgument(format!(
            "Index {} is already hardened or out of range",
            index
        )));
    }
    Ok(index | HARDENED_BIT)
}

#[cfg(test)]
thread_local! {
    static DERIVATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Number of child derivations performed on this thread.
#[cfg(test)]
pub(crate) fn derivation_count() -> usize {
    DERIVATIONS.with(|count| count.get())
}

fn count_derivation() {
    #[cfg(test)]
    DERIVATIONS.with(|count| count.set(count.get() + 1));
}

/// The network type for HD keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Bitcoin,
    Testnet,
}

impl Network {
    /// Get the version bytes for extended private keys
    pub fn xprv_version(&self) -> [u8; 4] {
        match self {
            Network::Bitcoin => [0x04, 0x88, 0xAD, 0xE4], // xprv
            Network::Testnet => [0x04, 0x35, 0x83, 0x94], // tprv
        }
    }

    /// Get the version bytes for extended public keys
    pub fn xpub_version(&self) -> [u8; 4] {
        match self {
            Network::Bitcoin => [0x04, 0x88, 0xB2, 0x1E], // xpub
            Network::Testnet => [0x04, 0x35, 0x87, 0xCF], // tpub
        }
    }

    fn from_version(version: &[u8], private: bool) -> Result<Self> {
        [Network::Bitcoin, Network::Testnet]
            .into_iter()
            .find(|network| {
                let expected = if private {
                    network.xprv_version()
                } else {
                    network.xpub_version()
                };
                version == expected
            })
            .ok_or_else(|| Error::InvalidExtendedKey("Invalid version bytes".to_string()))
    }
}

/// A path element in a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildNumber {
    /// Normal derivation index (0..2^31-1)
    Normal(u32),
    /// Hardened derivation index, stored without the hardened bit
    Hardened(u32),
}

impl ChildNumber {
    /// Maximum normal index
    pub const MAX_NORMAL_INDEX: u32 = HARDENED_BIT - 1;

    /// Convert to raw index value
    pub fn to_u32(&self) -> u32 {
        match self {
            ChildNumber::Normal(i) => *i,
            ChildNumber::Hardened(i) => i | HARDENED_BIT,
        }
    }

    pub fn is_hardened(&self) -> bool {
        matches!(self, ChildNumber::Hardened(_))
    }
}

impl From<u32> for ChildNumber {
    fn from(index: u32) -> Self {
        if index & HARDENED_BIT != 0 {
            ChildNumber::Hardened(index & ChildNumber::MAX_NORMAL_INDEX)
        } else {
            ChildNumber::Normal(index)
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChildNumber::Normal(i) => write!(f, "{}", i),
            ChildNumber::Hardened(i) => write!(f, "{}'", i),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (digits, is_hardened) = match s.strip_suffix(['\'', 'h']) {
            Some(digits) => (digits, true),
            None => (s, false),
        };

        let index: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidDerivationPath(format!("Invalid index \"{}\"", s)))?;

        if index > ChildNumber::MAX_NORMAL_INDEX {
            return Err(Error::InvalidDerivationPath(format!(
                "Index \"{}\" out of range",
                s
            )));
        }

        Ok(if is_hardened {
            ChildNumber::Hardened(index)
        } else {
            ChildNumber::Normal(index)
        })
    }
}

/// An ordered sequence of derivation indices, rendered as `m/44'/0'/0'/0/0`.
///
/// Paths are values: extending one produces a new path and leaves the parent untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    pub path: Vec<ChildNumber>,
}

impl DerivationPath {
    pub fn new(path: Vec<ChildNumber>) -> Self {
        DerivationPath { path }
    }

    /// Returns a copy of this path with `child` appended.
    pub fn make_child_path(&self, child: ChildNumber) -> DerivationPath {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(child);
        DerivationPath { path }
    }

    /// Raw indices with the hardened bit applied.
    pub fn indices(&self) -> Vec<u32> {
        self.path.iter().map(ChildNumber::to_u32).collect()
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl From<&[u32]> for DerivationPath {
    fn from(indices: &[u32]) -> Self {
        DerivationPath {
            path: indices.iter().copied().map(ChildNumber::from).collect(),
        }
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.path {
            write!(f, "/{}", child)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let rest = match path.strip_prefix('m') {
            Some(rest) => rest,
            None => {
                return Err(Error::InvalidDerivationPath(
                    "Path must start with 'm'".to_string(),
                ))
            }
        };

        if rest.is_empty() {
            return Ok(DerivationPath::default());
        }

        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| Error::InvalidDerivationPath("Invalid path format".to_string()))?;

        let path = rest
            .split('/')
            .map(|p| p.parse::<ChildNumber>())
            .collect::<Result<Vec<_>>>()?;

        Ok(DerivationPath { path })
    }
}

fn fingerprint(public_key: &PublicKey) -> [u8; 4] {
    let hash = utils::hash160(&public_key.serialize());
    let mut fingerprint = [0u8; 4];
    fingerprint.copy_from_slice(&hash[0..4]);
    fingerprint
}

fn split_hmac(hmac_result: &mut [u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut i_l = [0u8; 32];
    let mut i_r = [0u8; 32];
    i_l.copy_from_slice(&hmac_result[0..32]);
    i_r.copy_from_slice(&hmac_result[32..64]);
    hmac_result.zeroize();
    (i_l, i_r)
}

fn child_depth(depth: u8) -> Result<u8> {
    depth
        .checked_add(1)
        .ok_or_else(|| Error::InvalidExtendedKey("Maximum derivation depth reached".to_string()))
}

/// Extended private key as defined in BIP-32
///
/// Key bytes and chain code are wiped when the key is dropped.
#[derive(Clone)]
pub struct ExtendedPrivKey {
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub private_key: SecretKey,
    pub network: Network,
}

impl fmt::Debug for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExtendedPrivKey")
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl Drop for ExtendedPrivKey {
    fn drop(&mut self) {
        self.chain_code.zeroize();
        self.private_key.non_secure_erase();
    }
}

impl ExtendedPrivKey {
    /// Create a new master extended private key from a seed
    pub fn new_master(seed: &[u8], network: Network) -> Result<Self> {
        if !SEED_LENGTHS.contains(&seed.len()) {
            return Err(Error::Internal("Invalid seed length".to_string()));
        }

        let mut hmac_result = utils::hmac_sha512(b"Bitcoin seed", seed);
        let (mut secret_key, chain_code) = split_hmac(&mut hmac_result);

        let sk = SecretKey::from_slice(&secret_key);
        secret_key.zeroize();
        let sk = sk.map_err(|_| {
            Error::BadEntropy("Seed produces an invalid master key".to_string())
        })?;

        trace!("derived master key");
        Ok(ExtendedPrivKey {
            depth: 0,
            parent_fingerprint: [0, 0, 0, 0],
            child_number: 0,
            chain_code,
            private_key: sk,
            network,
        })
    }

    /// Derive a child key (CKDpriv)
    pub fn derive_child(&self, child_number: ChildNumber) -> Result<ExtendedPrivKey> {
        count_derivation();
        let parent_public_key = self.public_key();
        let mut hmac_input = Vec::with_capacity(37);

        if child_number.is_hardened() {
            // 0x00 || private_key || index
            hmac_input.push(0);
            hmac_input.extend_from_slice(&self.private_key.secret_bytes());
        } else {
            // public_key || index
            hmac_input.extend_from_slice(&parent_public_key.serialize());
        }

        let index = child_number.to_u32();
        hmac_input.extend_from_slice(&index.to_be_bytes());

        let mut hmac_result = utils::hmac_sha512(&self.chain_code, &hmac_input);
        hmac_input.zeroize();
        let (mut i_l, i_r) = split_hmac(&mut hmac_result);

        // child = (parent + I_L) mod n
        let tweak = SecretKey::from_slice(&i_l);
        i_l.zeroize();
        let child_private_key = tweak
            .map_err(|_| Error::InvalidKey("Invalid HMAC-SHA512 left half".to_string()))?
            .add_tweak(&self.private_key.into())
            .map_err(|_| Error::InvalidKey("Invalid child private key".to_string()))?;

        let depth = child_depth(self.depth)?;
        trace!(depth, child = %child_number, "derived private child");
        Ok(ExtendedPrivKey {
            depth,
            parent_fingerprint: fingerprint(&parent_public_key),
            child_number: index,
            chain_code: i_r,
            private_key: child_private_key,
            network: self.network,
        })
    }

    /// Derive a child key from a derivation path
    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPrivKey> {
        let mut key = self.clone();

        for &child_number in &path.path {
            key = key.derive_child(child_number)?;
        }

        Ok(key)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&SECP256K1, &self.private_key)
    }

    /// Get the corresponding extended public key
    pub fn to_extended_public_key(&self) -> ExtendedPubKey {
        ExtendedPubKey {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            public_key: self.public_key(),
            network: self.network,
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(78);
        data.extend_from_slice(&self.network.xprv_version());
        data.push(self.depth);
        data.extend_from_slice(&self.parent_fingerprint);
        data.extend_from_slice(&self.child_number.to_be_bytes());
        data.extend_from_slice(&self.chain_code);
        data.push(0);
        data.extend_from_slice(&self.private_key.secret_bytes());
        data
    }

    /// Parse an extended private key from a base58 string
    pub fn from_string(xprv: &str) -> Result<Self> {
        let mut data = codec::base58check_decode(xprv)?;
        let header = ExtendedKeyHeader::parse(&data, true);
        let result = header.and_then(|header| {
            if data[45] != 0 {
                return Err(Error::InvalidExtendedKey(
                    "Invalid private key prefix".to_string(),
                ));
            }
            let private_key = SecretKey::from_slice(&data[46..78])
                .map_err(|_| Error::InvalidKey("Invalid private key".to_string()))?;
            Ok(ExtendedPrivKey {
                depth: header.depth,
                parent_fingerprint: header.parent_fingerprint,
                child_number: header.child_number,
                chain_code: header.chain_code,
                private_key,
                network: header.network,
            })
        });
        data.zeroize();
        result
    }
}

impl fmt::Display for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut data = self.serialize();
        let encoded = codec::base58check_encode(&data);
        data.zeroize();
        f.write_str(&encoded)
    }
}

impl FromStr for ExtendedPrivKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExtendedPrivKey::from_string(s)
    }
}

struct ExtendedKeyHeader {
    network: Network,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
}

impl ExtendedKeyHeader {
    fn parse(data: &[u8], private: bool) -> Result<Self> {
        if data.len() != 78 {
            return Err(Error::InvalidExtendedKey(
                "Invalid extended key length".to_string(),
            ));
        }

        let network = Network::from_version(&data[0..4], private)?;

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);

        let mut child_number_bytes = [0u8; 4];
        child_number_bytes.copy_from_slice(&data[9..13]);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        Ok(ExtendedKeyHeader {
            network,
            depth: data[4],
            parent_fingerprint,
            child_number: u32::from_be_bytes(child_number_bytes),
            chain_code,
        })
    }
}

/// Extended public key as defined in BIP-32
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPubKey {
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub public_key: PublicKey,
    pub network: Network,
}

impl ExtendedPubKey {
    /// Derive a child key (CKDpub) - only for non-hardened derivation
    pub fn derive_child(&self, child_number: ChildNumber) -> Result<ExtendedPubKey> {
        if child_number.is_hardened() {
            return Err(Error::HardenedDerivationRequiresPrivateKey);
        }
        count_derivation();

        let mut hmac_input = Vec::with_capacity(37);
        hmac_input.extend_from_slice(&self.public_key.serialize());
        let index = child_number.to_u32();
        hmac_input.extend_from_slice(&index.to_be_bytes());

        let mut hmac_result = utils::hmac_sha512(&self.chain_code, &hmac_input);
        let (i_l, i_r) = split_hmac(&mut hmac_result);

        // child = point(I_L) + parent
        let hash = SecretKey::from_slice(&i_l)
            .map_err(|_| Error::InvalidKey("Invalid HMAC-SHA512 left half".to_string()))?;
        let point = PublicKey::from_secret_key(&SECP256K1, &hash);
        let child_public_key = self
            .public_key
            .combine(&point)
            .map_err(|_| Error::InvalidKey("Invalid child public key".to_string()))?;

        let depth = child_depth(self.depth)?;
        trace!(depth, child = %child_number, "derived public child");
        Ok(ExtendedPubKey {
            depth,
            parent_fingerprint: fingerprint(&self.public_key),
            child_number: index,
            chain_code: i_r,
            public_key: child_public_key,
            network: self.network,
        })
    }

    /// Derive a child key from a derivation path (only non-hardened)
    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPubKey> {
        let mut key = self.clone();

        for &child_number in &path.path {
            key = key.derive_child(child_number)?;
        }

        Ok(key)
    }

    fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(78);
        data.extend_from_slice(&self.network.xpub_version());
        data.push(self.depth);
        data.extend_from_slice(&self.parent_fingerprint);
        data.extend_from_slice(&self.child_number.to_be_bytes());
        data.extend_from_slice(&self.chain_code);
        data.extend_from_slice(&self.public_key.serialize());
        data
    }

    /// Parse an extended public key from a base58 string
    pub fn from_string(xpub: &str) -> Result<Self> {
        let data = codec::base58check_decode(xpub)?;
        let header = ExtendedKeyHeader::parse(&data, false)?;
        let public_key = PublicKey::from_slice(&data[45..78])
            .map_err(|_| Error::InvalidKey("Invalid public key".to_string()))?;

        Ok(ExtendedPubKey {
            depth: header.depth,
            parent_fingerprint: header.parent_fingerprint,
            child_number: header.child_number,
            chain_code: header.chain_code,
            public_key,
            network: header.network,
        })
    }
}

impl fmt::Display for ExtendedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&codec::base58check_encode(&self.serialize()))
    }
}

impl FromStr for ExtendedPubKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExtendedPubKey::from_string(s)
    }
}

/// A BIP-32 node: exclusively private or public.
#[derive(Debug, Clone)]
pub enum ExtendedKey {
    Private(ExtendedPrivKey),
    Public(ExtendedPubKey),
}

impl ExtendedKey {
    /// Derives the child at raw `index`; indices >= 2^31 are hardened.
    pub fn derive_child(&self, index: u32) -> Result<ExtendedKey> {
        let child_number = ChildNumber::from(index);
        match self {
            ExtendedKey::Private(key) => key.derive_child(child_number).map(ExtendedKey::Private),
            ExtendedKey::Public(key) => key.derive_child(child_number).map(ExtendedKey::Public),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ExtendedKey::Private(_))
    }

    pub fn depth(&self) -> u8 {
        match self {
            ExtendedKey::Private(key) => key.depth,
            ExtendedKey::Public(key) => key.depth,
        }
    }

    pub fn to_public(&self) -> ExtendedPubKey {
        match self {
            ExtendedKey::Private(key) => key.to_extended_public_key(),
            ExtendedKey::Public(key) => key.clone(),
        }
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtendedKey::Private(key) => fmt::Display::fmt(key, f),
            ExtendedKey::Public(key) => fmt::Display::fmt(key, f),
        }
    }
}

impl FromStr for ExtendedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match ExtendedPrivKey::from_string(s) {
            Ok(key) => Ok(ExtendedKey::Private(key)),
            Err(_) => ExtendedPubKey::from_string(s).map(ExtendedKey::Public),
        }
    }
}
