//! BIP-39 mnemonics: wordlist encoding of caller-supplied entropy and
//! PBKDF2 stretching of a mnemonic into a 64-byte seed.

use crate::codec;
use crate::error::{Error, Result};
use bip39::{Language, Mnemonic};
use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// Entropy requested from the source: 256 bits, 24 words.
pub const ENTROPY_SIZE: usize = 32;
pub const SEED_SIZE: usize = 64;
const PBKDF2_ROUNDS: u32 = 2048;

/// Builds a mnemonic from `entropy_source(ENTROPY_SIZE)`.
///
/// The source must return exactly the requested number of bytes.
pub fn generate_mnemonic<F>(entropy_source: F) -> Result<String>
where
    F: FnOnce(usize) -> Vec<u8>,
{
    let entropy = Zeroizing::new(entropy_source(ENTROPY_SIZE));
    if entropy.len() != ENTROPY_SIZE {
        return Err(Error::BadEntropy(
            "Unable to get required amount of entropy".to_string(),
        ));
    }

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| Error::Internal(format!("Failed to generate mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

/// Stretches a checked mnemonic and optional passphrase into a seed.
pub fn mnemonic_to_seed(mnemonic: &str, passphrase: &str) -> Result<Zeroizing<[u8; SEED_SIZE]>> {
    let normalized = Zeroizing::new(mnemonic.nfkd().collect::<String>());
    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

    let salt = Zeroizing::new(format!("mnemonic{}", passphrase.nfkd().collect::<String>()));
    let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(
        normalized.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ROUNDS,
        &mut seed[..],
    )
    .map_err(|_| Error::Internal("Failed to generate seed".to_string()))?;

    Ok(seed)
}

pub fn seed_to_string(seed: &[u8]) -> String {
    codec::base58_encode(seed)
}

/// English wordlist used for every mnemonic produced here.
pub fn dictionary() -> &'static [&'static str] {
    Language::English.word_list()
}

/// Entropy source backed by the operating system RNG.
pub fn os_entropy(size: usize) -> Vec<u8> {
    let mut entropy = vec![0u8; size];
    OsRng.fill_bytes(&mut entropy);
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_from_fixed_entropy() {
        let mnemonic = generate_mnemonic(|size| vec![0u8; size]).unwrap();
        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        assert_eq!(words.len(), 24);
        assert_eq!(words[23], "art");
        assert!(words[..23].iter().all(|w| *w == "abandon"));
    }

    #[test]
    fn test_short_entropy_is_bad_entropy() {
        let err = generate_mnemonic(|size| vec![1u8; size - 1]).unwrap_err();
        assert!(matches!(err, Error::BadEntropy(_)));
    }

    #[test]
    fn test_os_entropy_mnemonic() {
        let mnemonic = generate_mnemonic(os_entropy).unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        assert!(mnemonic_to_seed(&mnemonic, "").is_ok());
    }

    #[test]
    fn test_seed_generation() {
        // Known good seed from the BIP-39 test vectors
        let expected = hex::decode(
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04",
        )
        .unwrap();
        let seed = mnemonic_to_seed(ABANDON, "TREZOR").unwrap();
        assert_eq!(&seed[..], expected.as_slice());
    }

    #[test]
    fn test_invalid_mnemonic() {
        let invalid = ABANDON.replace("about", "invalid");
        assert!(matches!(
            mnemonic_to_seed(&invalid, ""),
            Err(Error::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_seed_to_string() {
        assert_eq!(seed_to_string(&[0, 0, 1]), "112");
        assert_eq!(dictionary().len(), 2048);
    }
}
