// Multi-currency wallet core.
// Derives BIP-32/BIP-44 keys from a BIP-39 seed, builds Bitcoin, Ethereum and
// Golos accounts on top of them and signs transactions for those chains.

pub mod account;
pub mod api;
pub mod bip32;
pub mod bip44;
pub mod codec;
pub mod config;
pub mod currency;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod properties;
pub mod transaction;
pub mod utils;

pub use account::{Account, AccountAddress, HdAccount, KeyType};
pub use bip32::{ChildNumber, DerivationPath, ExtendedKey, ExtendedPrivKey, ExtendedPubKey};
pub use bip44::{AccountLevel, AddressIndex, AddressType, Bip44Path, CoinType, Purpose};
pub use config::WalletConfig;
pub use currency::{BlockchainType, Currency};
pub use error::{Error, ErrorKind, Result};
pub use keys::{PrivateKey, PublicKey};
pub use properties::{Properties, Property, PropertyTrait};
pub use transaction::{Transaction, TransactionState};

// Re-export types from dependencies that are part of our public API
pub use num_bigint::BigInt;

#[cfg(test)]
mod tests {
    use super::*;
    use account::bitcoin::{BitcoinAddress, BitcoinNetwork};
    use currency::{ETHEREUM_CHAIN_ID_RINKEBY, NET_TYPE_MAINNET, NET_TYPE_TESTNET};
    use hex_literal::hex;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn master_key() -> ExtendedKey {
        let seed = mnemonic::mnemonic_to_seed(PHRASE, "").unwrap();
        api::make_master_key(&seed[..]).unwrap()
    }

    #[test]
    fn test_mnemonic_to_accounts() {
        let phrase = mnemonic::generate_mnemonic(|size| vec![0u8; size]).unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        let seed = mnemonic::mnemonic_to_seed(&phrase, "").unwrap();
        let master = api::make_master_key(&seed[..]).unwrap();

        let mut addresses = Vec::new();
        for currency in [Currency::Bitcoin, Currency::Ethereum, Currency::Golos] {
            let blockchain = BlockchainType::mainnet(currency);
            let mut account = api::make_hd_account(&master, blockchain, 0).unwrap();
            let leaf = api::make_hd_leaf_account(&mut account, AddressType::External, 0).unwrap();
            assert_eq!(api::get_account_currency(&leaf), blockchain);
            assert!(api::get_account_address_path(&leaf).ends_with("'/0'/0/0"));
            addresses.push(api::get_account_address_string(&leaf));
        }
        assert!(addresses[0].starts_with('1'));
        assert_eq!(addresses[1].len(), 40);
        assert!(addresses[2].starts_with("GLS"));
    }

    #[test]
    fn test_bip44_bitcoin_address() {
        // well-known wallet of the "abandon ... about" mnemonic
        let mut account =
            api::make_hd_account(&master_key(), BlockchainType::mainnet(Currency::Bitcoin), 0)
                .unwrap();
        let leaf = api::make_hd_leaf_account(&mut account, AddressType::External, 0).unwrap();
        assert_eq!(
            api::get_account_address_string(&leaf),
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
        );
        assert_eq!(
            account.extended_public_key().to_string(),
            "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj"
        );
    }

    #[test]
    fn test_bitcoin_leaf_transaction() {
        let blockchain = BlockchainType::new(Currency::Bitcoin, NET_TYPE_TESTNET);
        let mut hd_account = api::make_hd_account(&master_key(), blockchain, 0).unwrap();
        let leaf = api::make_hd_leaf_account(&mut hd_account, AddressType::External, 0).unwrap();
        let change = api::make_hd_leaf_account(&mut hd_account, AddressType::Internal, 0).unwrap();

        let network = BitcoinNetwork::from_net_type(NET_TYPE_TESTNET).unwrap();
        let script_pubkey = BitcoinAddress::decode(leaf.address(), network)
            .unwrap()
            .script_pubkey();

        let mut tx = api::make_transaction(&leaf).unwrap();
        let source = api::transaction_add_source(tx.as_mut()).unwrap();
        api::properties_set_big_int_value(source, "amount", "100000").unwrap();
        api::properties_set_binary_data_value(
            source,
            "prev_tx_hash",
            &hex!("48979223adb5f7f340c4f27d6cc45a38adb37876b2d7e34d2457cbf57342a391"),
        )
        .unwrap();
        api::properties_set_int32_value(source, "prev_tx_out_index", 0).unwrap();
        api::properties_set_binary_data_value(source, "prev_tx_out_script_pubkey", &script_pubkey)
            .unwrap();
        api::properties_set_private_key_value(source, "private_key", leaf.private_key()).unwrap();

        let destination = api::transaction_add_destination(tx.as_mut()).unwrap();
        api::properties_set_string_value(
            destination,
            "address",
            "mpJDSHJcytfxp9asgo2pqihabHmmJkqJuM",
        )
        .unwrap();
        api::properties_set_big_int_value(destination, "amount", "40000").unwrap();

        let change_destination = api::transaction_add_destination(tx.as_mut()).unwrap();
        api::properties_set_string_value(change_destination, "address", change.address())
            .unwrap();
        api::properties_set_int32_value(change_destination, "is_change", 1).unwrap();

        let fee = api::transaction_get_fee(tx.as_mut()).unwrap();
        api::properties_set_big_int_value(fee, "amount_per_byte", "10").unwrap();

        let serialized = api::transaction_serialize(tx.as_mut()).unwrap();
        assert_eq!(tx.state(), TransactionState::Serialized);
        // DER signatures may shift the final size by a byte
        let total_fee = api::transaction_get_total_fee(tx.as_ref()).unwrap();
        let size = serialized.len() as u64;
        assert!(total_fee >= BigInt::from((size - 2) * 10));
        assert!(total_fee <= BigInt::from((size + 2) * 10));
        assert_eq!(
            api::transaction_get_total_spent(tx.as_ref()).unwrap(),
            BigInt::from(100_000)
        );
    }

    #[test]
    fn test_ethereum_leaf_transaction() {
        let blockchain = BlockchainType::new(Currency::Ethereum, ETHEREUM_CHAIN_ID_RINKEBY);
        let mut hd_account = api::make_hd_account(&master_key(), blockchain, 0).unwrap();
        let leaf = api::make_hd_leaf_account(&mut hd_account, AddressType::External, 0).unwrap();
        assert_eq!(
            api::get_account_address_string(&leaf),
            "9858effd232b4033e47d90003d41ec34ecaeda94"
        );

        let mut tx = api::make_transaction(&leaf).unwrap();
        api::properties_set_big_int_value(
            api::transaction_get_properties(tx.as_mut()),
            "nonce",
            "0",
        )
        .unwrap();
        let fee = api::transaction_get_fee(tx.as_mut()).unwrap();
        api::properties_set_big_int_value(fee, "gas_price", "1000000000").unwrap();
        let source = api::transaction_add_source(tx.as_mut()).unwrap();
        api::properties_set_big_int_value(source, "amount", "21000000000000").unwrap();
        let destination = api::transaction_add_destination(tx.as_mut()).unwrap();
        api::properties_set_string_value(destination, "address", leaf.address()).unwrap();
        api::properties_set_big_int_value(destination, "amount", "1").unwrap();

        let err = api::transaction_serialize(tx.as_mut()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeneralError);
        assert_eq!(tx.state(), TransactionState::Building);

        let destination = tx.destination(0).unwrap();
        api::properties_set_big_int_value(destination, "amount", "0").unwrap();
        let serialized = api::transaction_serialize(tx.as_mut()).unwrap();
        let decoded = codec::RlpItem::decode(&serialized).unwrap();
        let v = decoded.as_list().unwrap()[6].as_bytes().unwrap().to_vec();
        // 35 + 2 * 4 + recovery id
        assert!(v == [43] || v == [44]);
    }

    #[test]
    fn test_golos_imported_account() {
        let blockchain = BlockchainType::new(Currency::Golos, NET_TYPE_MAINNET);
        let account =
            api::make_account(blockchain, "5Hq2ZdSGZokcgLoNxNGL5kHKi4e3kUUCqorgFK6T6ka7KtSvYLj")
                .unwrap();
        assert!(api::get_account_address_string(&account).starts_with("GLS"));
        assert_eq!(
            api::get_account_key(&account, KeyType::Private).unwrap(),
            "5Hq2ZdSGZokcgLoNxNGL5kHKi4e3kUUCqorgFK6T6ka7KtSvYLj"
        );

        let mut tx = api::make_transaction(&account).unwrap();
        assert_eq!(
            api::transaction_get_fee(tx.as_mut()).unwrap_err().kind(),
            ErrorKind::FeatureNotSupported
        );
        let properties = api::transaction_get_properties(tx.as_mut());
        api::properties_set_int32_value(properties, "ref_block_num", 1).unwrap();
        api::properties_set_binary_data_value(properties, "ref_block_hash", &[7u8; 20]).unwrap();
        api::properties_set_int32_value(properties, "expire_duration", 30).unwrap();
        let source = api::transaction_add_source(tx.as_mut()).unwrap();
        api::properties_set_string_value(source, "address", "multytest").unwrap();
        let destination = api::transaction_add_destination(tx.as_mut()).unwrap();
        api::properties_set_string_value(destination, "address", "pashaklybik").unwrap();
        api::properties_set_big_int_value(destination, "amount", "2500").unwrap();
        api::transaction_set_message(tx.as_mut(), b"hi").unwrap();

        let serialized = api::transaction_serialize(tx.as_mut()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&serialized).unwrap();
        assert_eq!(json["operations"][0][1]["amount"], "2.500 GOLOS");
        assert_eq!(json["operations"][0][1]["memo"], "hi");
        assert_eq!(json["signatures"][0].as_str().unwrap().len(), 130);
    }

    #[test]
    fn test_unsupported_net_type() {
        let master = master_key();
        let err = api::make_hd_account(&master, BlockchainType::new(Currency::Bitcoin, 7), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
