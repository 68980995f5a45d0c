use anyhow::Context;
use multiwallet_core::api;
use multiwallet_core::mnemonic;
use multiwallet_core::{AddressType, BlockchainType, Currency, KeyType, WalletConfig};
use tracing_subscriber::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiwallet_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional JSON wallet config as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path))?;
            WalletConfig::from_json(&json)?
        }
        None => WalletConfig::default(),
    };

    // Example 1: Generate a mnemonic and derive an address per currency
    println!("Example 1: Generate new mnemonic and accounts");
    println!("---------------------------------------------");

    let phrase = mnemonic::generate_mnemonic(mnemonic::os_entropy)?;
    println!("Mnemonic: {}", phrase);

    let seed = mnemonic::mnemonic_to_seed(&phrase, "")?;
    let master_key = api::make_master_key(&seed[..])?;
    println!(
        "Master Key: {}",
        api::extended_key_to_string(&master_key, KeyType::Public)?
    );

    for currency in [Currency::Bitcoin, Currency::Ethereum, Currency::Golos] {
        let mut account = api::make_hd_account(&master_key, BlockchainType::mainnet(currency), 0)?;
        let leaf = api::make_hd_leaf_account(&mut account, AddressType::External, 0)?;
        println!(
            "{:<8} {} {}",
            currency,
            api::get_account_address_path(&leaf),
            api::get_account_address_string(&leaf)
        );
    }

    // Example 2: Sign an Ethereum transfer from an imported key
    println!("\nExample 2: Sign an Ethereum transfer");
    println!("------------------------------------");

    let account = api::make_account(
        BlockchainType::mainnet(Currency::Ethereum),
        "cc798d20ea341f838981c3df7f58f1bf453e6dcc2894c0d17d7da1b422a623c7",
    )?;
    println!("From: {}", api::get_account_address_string(&account));

    let mut transaction = api::make_transaction_with_config(&account, &config)?;
    api::properties_set_big_int_value(
        api::transaction_get_properties(transaction.as_mut()),
        "nonce",
        "0",
    )?;
    let fee = api::transaction_get_fee(transaction.as_mut())?;
    api::properties_set_big_int_value(fee, "gas_price", "20000000000")?;
    let source = api::transaction_add_source(transaction.as_mut())?;
    api::properties_set_big_int_value(source, "amount", "1000000000000000000")?;
    let destination = api::transaction_add_destination(transaction.as_mut())?;
    api::properties_set_string_value(
        destination,
        "address",
        "54f46318d8f83c28b719ccf01ab4628e1e8f65fa",
    )?;
    api::properties_set_big_int_value(destination, "amount", "100000000000000000")?;

    let serialized = api::transaction_serialize(transaction.as_mut())?;
    println!(
        "Total fee: {}",
        api::transaction_get_total_fee(transaction.as_ref())?
    );
    println!("Signed transaction: 0x{}", hex::encode(serialized));

    Ok(())
}
