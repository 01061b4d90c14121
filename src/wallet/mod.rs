//! Wallet module for participant key management

pub mod wallet;

pub use wallet::{Wallet, WalletError, WalletInfo};
