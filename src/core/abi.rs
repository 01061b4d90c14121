//! Minimal ABI encoding for TRC-20 calls

use crate::crypto::{function_selector, Address};

pub const TRANSFER_SIGNATURE: &str = "transfer(address,uint256)";
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";

/// ABI-encoded `(address, uint256)` arguments of `transfer`, as hex
pub fn transfer_parameter(to: &Address, amount: u64) -> String {
    format!("{}{:064x}", to.abi_word_hex(), amount)
}

/// Full call data: selector followed by the encoded arguments
pub fn transfer_call_data(to: &Address, amount: u64) -> Vec<u8> {
    let mut data = function_selector(TRANSFER_SIGNATURE).to_vec();
    let mut args = [0u8; 64];
    args[12..32].copy_from_slice(&to.as_bytes()[1..]);
    args[56..].copy_from_slice(&amount.to_be_bytes());
    data.extend_from_slice(&args);
    data
}

pub fn balance_of_parameter(holder: &Address) -> String {
    holder.abi_word_hex()
}

/// Decode a uint256 return word; `None` if it does not fit in 128 bits
pub fn decode_uint(word: &[u8]) -> Option<u128> {
    if word.len() != 32 || word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_parameter_layout() {
        let to: Address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
        let parameter = transfer_parameter(&to, 1_000_000);
        assert_eq!(parameter.len(), 128);
        assert_eq!(
            &parameter[..64],
            "000000000000000000000000a614f803b6fd780986a42c78ec9c7f77e6ded13c"
        );
        assert!(parameter.ends_with("0f4240"));

        let data = transfer_call_data(&to, 1_000_000);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert_eq!(hex::encode(&data[4..]), parameter);
    }

    #[test]
    fn test_decode_uint() {
        let mut word = [0u8; 32];
        word[29] = 0x0f;
        word[30] = 0x42;
        word[31] = 0x40;
        assert_eq!(decode_uint(&word), Some(1_000_000));

        word[0] = 1;
        assert_eq!(decode_uint(&word), None);
        assert_eq!(decode_uint(&[0u8; 31]), None);
    }
}
