//! Unsigned native SOL transfer construction.
//!
//! Pure and deterministic: identical inputs always produce identical bytes.
//! The encoded form is a legacy wire transaction whose signature slots are
//! zero-filled, ready to be handed to a wallet signer:
//!
//! ```text
//! num_signatures   compact-u16
//! signatures       64 bytes * num_signatures (zeroed)
//! message          legacy message bytes
//! ```

use solana_sdk::{hash::Hash, message::Message, pubkey::Pubkey, system_instruction};
use std::str::FromStr;

use crate::chain::rpc::LatestBlockhash;
use crate::error::{ClientError, Result};
use crate::purchase::types::PurchaseIntent;
use crate::types::sol_to_lamports;

pub const SIGNATURE_LEN: usize = 64;

/// Encode a `u16` in Solana's compact-u16 format.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);
    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }
    out
}

/// Decode a compact-u16, returning the value and the number of bytes read.
pub fn decode_compact_u16(bytes: &[u8]) -> Option<(u16, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return u16::try_from(value).ok().map(|v| (v, i + 1));
        }
    }
    None
}

/// A transfer ready for signing. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransfer {
    pub fee_payer: Pubkey,
    pub destination: Pubkey,
    pub lamports: u64,
    pub recent_blockhash: Hash,
    pub last_valid_block_height: u64,
    message: Message,
}

impl UnsignedTransfer {
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Serialized message; this is what the fee payer signs.
    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.serialize()
    }

    /// Full wire transaction with zeroed signature slots.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let num_signatures = self.message.header.num_required_signatures;
        let message_bytes = self.message_bytes();
        let mut out = encode_compact_u16(num_signatures as u16);
        out.reserve(num_signatures as usize * SIGNATURE_LEN + message_bytes.len());
        out.extend(std::iter::repeat(0u8).take(num_signatures as usize * SIGNATURE_LEN));
        out.extend_from_slice(&message_bytes);
        out
    }
}

/// Builds System Program transfers. No I/O.
pub struct WalletTransactionBuilder;

impl WalletTransactionBuilder {
    pub fn build(
        fee_payer: &str,
        destination: &str,
        lamports: u64,
        recent_blockhash: &str,
        last_valid_block_height: u64,
    ) -> Result<UnsignedTransfer> {
        let fee_payer = parse_address(fee_payer, "fee payer")?;
        let destination = parse_address(destination, "destination")?;
        if lamports == 0 {
            return Err(ClientError::TransactionBuild(
                "lamports must be > 0".to_string(),
            ));
        }
        if recent_blockhash.trim().is_empty() {
            return Err(ClientError::TransactionBuild(
                "missing recent blockhash".to_string(),
            ));
        }
        let recent_blockhash = Hash::from_str(recent_blockhash).map_err(|e| {
            ClientError::TransactionBuild(format!("invalid blockhash {recent_blockhash}: {e}"))
        })?;

        let instruction = system_instruction::transfer(&fee_payer, &destination, lamports);
        let message = Message::new_with_blockhash(&[instruction], Some(&fee_payer), &recent_blockhash);

        Ok(UnsignedTransfer {
            fee_payer,
            destination,
            lamports,
            recent_blockhash,
            last_valid_block_height,
            message,
        })
    }

    /// Transfer of `intent.amount_sol` from `fee_payer` to the intent's deposit address.
    pub fn build_for_intent(
        intent: &PurchaseIntent,
        fee_payer: &str,
        blockhash: &LatestBlockhash,
    ) -> Result<UnsignedTransfer> {
        if !intent.amount_sol.is_finite() || intent.amount_sol <= 0.0 {
            return Err(ClientError::TransactionBuild(format!(
                "intent amount must be positive, got {}",
                intent.amount_sol
            )));
        }
        Self::build(
            fee_payer,
            &intent.deposit_address,
            sol_to_lamports(intent.amount_sol),
            &blockhash.blockhash,
            blockhash.last_valid_block_height,
        )
    }
}

fn parse_address(address: &str, role: &str) -> Result<Pubkey> {
    Pubkey::from_str(address.trim())
        .map_err(|e| ClientError::InvalidAddress(format!("{role} {address:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LAMPORTS_PER_SOL;

    fn blockhash() -> String {
        Hash::new_from_array([7u8; 32]).to_string()
    }

    fn addresses() -> (String, String) {
        (
            Pubkey::new_from_array([1u8; 32]).to_string(),
            Pubkey::new_from_array([2u8; 32]).to_string(),
        )
    }

    #[test]
    fn test_compact_u16_round_trip_boundaries() {
        for value in [0u16, 1, 0x7f, 0x80, 0x3fff, 0x4000, u16::MAX] {
            let encoded = encode_compact_u16(value);
            assert_eq!(decode_compact_u16(&encoded), Some((value, encoded.len())));
        }
        assert_eq!(encode_compact_u16(0x80), vec![0x80, 0x01]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let (payer, dest) = addresses();
        let a = WalletTransactionBuilder::build(&payer, &dest, 1_500_000_000, &blockhash(), 100).unwrap();
        let b = WalletTransactionBuilder::build(&payer, &dest, 1_500_000_000, &blockhash(), 100).unwrap();
        assert_eq!(a.wire_bytes(), b.wire_bytes());
        assert_eq!(a, b);
    }

    #[test]
    fn test_wire_layout() {
        let (payer, dest) = addresses();
        let transfer = WalletTransactionBuilder::build(&payer, &dest, 42, &blockhash(), 7).unwrap();
        let wire = transfer.wire_bytes();

        assert_eq!(wire[0], 1);
        assert!(wire[1..1 + SIGNATURE_LEN].iter().all(|b| *b == 0));
        assert_eq!(&wire[1 + SIGNATURE_LEN..], transfer.message_bytes().as_slice());
        assert_eq!(transfer.message().account_keys[0], transfer.fee_payer);
        assert_eq!(transfer.last_valid_block_height, 7);
    }

    #[test]
    fn test_different_amounts_change_bytes() {
        let (payer, dest) = addresses();
        let a = WalletTransactionBuilder::build(&payer, &dest, 1, &blockhash(), 1).unwrap();
        let b = WalletTransactionBuilder::build(&payer, &dest, 2, &blockhash(), 1).unwrap();
        assert_ne!(a.wire_bytes(), b.wire_bytes());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let (payer, dest) = addresses();
        assert!(matches!(
            WalletTransactionBuilder::build("not-an-address", &dest, 1, &blockhash(), 1),
            Err(ClientError::InvalidAddress(_))
        ));
        assert!(matches!(
            WalletTransactionBuilder::build(&payer, "0OIl", 1, &blockhash(), 1),
            Err(ClientError::InvalidAddress(_))
        ));
        assert!(matches!(
            WalletTransactionBuilder::build(&payer, &dest, 0, &blockhash(), 1),
            Err(ClientError::TransactionBuild(_))
        ));
        assert!(matches!(
            WalletTransactionBuilder::build(&payer, &dest, 1, "", 1),
            Err(ClientError::TransactionBuild(_))
        ));
        assert!(matches!(
            WalletTransactionBuilder::build(&payer, &dest, 1, "xyz", 1),
            Err(ClientError::TransactionBuild(_))
        ));
    }

    #[test]
    fn test_build_for_intent_converts_to_lamports() {
        let (payer, dest) = addresses();
        let intent = PurchaseIntent {
            iro_id: "iro-1".into(),
            deposit_address: dest,
            amount_sol: 2.5,
            estimated_tokens: "5".into(),
        };
        let latest = LatestBlockhash {
            blockhash: blockhash(),
            last_valid_block_height: 99,
        };
        let transfer = WalletTransactionBuilder::build_for_intent(&intent, &payer, &latest).unwrap();
        assert_eq!(transfer.lamports, 5 * LAMPORTS_PER_SOL / 2);
        assert_eq!(transfer.last_valid_block_height, 99);
    }
}
