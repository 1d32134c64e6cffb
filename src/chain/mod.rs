//! Solana-facing pieces: transfer construction, RPC queries, signing and
//! wallet activity.

pub mod activity;
pub mod rpc;
pub mod signer;
pub mod transaction_builder;

pub use activity::{recent_activity, ActivityEntry, WalletActivity};
pub use rpc::{ChainRpc, LatestBlockhash, SolanaRpc};
pub use signer::{encode_signature, KeypairWallet, SignOutput, SignRequest, WalletSigner};
pub use transaction_builder::{UnsignedTransfer, WalletTransactionBuilder};
