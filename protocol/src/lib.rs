// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Account Link: Core Library
//!
//! Account-link proofs bind a blockchain account to a decentralized
//! identifier. The account signs a fixed consent message naming the DID;
//! anyone holding the resulting proof can later check that signature
//! without talking to the signer.
//!
//! ```text
//!  create:   did + account ──► Dispatcher ──► ChainAdapter ──► signer ──► LinkProofV2
//!  validate: LinkProof ──► Dispatcher ──► ChainAdapter (migrates v1) ──► verifier
//!                                     └──► DID extraction ──► LinkProofV2 { did }
//! ```
//!
//! ## Modules
//!
//! - **account**: CAIP-2 chain ids and CAIP-10 account ids.
//! - **consent**: The exact message text that gets signed.
//! - **proof**: The v1/v2 proof encodings and the v1 → v2 migration.
//! - **adapter**: The contract every chain implementation satisfies.
//! - **chains**: Ethereum, Filecoin, EOSIO and Polkadot adapters.
//! - **dispatcher**: Namespace routing and the public create/validate/authenticate API.
//! - **did**: Pulling the DID back out of a verified message.
//! - **provider**: The signing-provider capability families.
//! - **rpc**: Ethereum JSON-RPC envelope.
//! - **crypto**: Keccak/SHA-256 and Ethereum signer recovery.
//! - **config**: Protocol constants.
//! - **testing**: Local wallets and verifiers (feature `test-utils`).
//!
//! ## Failure model
//!
//! A proof whose signature does not check out is `Ok(None)`, an ordinary
//! answer. A request that cannot be answered (unknown namespace, malformed
//! account, provider signing as someone else) is a [`LinkError`].

pub mod account;
pub mod adapter;
pub mod chains;
pub mod config;
pub mod consent;
pub mod crypto;
pub mod did;
pub mod dispatcher;
pub mod error;
pub mod proof;
pub mod provider;
pub mod rpc;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use account::{AccountId, AccountIdError, ChainId, IntoAccountId};
pub use adapter::{ChainAdapter, LinkOptions};
pub use consent::ConsentMessage;
pub use did::extract_did;
pub use dispatcher::{LinkDispatcher, LinkDispatcherBuilder};
pub use error::{ErrorClass, LinkError};
pub use proof::{migrate, LinkProof, LinkProofV1, LinkProofV2, ProofError, ProofKind};
pub use provider::{ProviderError, ProviderKind, SigningProvider};
