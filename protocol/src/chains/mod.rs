//! # Chain Adapters
//!
//! One module per supported namespace:
//!
//! - **ethereum**: `eip155`, key-controlled and ERC-1271 contract wallets.
//! - **filecoin**: `fil`, consent embedded in a zero-value self-transfer.
//! - **eosio**: `eosio`, arbitrary-data signatures bound to account and chain.
//! - **polkadot**: `polkadot`, raw-payload signatures over the hex message.
//!
//! Only the Ethereum adapter does its own cryptography. The others hand the
//! signature to an injected verifier trait, implemented by whatever chain
//! SDK the embedding application uses.

pub mod eosio;
pub mod ethereum;
pub mod filecoin;
pub mod polkadot;

pub use eosio::{EosioAdapter, EosioVerifier};
pub use ethereum::{EthereumAdapter, NetworkResolver};
pub use filecoin::{FilecoinAdapter, FilecoinMessage, FilecoinSignature, FilecoinVerifier};
pub use polkadot::{PolkadotAdapter, PolkadotVerifier};

use tracing::{debug, warn};

use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2, ProofKind};
use crate::provider::ProviderError;

/// Unwrap a proof for an adapter that only knows one v2 sub-kind.
///
/// Legacy proofs are Ethereum by definition, so anything v1 reaching a
/// non-Ethereum adapter does not verify.
pub(crate) fn expect_current(
    proof: LinkProof,
    namespace: &str,
    kind: ProofKind,
) -> Result<Option<LinkProofV2>, LinkError> {
    match proof {
        LinkProof::V1(_) => {
            debug!(namespace, "legacy proof outside eip155, not verified");
            Ok(None)
        }
        LinkProof::V2(current) if current.kind != kind => Err(LinkError::UnsupportedType {
            namespace: namespace.to_string(),
            kind: current.kind.to_string(),
        }),
        LinkProof::V2(current) => Ok(Some(current)),
    }
}

/// Turn a verifier's answer into a validation result.
pub(crate) fn verdict(
    answer: Result<bool, ProviderError>,
    proof: LinkProofV2,
) -> Option<LinkProofV2> {
    match answer {
        Ok(true) => Some(proof),
        Ok(false) => {
            debug!(account = %proof.account, "signature rejected");
            None
        }
        Err(err) => {
            warn!(%err, account = %proof.account, "verification backend failed");
            None
        }
    }
}
