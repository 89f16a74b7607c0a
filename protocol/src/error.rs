//! Error types for account-link operations.
//!
//! [`LinkError`] covers everything that is wrong with the *request*: an
//! unsupported namespace or proof type, a malformed account or proof, a
//! provider that answered for someone else. A proof whose signature simply
//! does not verify is not an error; validation returns `Ok(None)` for it.

use thiserror::Error;

use crate::account::AccountIdError;
use crate::proof::ProofError;
use crate::provider::{ProviderError, ProviderKind};

/// How a caller should surface a [`LinkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller asked an impossible question.
    BadRequest,
    /// A provider or verification backend failed.
    Upstream,
}

/// Errors from creating, validating or authenticating account links.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No adapter is registered for the namespace.
    #[error("namespace '{namespace}' is not supported")]
    UnsupportedNamespace { namespace: String },

    /// The adapter does not implement this proof sub-kind.
    #[error("proof type '{kind}' is not supported by namespace '{namespace}'")]
    UnsupportedType { namespace: String, kind: String },

    /// The provider signed as, or sits on, a different account or chain
    /// than the one requested.
    #[error("provider returned {returned}, requested {expected}")]
    ProviderMismatch { expected: String, returned: String },

    /// The adapter finished without producing a proof.
    #[error("unable to create proof with namespace '{namespace}'")]
    ProofCreationFailed { namespace: String },

    /// The provider is of the wrong capability family for the adapter.
    #[error("adapter requires a {expected} provider, got {actual}")]
    ProviderKindMismatch {
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error(transparent)]
    InvalidAccount(#[from] AccountIdError),

    #[error(transparent)]
    MalformedProof(#[from] ProofError),

    /// Input that is syntactically an account or message but unusable for
    /// the chain, e.g. a non-hex Ethereum address.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl LinkError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Provider(_) => ErrorClass::Upstream,
            _ => ErrorClass::BadRequest,
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, returned: impl Into<String>) -> Self {
        Self::ProviderMismatch {
            expected: expected.into(),
            returned: returned.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(
            LinkError::UnsupportedNamespace {
                namespace: "cosmos".into()
            }
            .class(),
            ErrorClass::BadRequest
        );
        assert_eq!(
            LinkError::mismatch("0xa", "0xb").class(),
            ErrorClass::BadRequest
        );
        assert_eq!(
            LinkError::from(ProofError::MissingAddress).class(),
            ErrorClass::BadRequest
        );
        assert_eq!(
            LinkError::from(ProviderError::Transport("refused".into())).class(),
            ErrorClass::Upstream
        );
    }

    #[test]
    fn test_messages_name_the_namespace() {
        let err = LinkError::UnsupportedNamespace {
            namespace: "cosmos".into(),
        };
        assert!(err.to_string().contains("cosmos"));

        let err = LinkError::ProviderKindMismatch {
            expected: ProviderKind::JsonRpc,
            actual: ProviderKind::RawPayload,
        };
        assert_eq!(
            err.to_string(),
            "adapter requires a json-rpc provider, got raw-payload"
        );
    }
}
