//! # DID Extraction
//!
//! Pulls the linked DID back out of a verified consent message. Recognized
//! forms are `did:3:<id>` and `did:muport:<id>`, where `<id>` starts with an
//! ASCII letter or digit and runs for at least two word characters
//! (`[A-Za-z0-9_]`). The first match wins.
//!
//! Extraction is best-effort. A message without a recognizable DID yields
//! `None`; it never turns a verified signature into a failure.

use crate::config::RECOGNIZED_DID_METHODS;

const DID_SCHEME: &str = "did:";

/// Return the first recognizable DID in `message`.
///
/// ```
/// use account_link::did::extract_did;
///
/// let message = "Create a new account link to your identity.\n\ndid:3:bafysdfwefwe";
/// assert_eq!(extract_did(message), Some("did:3:bafysdfwefwe"));
/// assert_eq!(extract_did("no identity here"), None);
/// ```
pub fn extract_did(message: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(offset) = message[from..].find(DID_SCHEME) {
        let start = from + offset;
        if let Some(end) = match_at(message, start) {
            return Some(&message[start..end]);
        }
        from = start + DID_SCHEME.len();
    }
    None
}

/// End index of a DID starting at `start`, if one starts there.
fn match_at(message: &str, start: usize) -> Option<usize> {
    let rest = &message[start + DID_SCHEME.len()..];
    RECOGNIZED_DID_METHODS.iter().find_map(|method| {
        let id = rest.strip_prefix(method)?.strip_prefix(':')?.as_bytes();
        if !id.first().is_some_and(u8::is_ascii_alphanumeric) {
            return None;
        }
        let tail = id[1..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
        (tail > 0).then(|| start + DID_SCHEME.len() + method.len() + 1 + 1 + tail)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_consent() {
        let message = "Create a new account link to your identity.\n\ndid:3:bafysdfwefwe \nTimestamp: 1";
        assert_eq!(extract_did(message), Some("did:3:bafysdfwefwe"));
    }

    #[test]
    fn test_muport() {
        assert_eq!(
            extract_did("link did:muport:QmRhjfL4HLdB8LovGf1o43NJ8QnbfqmpdnTuBvZTewnuBV please"),
            Some("did:muport:QmRhjfL4HLdB8LovGf1o43NJ8QnbfqmpdnTuBvZTewnuBV")
        );
    }

    #[test]
    fn test_unrecognized_method() {
        assert_eq!(extract_did("did:key:z6Mkabc"), None);
        assert_eq!(extract_did("did:web:example.com"), None);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            extract_did("did:key:zzz then did:3:first and did:3:second"),
            Some("did:3:first")
        );
    }

    #[test]
    fn test_id_must_have_two_chars() {
        assert_eq!(extract_did("did:3:a"), None);
        assert_eq!(extract_did("did:3:ab"), Some("did:3:ab"));
        assert_eq!(extract_did("did:3:_ab"), None);
    }

    #[test]
    fn test_stops_at_non_word() {
        assert_eq!(extract_did("did:3:abc-def"), Some("did:3:abc"));
        assert_eq!(extract_did("did:3:abc_def"), Some("did:3:abc_def"));
    }

    #[test]
    fn test_non_ascii_around_did() {
        assert_eq!(extract_did("✓ did:3:bafy ✓"), Some("did:3:bafy"));
    }
}
