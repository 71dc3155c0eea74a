//! Registration access tokens for dynamically registered clients.
//!
//! The plaintext token is handed to the client exactly once. Only an
//! HMAC-SHA256 signature keyed by a server secret is persisted, so a leaked
//! database does not yield usable tokens.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::oauth::types::generate_token;

type HmacSha256 = Hmac<Sha256>;

/// Freshly minted registration access token and its stored signature
#[derive(Debug, Clone)]
pub struct IssuedRegistrationToken {
    pub token: String,
    pub signature: String,
}

/// Issues and verifies registration access tokens.
#[derive(Clone)]
pub struct RegistrationTokenSigner {
    secret: Vec<u8>,
}

impl RegistrationTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mint a new opaque token.
    pub fn issue(&self) -> IssuedRegistrationToken {
        let token = generate_token();
        let signature = self.sign(&token);
        IssuedRegistrationToken { token, signature }
    }

    /// Signature persisted alongside the client for `token`.
    pub fn sign(&self, token: &str) -> String {
        // HMAC accepts keys of any length.
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(token.as_bytes());
        BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of `token` against a stored signature.
    pub fn verify(&self, token: &str, stored_signature: &str) -> bool {
        if stored_signature.is_empty() {
            return false;
        }
        let expected = self.sign(token);
        if expected.is_empty() {
            return false;
        }
        expected.as_bytes().ct_eq(stored_signature.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let signer = RegistrationTokenSigner::new("server-secret");
        let issued = signer.issue();

        assert_ne!(issued.token, issued.signature);
        assert!(signer.verify(&issued.token, &issued.signature));
        assert!(!signer.verify("guessed-token", &issued.signature));
    }

    #[test]
    fn test_signature_bound_to_key() {
        let issued = RegistrationTokenSigner::new("key-one").issue();
        let other = RegistrationTokenSigner::new("key-two");
        assert!(!other.verify(&issued.token, &issued.signature));
    }

    #[test]
    fn test_empty_signature_never_verifies() {
        let signer = RegistrationTokenSigner::new("server-secret");
        assert!(!signer.verify("", ""));
        assert!(!signer.verify(&signer.issue().token, ""));
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = RegistrationTokenSigner::new("server-secret");
        let first = signer.issue();
        let second = signer.issue();
        assert_ne!(first.token, second.token);
        assert!(!signer.verify(&first.token, &second.signature));
    }
}
