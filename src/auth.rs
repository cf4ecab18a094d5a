//! Authentication support for HTTP requests

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::{Error, Result};

/// Name of the header carrying the encoded token
pub const AUTH_HEADER: &str = "Authorization";

/// An account known to the platform's account manager
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account {
    /// Account name, usually the user's login
    pub name: String,
    /// Account type identifying the authenticator
    pub account_type: String,
}

impl Account {
    /// Create an account handle
    pub fn new(name: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type: account_type.into(),
        }
    }
}

/// Source of account-derived tokens.
///
/// Mirrors a platform account manager: the call blocks until the authenticator returns
/// a token or fails.
pub trait CredentialProvider: Send + Sync {
    /// Fetch a token of `token_type` for `account`
    fn blocking_get_auth_token(&self, account: &Account, token_type: &str) -> Result<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn(&Account, &str) -> Result<String> + Send + Sync,
{
    fn blocking_get_auth_token(&self, account: &Account, token_type: &str) -> Result<String> {
        self(account, token_type)
    }
}

/// Authentication attached to a request.
///
/// The `Authorization` header value is the URL-safe, unpadded base64 encoding of the
/// raw token. There is no `Bearer`/`Basic` scheme prefix; servers expecting this
/// convention decode the header value directly.
///
/// # Examples
///
/// ```rust
/// use uplink::Auth;
///
/// let auth = Auth::token("secret?");
/// assert_eq!(auth.to_header_value(), "c2VjcmV0Pw");
/// ```
#[derive(Clone)]
pub enum Auth {
    /// Raw token supplied by the caller
    Token {
        /// Token before encoding
        token: String,
    },
}

impl Auth {
    /// Authenticate with a raw token
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    /// Authenticate with a token obtained from the account manager.
    ///
    /// Provider failures are returned as [`Error::Authentication`] instead of sending the
    /// request without credentials.
    pub fn from_account(
        provider: &dyn CredentialProvider,
        account: &Account,
        token_type: &str,
    ) -> Result<Self> {
        let token = provider
            .blocking_get_auth_token(account, token_type)
            .map_err(|e| match e {
                Error::Authentication { .. } => e,
                other => Error::Authentication {
                    message: other.to_string(),
                },
            })?;

        tracing::debug!(account = %account.name, token_type, "obtained account token");
        Ok(Self::token(token))
    }

    /// Value for the `Authorization` header
    pub fn to_header_value(&self) -> String {
        match self {
            Auth::Token { token } => URL_SAFE_NO_PAD.encode(token.as_bytes()),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
        }
    }
}

impl fmt::Display for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Token { .. } => write!(f, "Token authentication"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_header_is_urlsafe_without_padding() {
        // "??>" encodes to "Pz8+" in the standard alphabet
        assert_eq!(Auth::token("??>").to_header_value(), "Pz8-");
        assert_eq!(Auth::token("test").to_header_value(), "dGVzdA");
        assert_eq!(Auth::token("user:pass").to_header_value(), "dXNlcjpwYXNz");
    }

    #[test]
    fn test_account_token() {
        let provider = |account: &Account, token_type: &str| -> Result<String> {
            Ok(format!("{}:{}", account.name, token_type))
        };
        let account = Account::new("brett", "com.example");

        let auth = Auth::from_account(&provider, &account, "full").unwrap();
        assert_eq!(auth.to_header_value(), URL_SAFE_NO_PAD.encode("brett:full"));
    }

    #[test]
    fn test_account_failure_is_reported() {
        let provider = |_: &Account, _: &str| -> Result<String> {
            Err(Error::Network {
                message: "authenticator unreachable".to_string(),
            })
        };
        let account = Account::new("brett", "com.example");

        let error = Auth::from_account(&provider, &account, "full").unwrap_err();
        assert!(matches!(error, Error::Authentication { .. }));
        assert!(error.to_string().contains("authenticator unreachable"));
    }

    #[test]
    fn test_debug_hides_token() {
        let auth = Auth::token("super-secret");
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }
}
