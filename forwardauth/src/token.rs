//! Parsed bearer credentials
//!
//! Signature and expiry verification happen before a token reaches this
//! crate. By the time a [`Token`] is built, the caller has already decided
//! whether the credential is a verified JWT, something opaque, or garbage.
//!
//! ```
//! use forwardauth::token::{Claims, Token};
//!
//! let token = Token::jwt(
//!     Claims::new()
//!         .with_subject("auth0|u1")
//!         .with_permissions(["read:data"]),
//! );
//!
//! let claims = token.as_jwt().unwrap();
//! assert_eq!(claims.subject().unwrap().as_str(), "auth0|u1");
//! assert!(claims.has_permissions_claim());
//! ```

use std::fmt;

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::permission::Permissions;

const SUBJECT_CLAIM: &str = "sub";
const PERMISSIONS_CLAIM: &str = "permissions";
const NONCE_CLAIM: &str = "nonce";

/// The subject of a token
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A bearer credential carrying no locally inspectable claims
///
/// To prevent unintentional disclosure, neither [`Debug`][OpaqueTokenRef#impl-Debug]
/// nor [`Display`][OpaqueTokenRef#impl-Display] print the value unless the
/// alternate flag is given, i.e. `{:#?}` or `{:#}`.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ref_doc = "A borrowed reference to an [`OpaqueToken`]"
)]
pub struct OpaqueToken;

impl fmt::Debug for OpaqueTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str("\"")?;
            limited_reveal(self.as_str(), &mut *f, 5)?;
            f.write_str("\"")
        } else {
            f.write_str("***OPAQUE TOKEN***")
        }
    }
}

impl fmt::Display for OpaqueTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            limited_reveal(self.as_str(), &mut *f, usize::MAX)
        } else {
            f.write_str("***OPAQUE TOKEN***")
        }
    }
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// The claims of a validly-parsed JWT
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// An empty claim set
    #[inline]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets an arbitrary claim
    #[inline]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Sets the `sub` claim
    #[inline]
    pub fn with_subject(self, sub: impl Into<String>) -> Self {
        self.with_claim(SUBJECT_CLAIM, sub.into())
    }

    /// Sets the `permissions` claim to a JSON array of the given values
    pub fn with_permissions<I, P>(self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let values: Vec<Value> = permissions
            .into_iter()
            .map(|p| Value::String(p.into()))
            .collect();
        self.with_claim(PERMISSIONS_CLAIM, values)
    }

    /// Sets the `nonce` claim
    #[inline]
    pub fn with_nonce(self, nonce: impl Into<String>) -> Self {
        self.with_claim(NONCE_CLAIM, nonce.into())
    }

    /// Whether a claim with the given name is present, whatever its value
    #[inline]
    #[must_use]
    pub fn has_claim(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The raw value of a claim
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the token carries a `permissions` claim at all
    #[inline]
    #[must_use]
    pub fn has_permissions_claim(&self) -> bool {
        self.has_claim(PERMISSIONS_CLAIM)
    }

    /// The permissions granted by the `permissions` claim
    ///
    /// Accepts a JSON array of strings or a single whitespace-delimited
    /// string. Non-string array entries are ignored.
    pub fn permissions(&self) -> Permissions {
        match self.get(PERMISSIONS_CLAIM) {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => Permissions::from_delimited(s),
            _ => Permissions::empty(),
        }
    }

    /// Whether every permission in `required` is granted
    #[inline]
    #[must_use]
    pub fn has_permission(&self, required: &Permissions) -> bool {
        self.permissions().contains_all(required)
    }

    /// The permissions in `required` that this token does not grant
    #[inline]
    pub fn missing_permissions(&self, required: &Permissions) -> Permissions {
        required.missing_from(&self.permissions())
    }

    /// The `sub` claim, if present as a string
    #[inline]
    #[must_use]
    pub fn subject(&self) -> Option<&SubjectRef> {
        self.get(SUBJECT_CLAIM)
            .and_then(Value::as_str)
            .map(SubjectRef::from_str)
    }

    /// The `nonce` claim, if present as a string
    #[inline]
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get(NONCE_CLAIM).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Claims {
    #[inline]
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The parsed state of a bearer credential
///
/// Claim queries live on [`Claims`], so they can only be reached through
/// the [`Token::Jwt`] variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A JWT that was verified upstream
    Jwt(Claims),
    /// A credential with no verifiable claims
    Opaque(OpaqueToken),
    /// A credential that failed parsing or verification upstream
    Invalid {
        /// Why the credential was rejected
        reason: String,
    },
}

impl Token {
    /// A verified JWT with the given claims
    #[inline]
    pub fn jwt(claims: impl Into<Claims>) -> Self {
        Self::Jwt(claims.into())
    }

    /// An opaque credential
    #[inline]
    pub fn opaque(raw: impl Into<String>) -> Self {
        Self::Opaque(OpaqueToken::new(raw.into()))
    }

    /// A credential that was rejected upstream
    #[inline]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// The JWT claims, if this is a JWT
    #[inline]
    #[must_use]
    pub fn as_jwt(&self) -> Option<&Claims> {
        match self {
            Self::Jwt(claims) => Some(claims),
            _ => None,
        }
    }

    /// Whether this is a JWT
    #[inline]
    #[must_use]
    pub fn is_jwt(&self) -> bool {
        matches!(self, Self::Jwt(_))
    }
}
