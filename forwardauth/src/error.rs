//! Authorization failures
//!
//! None of these are returned through `Err` from [`Authorizer::authorize`][crate::Authorizer::authorize].
//! Each one is a recorded reason for a terminal decision, read back from the
//! [`AuthorizerResult`][crate::AuthorizerResult]. The `Display` output is the
//! diagnostic message handed to the calling layer.

use thiserror::Error;

use crate::{
    fsm::{Event, Mode, State},
    permission::MissingPermissions,
};

/// Why an authorization run ended in a failure state
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The access token is opaque and cannot be inspected
    #[error("Opaque Access Tokens is not supported.")]
    UnsupportedTokenType,

    /// The application requires permissions but the access token has no
    /// permissions claim at all
    #[error("Missing permissions claim in access token. In Auth0, Add Permissions in the Access Token.")]
    MissingPermissionsClaim,

    /// The access token lacks some of the required permissions
    #[error(transparent)]
    InsufficientPermissions(#[from] MissingPermissions),

    /// The access token and ID token name different subjects
    #[error("Access token and ID token subjects do not match.")]
    SubjectMismatch,

    /// The ID token nonce does not match the nonce issued with the sign-in redirect
    #[error("ID token nonce does not match the expected nonce.")]
    NonceMismatch,

    /// A token was rejected before reaching the authorizer
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// Why the token was rejected
        reason: String,
    },
}

impl AuthorizationError {
    /// Whether the failure came from the permission check
    #[must_use]
    pub fn is_permission_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingPermissionsClaim | Self::InsufficientPermissions(_)
        )
    }
}

/// An event was posted in a state that has no transition for it
///
/// This is a broken contract between a delegate and the transition table,
/// never the outcome of a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("event {event} has no transition from state {state} in {mode} mode")]
pub struct IllegalTransition {
    pub(crate) mode: Mode,
    pub(crate) state: State,
    pub(crate) event: Event,
}

impl IllegalTransition {
    /// The state the engine was in
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The event that was posted
    #[inline]
    #[must_use]
    pub fn event(&self) -> Event {
        self.event
    }
}

/// A requested URL could not be built from its parts
#[derive(Debug, Error)]
pub enum InvalidRequestedUrl {
    /// The URL could not be parsed
    #[error("malformed requested URL")]
    Malformed(#[from] url::ParseError),

    /// The URL has no host component
    #[error("requested URL has no host")]
    MissingHost,
}
