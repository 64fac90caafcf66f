//! The authorization decision engine
//!
//! The engine is a transition table plus a driver. It owns no business data.
//! Entering a state hands control to a [`Delegate`], which evaluates that
//! state's guard and answers with the next event to post. The driver keeps
//! posting until a terminal state is entered.
//!
//! ```
//! use forwardauth::{fsm::transition, Event, Mode, State};
//!
//! assert_eq!(
//!     transition(Mode::Api, State::ValidatingPermissions, Event::ValidPermissions),
//!     Some(State::AccessGranted),
//! );
//! assert_eq!(
//!     transition(Mode::Oidc, State::ValidatingPermissions, Event::ValidPermissions),
//!     Some(State::ValidatingSameSubject),
//! );
//! assert_eq!(transition(Mode::Api, State::AccessGranted, Event::Error), None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthorizationError, IllegalTransition},
    result::AuthorizerResult,
};

/// Which optional branches of the decision graph are active
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// An API call carrying an access token alone
    #[default]
    Api,
    /// A browser request carrying an access token and an ID token
    Oidc,
}

impl Mode {
    /// The lowercase name of the mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Oidc => "oidc",
        }
    }
}

impl fmt::Display for Mode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state of the decision engine
///
/// Variants are declared in the order a run visits them, so every legal
/// transition moves to a strictly greater state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Nothing has been evaluated yet
    Start,
    /// Routing into URL classification
    ValidatingRequestedUrl,
    /// Checking the URL against the sign-in redirect URI
    ValidatingWhitelistedUrl,
    /// Checking the HTTP method against the restricted set
    ValidatingRestrictedMethod,
    /// Routing into token validation
    ValidatingTokens,
    /// Checking the ID token nonce (OIDC only)
    ValidatingNonce,
    /// Checking the access token variant
    ValidatingAccessToken,
    /// Checking the ID token variant (OIDC only)
    ValidatingIdToken,
    /// Checking granted permissions against required permissions
    ValidatingPermissions,
    /// Checking that both tokens name the same subject (OIDC only)
    ValidatingSameSubject,
    /// Terminal: the client must sign in
    NeedRedirect,
    /// Terminal: a token was rejected
    InvalidToken,
    /// Terminal: the request could not be evaluated
    Error,
    /// Terminal: the request may proceed
    AccessGranted,
    /// Terminal: the request is forbidden
    AccessDenied,
}

impl State {
    /// Every state, in visiting order
    pub const ALL: [State; 15] = [
        Self::Start,
        Self::ValidatingRequestedUrl,
        Self::ValidatingWhitelistedUrl,
        Self::ValidatingRestrictedMethod,
        Self::ValidatingTokens,
        Self::ValidatingNonce,
        Self::ValidatingAccessToken,
        Self::ValidatingIdToken,
        Self::ValidatingPermissions,
        Self::ValidatingSameSubject,
        Self::NeedRedirect,
        Self::InvalidToken,
        Self::Error,
        Self::AccessGranted,
        Self::AccessDenied,
    ];

    /// Whether a run ends on entering this state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NeedRedirect
                | Self::InvalidToken
                | Self::Error
                | Self::AccessGranted
                | Self::AccessDenied
        )
    }

    /// The conventional upper snake case name of the state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::ValidatingRequestedUrl => "VALIDATING_REQUESTED_URL",
            Self::ValidatingWhitelistedUrl => "VALIDATING_WHITELISTED_URL",
            Self::ValidatingRestrictedMethod => "VALIDATING_RESTRICTED_METHOD",
            Self::ValidatingTokens => "VALIDATING_TOKENS",
            Self::ValidatingNonce => "VALIDATING_NONCE",
            Self::ValidatingAccessToken => "VALIDATING_ACCESS_TOKEN",
            Self::ValidatingIdToken => "VALIDATING_ID_TOKEN",
            Self::ValidatingPermissions => "VALIDATING_PERMISSIONS",
            Self::ValidatingSameSubject => "VALIDATING_SAME_SUBJECT",
            Self::NeedRedirect => "NEED_REDIRECT",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Error => "ERROR",
            Self::AccessGranted => "ACCESS_GRANTED",
            Self::AccessDenied => "ACCESS_DENIED",
        }
    }
}

impl fmt::Display for State {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event posted by a delegate
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum Event {
    ValidateRequestedUrl,
    ValidateWhitelistedUrl,
    WhitelistedUrl,
    RestrictedUrl,
    RestrictedMethod,
    UnrestrictedMethod,
    ValidateNonce,
    ValidNonce,
    InvalidNonce,
    ValidateAccessToken,
    ValidAccessToken,
    InvalidAccessToken,
    ValidIdToken,
    InvalidIdToken,
    ValidPermissions,
    InvalidPermissions,
    ValidSameSubs,
    InvalidSameSubs,
    Error,
}

impl Event {
    /// Every event
    pub const ALL: [Event; 19] = [
        Self::ValidateRequestedUrl,
        Self::ValidateWhitelistedUrl,
        Self::WhitelistedUrl,
        Self::RestrictedUrl,
        Self::RestrictedMethod,
        Self::UnrestrictedMethod,
        Self::ValidateNonce,
        Self::ValidNonce,
        Self::InvalidNonce,
        Self::ValidateAccessToken,
        Self::ValidAccessToken,
        Self::InvalidAccessToken,
        Self::ValidIdToken,
        Self::InvalidIdToken,
        Self::ValidPermissions,
        Self::InvalidPermissions,
        Self::ValidSameSubs,
        Self::InvalidSameSubs,
        Self::Error,
    ];

    /// The conventional upper snake case name of the event
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidateRequestedUrl => "VALIDATE_REQUESTED_URL",
            Self::ValidateWhitelistedUrl => "VALIDATE_WHITELISTED_URL",
            Self::WhitelistedUrl => "WHITELISTED_URL",
            Self::RestrictedUrl => "RESTRICTED_URL",
            Self::RestrictedMethod => "RESTRICTED_METHOD",
            Self::UnrestrictedMethod => "UNRESTRICTED_METHOD",
            Self::ValidateNonce => "VALIDATE_NONCE",
            Self::ValidNonce => "VALID_NONCE",
            Self::InvalidNonce => "INVALID_NONCE",
            Self::ValidateAccessToken => "VALIDATE_ACCESS_TOKEN",
            Self::ValidAccessToken => "VALID_ACCESS_TOKEN",
            Self::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            Self::ValidIdToken => "VALID_ID_TOKEN",
            Self::InvalidIdToken => "INVALID_ID_TOKEN",
            Self::ValidPermissions => "VALID_PERMISSIONS",
            Self::InvalidPermissions => "INVALID_PERMISSIONS",
            Self::ValidSameSubs => "VALID_SAME_SUBS",
            Self::InvalidSameSubs => "INVALID_SAME_SUBS",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Event {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state entered when `event` is posted in `from`, if any
///
/// Rows for the nonce, ID token, and same-subject states exist only in
/// [`Mode::Oidc`]. The two branching rows pick their target by mode.
#[must_use]
pub const fn transition(mode: Mode, from: State, event: Event) -> Option<State> {
    use Event as E;
    use State as S;

    let oidc = matches!(mode, Mode::Oidc);

    let to = match (from, event) {
        (S::Start, E::ValidateRequestedUrl) => S::ValidatingRequestedUrl,
        (S::ValidatingRequestedUrl, E::ValidateWhitelistedUrl) => S::ValidatingWhitelistedUrl,
        (S::ValidatingWhitelistedUrl, E::WhitelistedUrl) => S::AccessGranted,
        (S::ValidatingWhitelistedUrl, E::RestrictedUrl) => S::ValidatingRestrictedMethod,
        (S::ValidatingRestrictedMethod, E::RestrictedMethod) => S::NeedRedirect,
        (S::ValidatingRestrictedMethod, E::UnrestrictedMethod) => S::ValidatingTokens,
        (S::ValidatingTokens, E::ValidateAccessToken) => S::ValidatingAccessToken,
        (S::ValidatingTokens, E::ValidateNonce) if oidc => S::ValidatingNonce,
        (S::ValidatingNonce, E::ValidNonce) if oidc => S::ValidatingAccessToken,
        (S::ValidatingNonce, E::InvalidNonce) if oidc => S::InvalidToken,
        (S::ValidatingAccessToken, E::ValidAccessToken) if oidc => S::ValidatingIdToken,
        (S::ValidatingAccessToken, E::ValidAccessToken) => S::ValidatingPermissions,
        (S::ValidatingAccessToken, E::InvalidAccessToken) => S::InvalidToken,
        (S::ValidatingAccessToken, E::Error) => S::Error,
        (S::ValidatingIdToken, E::ValidIdToken) if oidc => S::ValidatingPermissions,
        (S::ValidatingIdToken, E::InvalidIdToken) if oidc => S::InvalidToken,
        (S::ValidatingPermissions, E::ValidPermissions) if oidc => S::ValidatingSameSubject,
        (S::ValidatingPermissions, E::ValidPermissions) => S::AccessGranted,
        (S::ValidatingPermissions, E::InvalidPermissions) => S::AccessDenied,
        (S::ValidatingSameSubject, E::ValidSameSubs) if oidc => S::AccessGranted,
        (S::ValidatingSameSubject, E::InvalidSameSubs) if oidc => S::AccessDenied,
        _ => return None,
    };

    Some(to)
}

/// A delegate's answer on entering a state: the next event, and possibly
/// the reason for a failure
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Posted {
    event: Event,
    error: Option<AuthorizationError>,
}

impl Posted {
    /// Posts `event` with no error
    #[inline]
    pub const fn next(event: Event) -> Self {
        Self { event, error: None }
    }

    /// Posts `event` and records `error` as the reason
    #[inline]
    pub fn failed(event: Event, error: impl Into<AuthorizationError>) -> Self {
        Self {
            event,
            error: Some(error.into()),
        }
    }

    /// The event to post
    #[inline]
    #[must_use]
    pub fn event(&self) -> Event {
        self.event
    }

    /// The recorded failure, if any
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&AuthorizationError> {
        self.error.as_ref()
    }
}

impl From<Event> for Posted {
    #[inline]
    fn from(event: Event) -> Self {
        Self::next(event)
    }
}

/// Guard evaluation for each non-terminal state
///
/// The engine calls exactly one of these on entering a state. Routing
/// states have default implementations. Callbacks for the OIDC-only states
/// are never called in [`Mode::Api`].
pub trait Delegate {
    /// Which branches of the decision graph this delegate drives
    fn mode(&self) -> Mode;

    /// Entered [`State::Start`]
    fn on_start_authorizing(&self) -> Posted {
        Posted::next(Event::ValidateRequestedUrl)
    }

    /// Entered [`State::ValidatingRequestedUrl`]
    fn on_validate_requested_url(&self) -> Posted {
        Posted::next(Event::ValidateWhitelistedUrl)
    }

    /// Entered [`State::ValidatingWhitelistedUrl`]
    fn on_validate_whitelisted_url(&self) -> Posted;

    /// Entered [`State::ValidatingRestrictedMethod`]
    fn on_validate_restricted_method(&self) -> Posted;

    /// Entered [`State::ValidatingTokens`]
    fn on_start_validate_tokens(&self) -> Posted {
        match self.mode() {
            Mode::Api => Posted::next(Event::ValidateAccessToken),
            Mode::Oidc => Posted::next(Event::ValidateNonce),
        }
    }

    /// Entered [`State::ValidatingNonce`]
    fn on_validate_nonce(&self) -> Posted;

    /// Entered [`State::ValidatingAccessToken`]
    fn on_validate_access_token(&self) -> Posted;

    /// Entered [`State::ValidatingIdToken`]
    fn on_validate_id_token(&self) -> Posted;

    /// Entered [`State::ValidatingPermissions`]
    fn on_validate_permissions(&self) -> Posted;

    /// Entered [`State::ValidatingSameSubject`]
    fn on_validate_same_subject(&self) -> Posted;

    /// Entered a terminal state
    ///
    /// An observation point only; nothing can be posted from here.
    fn on_terminal(&self, state: State, error: Option<&AuthorizationError>) {
        let _ = (state, error);
    }
}

/// Drives a [`Delegate`] through the transition table
#[derive(Debug)]
pub struct StateMachine<D> {
    delegate: D,
    state: State,
    path: Vec<State>,
}

impl<D: Delegate> StateMachine<D> {
    /// A machine in [`State::Start`]
    pub fn new(delegate: D) -> Self {
        Self {
            delegate,
            state: State::Start,
            path: vec![State::Start],
        }
    }

    /// The current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The delegate evaluating guards
    #[inline]
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// The states entered so far, starting with [`State::Start`]
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[State] {
        &self.path
    }

    /// Moves to the state `event` leads to, without calling the delegate
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the state unchanged, if the current state
    /// has no transition for `event`.
    pub fn post(&mut self, event: Event) -> Result<State, IllegalTransition> {
        let mode = self.delegate.mode();
        let to = transition(mode, self.state, event).ok_or(IllegalTransition {
            mode,
            state: self.state,
            event,
        })?;

        tracing::trace!(from = %self.state, %event, %to, "transition");
        self.state = to;
        self.path.push(to);
        Ok(to)
    }

    /// Runs the delegate from the current state to a terminal state
    ///
    /// The first error any callback records is kept; later ones are
    /// ignored.
    ///
    /// # Panics
    ///
    /// Panics if the delegate posts an event with no transition from the
    /// state it was called for.
    pub fn run(mut self) -> AuthorizerResult {
        let mut error = None;

        while let Some(posted) = self.enter() {
            let Posted {
                event,
                error: recorded,
            } = posted;

            if error.is_none() {
                error = recorded;
            }

            if let Err(illegal) = self.post(event) {
                panic!("delegate broke the transition table: {illegal}");
            }
        }

        self.delegate.on_terminal(self.state, error.as_ref());
        AuthorizerResult::new(self.state, error, self.path)
    }

    fn enter(&self) -> Option<Posted> {
        let d = &self.delegate;
        let posted = match self.state {
            State::Start => d.on_start_authorizing(),
            State::ValidatingRequestedUrl => d.on_validate_requested_url(),
            State::ValidatingWhitelistedUrl => d.on_validate_whitelisted_url(),
            State::ValidatingRestrictedMethod => d.on_validate_restricted_method(),
            State::ValidatingTokens => d.on_start_validate_tokens(),
            State::ValidatingNonce => d.on_validate_nonce(),
            State::ValidatingAccessToken => d.on_validate_access_token(),
            State::ValidatingIdToken => d.on_validate_id_token(),
            State::ValidatingPermissions => d.on_validate_permissions(),
            State::ValidatingSameSubject => d.on_validate_same_subject(),
            State::NeedRedirect
            | State::InvalidToken
            | State::Error
            | State::AccessGranted
            | State::AccessDenied => return None,
        };

        Some(posted)
    }
}
