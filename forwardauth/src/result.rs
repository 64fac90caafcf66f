use crate::{error::AuthorizationError, fsm::State};

/// The decision reached for one request
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct AuthorizerResult {
    state: State,
    error: Option<AuthorizationError>,
    path: Vec<State>,
}

impl AuthorizerResult {
    pub(crate) fn new(state: State, error: Option<AuthorizationError>, path: Vec<State>) -> Self {
        debug_assert!(state.is_terminal(), "{state} is not a terminal state");
        Self { state, error, path }
    }

    /// The terminal state
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Why the run failed, if a guard recorded a reason
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&AuthorizationError> {
        self.error.as_ref()
    }

    /// The diagnostic message of the recorded error
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Whether a guard recorded a reason
    #[inline]
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the request may proceed
    #[inline]
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.state == State::AccessGranted
    }

    /// Every state entered during the run, from [`State::Start`] to the
    /// terminal state
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[State] {
        &self.path
    }

    /// Splits the result into its terminal state and error
    #[inline]
    pub fn into_parts(self) -> (State, Option<AuthorizationError>) {
        (self.state, self.error)
    }
}
