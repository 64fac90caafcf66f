use tracing::{debug, trace, warn, Span};

use crate::{
    error::AuthorizationError,
    fsm::{Delegate, Event, Mode, Posted, State, StateMachine},
    request::RequestContext,
    result::AuthorizerResult,
    token::{Claims, Token},
};

/// Evaluates the authorization policy for one request
///
/// An authorizer is bound to a single [`RequestContext`] and consumed by
/// [`authorize`](Self::authorize), so every request gets a fresh instance.
#[derive(Debug)]
#[must_use]
pub struct Authorizer {
    context: RequestContext,
    span: Span,
}

impl Authorizer {
    /// Binds an authorizer to `context`
    ///
    /// Log output goes to a `forwardauth.authorize` span carrying the
    /// request method, host, and path.
    pub fn create(context: RequestContext) -> Self {
        let url = context.requested_url();
        let span = tracing::debug_span!(
            "forwardauth.authorize",
            mode = %context.mode(),
            method = %url.method(),
            host = %url.host(),
            path = %url.path(),
            outcome = tracing::field::Empty,
        );

        Self { context, span }
    }

    /// Sends log output to `span` instead of the default span
    ///
    /// If `span` declares an `outcome` field, the terminal state is
    /// recorded there.
    #[inline]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The request being authorized
    #[inline]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Runs the decision engine to a terminal state
    ///
    /// # Panics
    ///
    /// Panics if the permissions guard is reached with an access token that
    /// is not a JWT. The transition table rules this out.
    pub fn authorize(self) -> AuthorizerResult {
        let span = self.span.clone();
        let _entered = span.enter();

        StateMachine::new(self).run()
    }

    fn requested_url_is_whitelisted(&self) -> bool {
        let redirect_uri = self.context.application().redirect_uri();
        self.context.requested_url().starts_with(redirect_uri)
    }
}

impl Delegate for Authorizer {
    #[inline]
    fn mode(&self) -> Mode {
        self.context.mode()
    }

    fn on_validate_whitelisted_url(&self) -> Posted {
        if self.requested_url_is_whitelisted() {
            trace!(
                redirect_uri = self.context.application().redirect_uri(),
                "requested URL is part of the sign-in flow"
            );
            Posted::next(Event::WhitelistedUrl)
        } else {
            Posted::next(Event::RestrictedUrl)
        }
    }

    fn on_validate_restricted_method(&self) -> Posted {
        let method = self.context.requested_url().method();
        if self.context.application().is_restricted_method(method) {
            trace!(method, "method is restricted");
            Posted::next(Event::RestrictedMethod)
        } else {
            Posted::next(Event::UnrestrictedMethod)
        }
    }

    fn on_validate_nonce(&self) -> Posted {
        let expected = match self.context.nonce() {
            Some(nonce) => nonce,
            None => return Posted::next(Event::ValidNonce),
        };

        match self.context.id_token().and_then(Token::as_jwt) {
            Some(claims) if claims.nonce() != Some(expected.as_str()) => {
                trace!(
                    expected = expected.as_str(),
                    actual = claims.nonce(),
                    "ID token nonce does not match"
                );
                Posted::failed(Event::InvalidNonce, AuthorizationError::NonceMismatch)
            }
            _ => Posted::next(Event::ValidNonce),
        }
    }

    fn on_validate_access_token(&self) -> Posted {
        match self.context.access_token() {
            Token::Jwt(_) => Posted::next(Event::ValidAccessToken),
            Token::Opaque(_) => {
                trace!("access token is opaque");
                Posted::failed(Event::Error, AuthorizationError::UnsupportedTokenType)
            }
            Token::Invalid { reason } => {
                trace!(%reason, "access token was rejected upstream");
                Posted::failed(
                    Event::InvalidAccessToken,
                    AuthorizationError::InvalidToken {
                        reason: reason.clone(),
                    },
                )
            }
        }
    }

    fn on_validate_id_token(&self) -> Posted {
        let reason = match self.context.id_token() {
            Some(Token::Jwt(_)) => return Posted::next(Event::ValidIdToken),
            Some(Token::Invalid { reason }) => reason.clone(),
            Some(Token::Opaque(_)) => "ID token is opaque".to_owned(),
            None => "ID token is missing".to_owned(),
        };

        trace!(%reason, "ID token is not usable");
        Posted::failed(
            Event::InvalidIdToken,
            AuthorizationError::InvalidToken { reason },
        )
    }

    fn on_validate_permissions(&self) -> Posted {
        let claims = match self.context.access_token() {
            Token::Jwt(claims) => claims,
            other => panic!("permissions guard reached with a non-JWT access token: {other:?}"),
        };

        let required = self.context.application().required_permissions();
        if !required.is_empty() && !claims.has_permissions_claim() {
            warn!(
                application = self.context.application().name(),
                "access token has no permissions claim; the identity provider must be configured to add permissions to the access token"
            );
            return Posted::failed(
                Event::InvalidPermissions,
                AuthorizationError::MissingPermissionsClaim,
            );
        }

        match required.evaluate(&claims.permissions()) {
            Ok(()) => Posted::next(Event::ValidPermissions),
            Err(missing) => {
                trace!(missing = %missing.missing(), "access token lacks required permissions");
                Posted::failed(Event::InvalidPermissions, missing)
            }
        }
    }

    fn on_validate_same_subject(&self) -> Posted {
        let access = self.context.access_token().as_jwt().and_then(Claims::subject);
        let id = self
            .context
            .id_token()
            .and_then(Token::as_jwt)
            .and_then(Claims::subject);

        match (access, id) {
            (Some(access), Some(id)) if access == id => Posted::next(Event::ValidSameSubs),
            _ => {
                trace!(
                    access_subject = access.map(|s| s.as_str()),
                    id_subject = id.map(|s| s.as_str()),
                    "token subjects do not match"
                );
                Posted::failed(Event::InvalidSameSubs, AuthorizationError::SubjectMismatch)
            }
        }
    }

    fn on_terminal(&self, state: State, error: Option<&AuthorizationError>) {
        self.span.record("outcome", state.as_str());

        match error {
            Some(error) => debug!(outcome = %state, %error, "authorization decided"),
            None => debug!(outcome = %state, "authorization decided"),
        }
    }
}
