use std::{fmt, marker::PhantomData};

use forwardauth::{
    permission::Permissions, request::AuthorizeUrl, AuthorizationError, AuthorizerResult, State,
};
use http::Response;

use crate::util::{forbidden, granted, internal_error, redirect, unauthorized};

/// Handler for turning each terminal decision into a response
pub trait OnDecision {
    /// The body type of the response
    type Body;

    /// Response when the request may proceed
    fn on_granted(&self) -> Response<Self::Body>;

    /// Response when the request is forbidden
    fn on_denied(&self, error: Option<&AuthorizationError>) -> Response<Self::Body>;

    /// Response when the client must sign in
    fn on_need_redirect(&self, authorize_url: Option<&AuthorizeUrl>) -> Response<Self::Body>;

    /// Response when a token was rejected
    fn on_invalid_token(&self, error: Option<&AuthorizationError>) -> Response<Self::Body>;

    /// Response when the request could not be evaluated
    fn on_error(&self, error: Option<&AuthorizationError>) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnDecision for $ty
            where
                T: OnDecision + ?Sized,
            {
                type Body = T::Body;

                fn on_granted(&self) -> Response<Self::Body> {
                    T::on_granted(self)
                }

                fn on_denied(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
                    T::on_denied(self, error)
                }

                fn on_need_redirect(&self, authorize_url: Option<&AuthorizeUrl>) -> Response<Self::Body> {
                    T::on_need_redirect(self, authorize_url)
                }

                fn on_invalid_token(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
                    T::on_invalid_token(self, error)
                }

                fn on_error(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
                    T::on_error(self, error)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    std::sync::Arc<T>
);

/// Maps a decision onto a response using `responder`
///
/// `authorize_url` is where a browser is sent when sign-in is required.
///
/// # Panics
///
/// Panics if `result` holds a non-terminal state, which an
/// [`Authorizer`](forwardauth::Authorizer) never produces.
pub fn respond<R>(
    responder: &R,
    result: &AuthorizerResult,
    authorize_url: Option<&AuthorizeUrl>,
) -> Response<R::Body>
where
    R: OnDecision + ?Sized,
{
    match result.state() {
        State::AccessGranted => responder.on_granted(),
        State::AccessDenied => responder.on_denied(result.error()),
        State::NeedRedirect => responder.on_need_redirect(authorize_url),
        State::InvalidToken => responder.on_invalid_token(result.error()),
        State::Error => responder.on_error(result.error()),
        state => unreachable!("authorization ended in non-terminal state {state}"),
    }
}

fn missing_permissions(error: Option<&AuthorizationError>) -> Option<&Permissions> {
    match error {
        Some(AuthorizationError::InsufficientPermissions(missing)) => Some(missing.missing()),
        _ => None,
    }
}

fn log_error(error: Option<&AuthorizationError>) {
    match error {
        Some(error) => tracing::error!(%error, "authorization could not be evaluated"),
        None => tracing::error!("authorization could not be evaluated"),
    }
}

/// Responds with status codes and challenges only
///
/// Denials and token rejections carry no `error_description`, so nothing
/// about the token or the policy is revealed to the client.
pub struct TerseResponder<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> TerseResponder<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for TerseResponder<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TerseResponder")
    }
}

impl<ResBody> Default for TerseResponder<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<ResBody> Clone for TerseResponder<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<ResBody> Copy for TerseResponder<ResBody> {}

impl<ResBody> OnDecision for TerseResponder<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_granted(&self) -> Response<Self::Body> {
        granted()
    }

    #[inline]
    fn on_denied(&self, _: Option<&AuthorizationError>) -> Response<Self::Body> {
        tracing::debug!("access denied");
        forbidden("", None)
    }

    #[inline]
    fn on_need_redirect(&self, authorize_url: Option<&AuthorizeUrl>) -> Response<Self::Body> {
        match authorize_url {
            Some(url) => redirect(url),
            None => unauthorized(""),
        }
    }

    #[inline]
    fn on_invalid_token(&self, _: Option<&AuthorizationError>) -> Response<Self::Body> {
        tracing::debug!("token rejected");
        unauthorized("")
    }

    #[inline]
    fn on_error(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
        log_error(error);
        internal_error()
    }
}

/// Responds with the diagnostic message of each denial and token rejection
///
/// Intended for API consumers, who need to know which permission is missing.
/// Messages for [`State::Error`] are still only logged.
pub struct VerboseResponder<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> VerboseResponder<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for VerboseResponder<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("VerboseResponder")
    }
}

impl<ResBody> Default for VerboseResponder<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<ResBody> Clone for VerboseResponder<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<ResBody> Copy for VerboseResponder<ResBody> {}

impl<ResBody> OnDecision for VerboseResponder<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_granted(&self) -> Response<Self::Body> {
        granted()
    }

    #[inline]
    fn on_denied(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
        let description = error.map(ToString::to_string).unwrap_or_default();
        tracing::debug!("access denied: {description}");
        forbidden(&description, missing_permissions(error))
    }

    #[inline]
    fn on_need_redirect(&self, authorize_url: Option<&AuthorizeUrl>) -> Response<Self::Body> {
        match authorize_url {
            Some(url) => redirect(url),
            None => unauthorized("sign-in required"),
        }
    }

    #[inline]
    fn on_invalid_token(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
        let description = error.map(ToString::to_string).unwrap_or_default();
        tracing::debug!("token rejected: {description}");
        unauthorized(&description)
    }

    #[inline]
    fn on_error(&self, error: Option<&AuthorizationError>) -> Response<Self::Body> {
        log_error(error);
        internal_error()
    }
}
