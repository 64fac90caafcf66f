//! The decision core of a forward-authorization service
//!
//! An edge proxy forwards every incoming request to a forward-auth service,
//! which answers grant, deny, or redirect. This crate makes that decision.
//! The calling layer parses the bearer credentials, matches the request to
//! an [`Application`], and bundles the facts into a [`RequestContext`]. An
//! [`Authorizer`] then runs the decision engine synchronously to one of five
//! terminal states.
//!
//! ```
//! use forwardauth::{
//!     permission::Permissions,
//!     token::{Claims, Token},
//!     Application, Authorizer, RequestContext, RequestedUrl, State,
//! };
//!
//! let app = Application::new("reports")
//!     .with_redirect_uri("https://reports.example.com/signin")
//!     .add_restricted_method("DELETE")
//!     .with_required_permissions(Permissions::from_delimited("read:data write:data"));
//!
//! let access_token = Token::jwt(
//!     Claims::new()
//!         .with_subject("auth0|u1")
//!         .with_permissions(["read:data"]),
//! );
//!
//! let ctx = RequestContext::api(
//!     RequestedUrl::new("https", "reports.example.com", "/summary", "GET"),
//!     app,
//!     access_token,
//! );
//!
//! let result = Authorizer::create(ctx).authorize();
//!
//! assert_eq!(result.state(), State::AccessDenied);
//! assert_eq!(result.message().as_deref(), Some("Missing permissions 'write:data'"));
//! ```
//!
//! In [`Mode::Oidc`], built with [`RequestContext::oidc`], the engine also
//! checks the ID token nonce, the ID token itself, and that both tokens name
//! the same subject.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod app;
mod authorizer;
pub mod clock;
pub mod error;
pub mod events;
pub mod fsm;
pub mod permission;
pub mod request;
mod result;
pub mod token;

pub use app::Application;
pub use authorizer::Authorizer;
pub use error::AuthorizationError;
pub use fsm::{Event, Mode, State};
pub use request::{RequestContext, RequestedUrl};
pub use result::AuthorizerResult;
pub use token::Token;
