//! HTTP responses for `forwardauth` decisions
//!
//! A forward-auth endpoint answers the edge proxy with a status code and a
//! few headers. [`respond`] maps an [`AuthorizerResult`](forwardauth::AuthorizerResult)
//! onto an [`http::Response`] through an [`OnDecision`] handler.
//!
//! ```
//! use forwardauth::{
//!     permission::Permissions,
//!     token::{Claims, Token},
//!     Application, Authorizer, RequestContext, RequestedUrl,
//! };
//! use forwardauth_http::{respond, VerboseResponder};
//! use http::StatusCode;
//!
//! let app = Application::new("api")
//!     .with_required_permissions(Permissions::from_delimited("read:data"));
//! let ctx = RequestContext::api(
//!     RequestedUrl::new("https", "api.example.com", "/data", "GET"),
//!     app,
//!     Token::jwt(Claims::new().with_permissions(["read:data"])),
//! );
//!
//! let result = Authorizer::create(ctx).authorize();
//! let response = respond(&VerboseResponder::<()>::new(), &result, None);
//!
//! assert_eq!(response.status(), StatusCode::OK);
//! ```

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

mod responder;
pub mod util;

pub use responder::{respond, OnDecision, TerseResponder, VerboseResponder};
