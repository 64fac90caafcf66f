//! Builders for the responses a forward-auth endpoint returns to the proxy

use forwardauth::{permission::Permissions, request::AuthorizeUrl};
use http::{header, HeaderValue, Response, StatusCode};

/// Build a `200 OK` response with an empty body
pub fn granted<Body: Default>() -> Response<Body> {
    Response::new(Body::default())
}

/// Build a `401 Unauthorized` response with the appropriate `www-authenticate`
/// header
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly.
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="invalid_token" error_description="{description}"
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn unauthorized<Body: Default>(description: &str) -> Response<Body> {
    let mut resp = with_status(StatusCode::UNAUTHORIZED);
    resp.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        challenge("invalid_token", description, None),
    );
    resp
}

/// Build a `403 Forbidden` response with the appropriate `www-authenticate`
/// header
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly. If `missing` is given and not empty, the permissions
/// are listed in a `scope` attribute.
///
/// ```http
/// HTTP/1.1 403 Forbidden
/// www-authenticate: Bearer error="insufficient_scope" error_description="{description}" scope="write:data"
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn forbidden<Body: Default>(description: &str, missing: Option<&Permissions>) -> Response<Body> {
    let mut resp = with_status(StatusCode::FORBIDDEN);
    resp.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        challenge(
            "insufficient_scope",
            description,
            missing.filter(|m| !m.is_empty()),
        ),
    );
    resp
}

/// Build a `307 Temporary Redirect` response sending the browser to sign in
pub fn redirect<Body: Default>(authorize_url: &AuthorizeUrl) -> Response<Body> {
    let mut resp = with_status(StatusCode::TEMPORARY_REDIRECT);
    resp.headers_mut().insert(
        header::LOCATION,
        HeaderValue::try_from(authorize_url.as_str())
            .expect("a serialized URL is a valid header value"),
    );
    resp
}

/// Build a `500 Internal Server Error` response with an empty body
pub fn internal_error<Body: Default>() -> Response<Body> {
    with_status(StatusCode::INTERNAL_SERVER_ERROR)
}

fn with_status<Body: Default>(status: StatusCode) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = status;
    resp
}

fn challenge(error: &'static str, description: &str, missing: Option<&Permissions>) -> HeaderValue {
    let mut value = format!(r#"Bearer error="{error}""#);

    if !description.is_empty() {
        value.push_str(&format!(
            r#" error_description="{}""#,
            description.escape_default()
        ));
    }

    if let Some(missing) = missing {
        let scope = missing
            .iter()
            .map(|p| p.as_str().escape_default().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        value.push_str(&format!(r#" scope="{scope}""#));
    }

    HeaderValue::try_from(value).expect("escaped challenge is a valid header value")
}
