use color_eyre::Result;
use forwardauth::{
    permission::Permissions,
    request::{AuthorizeUrl, Nonce, NonceRef, OAuthState, OAuthStateRef, RequestedUrl},
    token::{Claims, Token},
    Application, Authorizer, RequestContext,
};
use forwardauth_http::{respond, TerseResponder, VerboseResponder};
use http::{header, StatusCode};
use serde_json::json;

fn web_app() -> Application {
    Application::new("web")
        .with_client_id("web-client")
        .with_audience("https://api.example.com")
        .with_scope("openid profile")
        .with_redirect_uri("https://web.example.com/signin")
        .add_restricted_method("DELETE")
        .with_required_permissions(Permissions::from_delimited("read:data"))
}

fn sign_in_url(app: &Application, state: &OAuthStateRef, nonce: &NonceRef) -> Result<AuthorizeUrl> {
    Ok(AuthorizeUrl::new(
        "https://tenant.example.com/authorize",
        app,
        state,
        Some(nonce),
    )?)
}

#[test]
fn restricted_method_redirects_to_sign_in() -> Result<()> {
    let app = web_app();
    let state = OAuthState::from_static("state-1");
    let nonce = Nonce::from_static("nonce-1");
    let authorize_url = sign_in_url(&app, &state, &nonce)?;

    let ctx = RequestContext::oidc(
        RequestedUrl::parse("https://web.example.com/items/7", "DELETE")?,
        app,
        Token::invalid("expired"),
        Token::invalid("expired"),
    )
    .with_state(state)
    .with_nonce(nonce)
    .with_authorize_url(authorize_url.clone());

    let result = Authorizer::create(ctx.clone()).authorize();
    let resp = respond(&TerseResponder::<()>::new(), &result, ctx.authorize_url());

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = resp
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str())
        .transpose()?;
    assert_eq!(location, Some(authorize_url.as_str()));
    assert!(authorize_url.as_str().contains("nonce=nonce-1"));
    assert!(authorize_url.as_str().contains("response_type=code"));
    Ok(())
}

#[test]
fn redirect_without_url_is_unauthorized() -> Result<()> {
    let ctx = RequestContext::api(
        RequestedUrl::parse("https://web.example.com/items/7", "DELETE")?,
        web_app(),
        Token::opaque("xyz"),
    );

    let result = Authorizer::create(ctx).authorize();
    let resp = respond(&VerboseResponder::<()>::new(), &result, None);

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[test]
fn sign_in_callback_is_let_through() -> Result<()> {
    let ctx = RequestContext::oidc(
        RequestedUrl::parse("https://web.example.com/signin?code=abc&state=s", "GET")?,
        web_app(),
        Token::invalid("not yet issued"),
        Token::invalid("not yet issued"),
    );

    let result = Authorizer::create(ctx).authorize();
    let resp = respond(&TerseResponder::<()>::new(), &result, None);

    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[test]
fn missing_claim_denial_is_described_verbosely() -> Result<()> {
    let access = Token::jwt(serde_json::from_value::<Claims>(json!({ "sub": "u1" }))?);
    let ctx = RequestContext::api(
        RequestedUrl::parse("https://api.example.com/data", "GET")?,
        web_app(),
        access,
    );

    let result = Authorizer::create(ctx).authorize();
    let resp = respond(&VerboseResponder::<()>::new(), &result, None);

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let challenge = resp
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| v.to_str())
        .transpose()?
        .unwrap_or_default();
    assert!(challenge.starts_with(r#"Bearer error="insufficient_scope""#));
    assert!(challenge.contains("Missing permissions claim in access token."));
    assert!(!challenge.contains("scope=\""));
    Ok(())
}
