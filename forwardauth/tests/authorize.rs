use color_eyre::Result;
use forwardauth::{
    permission::Permissions,
    request::{Nonce, RequestedUrl},
    token::{Claims, Token},
    Application, AuthorizationError, Authorizer, AuthorizerResult, RequestContext, State,
};
use serde_json::json;

fn get(path: &str) -> RequestedUrl {
    RequestedUrl::new("https", "app.example.com", path, "GET")
}

fn jwt(claims: serde_json::Value) -> Result<Token> {
    Ok(Token::jwt(serde_json::from_value::<Claims>(claims)?))
}

fn api(url: RequestedUrl, app: Application, access: Token) -> AuthorizerResult {
    Authorizer::create(RequestContext::api(url, app, access)).authorize()
}

fn oidc(url: RequestedUrl, app: Application, access: Token, id: Token) -> AuthorizerResult {
    Authorizer::create(RequestContext::oidc(url, app, access, id)).authorize()
}

fn reader_app() -> Application {
    Application::new("reports")
        .with_redirect_uri("/signin")
        .with_required_permissions(Permissions::from_delimited("read:data"))
}

fn all_token_shapes() -> Result<Vec<Token>> {
    Ok(vec![
        Token::opaque("xyz"),
        Token::invalid("expired"),
        jwt(json!({}))?,
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
    ])
}

#[test]
fn whitelisted_url_is_granted() {
    let app = Application::new("web").with_redirect_uri("/app/secure");

    let result = api(get("/app/secure"), app, Token::invalid("garbage"));

    assert_eq!(result.state(), State::AccessGranted);
    assert_eq!(result.error(), None);
}

#[test]
fn restricted_method_needs_redirect() {
    let app = Application::new("admin").add_restricted_method("DELETE");
    let url = RequestedUrl::new("https", "app.example.com", "/admin", "DELETE");

    let result = api(url, app, Token::invalid("garbage"));

    assert_eq!(result.state(), State::NeedRedirect);
    assert_eq!(result.error(), None);
}

#[test]
fn opaque_access_token_is_an_error() {
    let result = api(get("/data"), reader_app(), Token::opaque("xyz"));

    assert_eq!(result.state(), State::Error);
    assert_eq!(
        result.message().as_deref(),
        Some("Opaque Access Tokens is not supported.")
    );
}

#[test]
fn missing_permissions_claim_is_denied() -> Result<()> {
    let result = api(get("/data"), reader_app(), jwt(json!({}))?);

    assert_eq!(result.state(), State::AccessDenied);
    assert_eq!(
        result.error(),
        Some(&AuthorizationError::MissingPermissionsClaim)
    );
    assert!(result
        .message()
        .unwrap_or_default()
        .contains("Missing permissions claim"));
    Ok(())
}

#[test]
fn insufficient_permissions_are_listed() -> Result<()> {
    let app = reader_app()
        .with_required_permissions(Permissions::from_delimited("read:data write:data"));

    let result = api(get("/data"), app, jwt(json!({ "permissions": ["read:data"] }))?);

    assert_eq!(result.state(), State::AccessDenied);
    assert_eq!(
        result.message().as_deref(),
        Some("Missing permissions 'write:data'")
    );
    Ok(())
}

#[test]
fn different_subjects_are_denied() -> Result<()> {
    let result = oidc(
        get("/data"),
        reader_app(),
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
        jwt(json!({ "sub": "u2" }))?,
    );

    assert_eq!(result.state(), State::AccessDenied);
    assert_eq!(result.error(), Some(&AuthorizationError::SubjectMismatch));
    assert_eq!(
        result.path().last().copied(),
        Some(State::AccessDenied)
    );
    assert!(result.path().contains(&State::ValidatingSameSubject));
    Ok(())
}

#[test]
fn matching_subjects_are_granted() -> Result<()> {
    let result = oidc(
        get("/data"),
        reader_app(),
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
        jwt(json!({ "sub": "u1" }))?,
    );

    assert_eq!(result.state(), State::AccessGranted);
    assert!(!result.has_error());
    Ok(())
}

#[test]
fn whitelist_wins_over_every_token() -> Result<()> {
    let app = reader_app().add_restricted_method("GET");

    for token in all_token_shapes()? {
        let result = api(get("/signin?code=abc"), app.clone(), token);
        assert!(result.is_granted());
    }
    Ok(())
}

#[test]
fn method_check_precedes_token_checks() -> Result<()> {
    let app = reader_app().add_restricted_method("post");
    let url = RequestedUrl::new("https", "app.example.com", "/data", "POST");

    for token in all_token_shapes()? {
        let result = api(url.clone(), app.clone(), token);
        assert_eq!(result.state(), State::NeedRedirect);
    }
    Ok(())
}

#[test]
fn opaque_is_never_granted_or_denied() {
    let apps = [
        Application::new("open"),
        reader_app(),
        reader_app().add_restricted_method("PUT"),
    ];

    for app in apps {
        let result = api(get("/data"), app, Token::opaque("xyz"));
        assert_eq!(result.state(), State::Error);
    }
}

#[test]
fn invalid_access_token_is_invalid() {
    let result = api(get("/data"), reader_app(), Token::invalid("signature"));

    assert_eq!(result.state(), State::InvalidToken);
    assert_eq!(
        result.error(),
        Some(&AuthorizationError::InvalidToken {
            reason: "signature".to_owned()
        })
    );
}

#[test]
fn permissions_are_monotonic() -> Result<()> {
    let required = ["read:data", "write:data", "delete:data"];
    let app = reader_app().with_required_permissions(required.iter().copied().collect());

    let superset = jwt(json!({ "permissions": ["read:data", "write:data", "delete:data", "admin"] }))?;
    assert!(api(get("/data"), app.clone(), superset).is_granted());

    for removed in required {
        let granted: Vec<&str> = required.iter().copied().filter(|p| *p != removed).collect();
        let result = api(get("/data"), app.clone(), jwt(json!({ "permissions": granted }))?);

        assert_eq!(result.state(), State::AccessDenied);
        assert_eq!(
            result.message().as_deref(),
            Some(format!("Missing permissions '{removed}'").as_str())
        );
    }
    Ok(())
}

#[test]
fn no_required_permissions_skips_claim_check() -> Result<()> {
    let result = api(get("/data"), Application::new("open"), jwt(json!({}))?);

    assert!(result.is_granted());
    Ok(())
}

#[test]
fn missing_claim_and_insufficient_differ() -> Result<()> {
    let no_claim = api(get("/data"), reader_app(), jwt(json!({}))?);
    let empty_claim = api(get("/data"), reader_app(), jwt(json!({ "permissions": [] }))?);

    assert_eq!(no_claim.state(), empty_claim.state());
    assert_ne!(no_claim.message(), empty_claim.message());
    assert!(no_claim.error().map_or(false, AuthorizationError::is_permission_failure));
    assert!(empty_claim.error().map_or(false, AuthorizationError::is_permission_failure));
    Ok(())
}

#[test]
fn same_subject_combinations_never_panic() -> Result<()> {
    let id_tokens = vec![
        jwt(json!({ "sub": "u1" }))?,
        jwt(json!({ "sub": "u2" }))?,
        jwt(json!({}))?,
        Token::opaque("id"),
        Token::invalid("expired"),
    ];

    for id in id_tokens {
        let granted_id = id.as_jwt().and_then(|c| c.subject()).map(|s| s.as_str()) == Some("u1");
        let result = oidc(
            get("/data"),
            reader_app(),
            jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
            id,
        );

        if granted_id {
            assert_eq!(result.state(), State::AccessGranted);
        } else {
            assert_ne!(result.state(), State::AccessGranted);
        }
    }

    let no_access_subject = oidc(
        get("/data"),
        reader_app(),
        jwt(json!({ "permissions": ["read:data"] }))?,
        jwt(json!({ "sub": "u1" }))?,
    );
    assert_eq!(no_access_subject.state(), State::AccessDenied);
    assert_eq!(
        no_access_subject.error(),
        Some(&AuthorizationError::SubjectMismatch)
    );
    Ok(())
}

#[test]
fn non_jwt_id_token_is_invalid() {
    let result = oidc(
        get("/data"),
        reader_app(),
        Token::jwt(Claims::new().with_subject("u1").with_permissions(["read:data"])),
        Token::opaque("id"),
    );

    assert_eq!(result.state(), State::InvalidToken);
    assert!(matches!(
        result.error(),
        Some(AuthorizationError::InvalidToken { .. })
    ));
}

#[test]
fn matching_nonce_is_accepted() -> Result<()> {
    let ctx = RequestContext::oidc(
        get("/data"),
        reader_app(),
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
        jwt(json!({ "sub": "u1", "nonce": "n-1" }))?,
    )
    .with_nonce(Nonce::from_static("n-1"));

    let result = Authorizer::create(ctx).authorize();

    assert!(result.is_granted());
    assert!(result.path().contains(&State::ValidatingNonce));
    Ok(())
}

#[test]
fn api_mode_ignores_nonce() -> Result<()> {
    let ctx = RequestContext::api(
        get("/data"),
        reader_app(),
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
    )
    .with_nonce(Nonce::from_static("n-1"));

    let result = Authorizer::create(ctx).authorize();

    assert!(result.is_granted());
    assert!(!result.path().contains(&State::ValidatingNonce));
    assert!(!result.path().contains(&State::ValidatingIdToken));
    Ok(())
}

#[test]
fn identical_inputs_give_identical_results() -> Result<()> {
    let ctx = RequestContext::oidc(
        get("/data"),
        reader_app(),
        jwt(json!({ "sub": "u1", "permissions": ["read:data"] }))?,
        jwt(json!({ "sub": "u2" }))?,
    );

    let first = Authorizer::create(ctx.clone()).authorize();
    let second = Authorizer::create(ctx).authorize();

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn every_run_ends_in_exactly_one_terminal_state() -> Result<()> {
    let apps = [
        Application::new("open"),
        reader_app(),
        reader_app().add_restricted_method("GET"),
    ];
    let urls = [get("/signin"), get("/data")];

    for app in &apps {
        for url in &urls {
            for access in all_token_shapes()? {
                for id in all_token_shapes()? {
                    let results = [
                        api(url.clone(), app.clone(), access.clone()),
                        oidc(url.clone(), app.clone(), access.clone(), id),
                    ];

                    for result in results {
                        assert!(result.state().is_terminal());
                        assert_eq!(
                            result.path().iter().filter(|s| s.is_terminal()).count(),
                            1
                        );
                        assert_eq!(result.path().first(), Some(&State::Start));
                        assert_eq!(result.path().last(), Some(&result.state()));
                    }
                }
            }
        }
    }
    Ok(())
}
