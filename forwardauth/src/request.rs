//! Per-request facts gathered by the calling layer

use std::fmt;

use aliri_braid::braid;
use url::{Position, Url};

use crate::{app::Application, error::InvalidRequestedUrl, fsm::Mode, token::Token};

/// A nonce issued with a sign-in redirect and echoed back in the ID token
#[braid(serde, ref_doc = "A borrowed reference to a [`Nonce`]")]
pub struct Nonce;

/// The OAuth2 `state` parameter correlating a sign-in redirect with its callback
#[braid(serde, ref_doc = "A borrowed reference to an [`OAuthState`]")]
pub struct OAuthState;

/// The URL and method of the request being authorized
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestedUrl {
    scheme: String,
    host: String,
    path: String,
    method: String,
}

impl RequestedUrl {
    /// Builds a requested URL from the parts forwarded by the proxy
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    /// Builds a requested URL from an absolute URL
    ///
    /// The path keeps any query string.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL with a host.
    pub fn parse(url: &str, method: impl Into<String>) -> Result<Self, InvalidRequestedUrl> {
        let parsed = Url::parse(url)?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => return Err(InvalidRequestedUrl::MissingHost),
        };

        Ok(Self {
            scheme: parsed.scheme().to_owned(),
            host,
            path: parsed[Position::BeforePath..Position::AfterQuery].to_owned(),
            method: method.into(),
        })
    }

    /// The URL scheme, e.g. `https`
    #[inline]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host, including any explicit port
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The path, including any query string
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP method, as sent
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether this URL falls under `prefix`
    ///
    /// A prefix starting with `/` is matched against the path alone; any
    /// other prefix is matched against the full `scheme://host/path` form.
    /// An empty prefix matches nothing.
    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            false
        } else if prefix.starts_with('/') {
            self.path.starts_with(prefix)
        } else {
            self.to_string().starts_with(prefix)
        }
    }
}

impl fmt::Display for RequestedUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// The identity provider URL a browser is redirected to for sign-in
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AuthorizeUrl(Url);

impl AuthorizeUrl {
    /// Builds the authorization code request for `app`
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not an absolute URL.
    pub fn new(
        endpoint: &str,
        app: &Application,
        state: &OAuthStateRef,
        nonce: Option<&NonceRef>,
    ) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("audience", app.audience())
                .append_pair("scope", app.scope())
                .append_pair("response_type", "code")
                .append_pair("client_id", app.client_id())
                .append_pair("redirect_uri", app.redirect_uri())
                .append_pair("state", state.as_str());
            if let Some(nonce) = nonce {
                query.append_pair("nonce", nonce.as_str());
            }
        }
        Ok(Self(url))
    }

    /// The URL as a string
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The underlying URL
    #[inline]
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for AuthorizeUrl {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the authorizer knows about one request
///
/// Built once by the calling layer and never mutated by the authorizer.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub struct RequestContext {
    mode: Mode,
    requested_url: RequestedUrl,
    application: Application,
    access_token: Token,
    id_token: Option<Token>,
    nonce: Option<Nonce>,
    state: Option<OAuthState>,
    authorize_url: Option<AuthorizeUrl>,
    auth_domain: Option<String>,
}

impl RequestContext {
    /// Context for an API call authorized by an access token alone
    pub fn api(requested_url: RequestedUrl, application: Application, access_token: Token) -> Self {
        Self {
            mode: Mode::Api,
            requested_url,
            application,
            access_token,
            id_token: None,
            nonce: None,
            state: None,
            authorize_url: None,
            auth_domain: None,
        }
    }

    /// Context for a browser request carrying both an access token and an ID token
    pub fn oidc(
        requested_url: RequestedUrl,
        application: Application,
        access_token: Token,
        id_token: Token,
    ) -> Self {
        Self {
            mode: Mode::Oidc,
            id_token: Some(id_token),
            ..Self::api(requested_url, application, access_token)
        }
    }

    /// Sets the nonce the ID token is expected to carry
    #[inline]
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Sets the OAuth2 state parameter for a sign-in redirect
    #[inline]
    pub fn with_state(mut self, state: OAuthState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the URL to redirect to when sign-in is required
    #[inline]
    pub fn with_authorize_url(mut self, authorize_url: AuthorizeUrl) -> Self {
        self.authorize_url = Some(authorize_url);
        self
    }

    /// Sets the domain of the identity provider
    #[inline]
    pub fn with_auth_domain(mut self, auth_domain: impl Into<String>) -> Self {
        self.auth_domain = Some(auth_domain.into());
        self
    }

    /// Which branches of the decision graph apply to this request
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether this is an API call rather than a browser request
    #[inline]
    #[must_use]
    pub fn is_api(&self) -> bool {
        self.mode == Mode::Api
    }

    /// The request being authorized
    #[inline]
    #[must_use]
    pub fn requested_url(&self) -> &RequestedUrl {
        &self.requested_url
    }

    /// The application matched to the request
    #[inline]
    pub fn application(&self) -> &Application {
        &self.application
    }

    /// The access token
    #[inline]
    #[must_use]
    pub fn access_token(&self) -> &Token {
        &self.access_token
    }

    /// The ID token, if this is a browser request
    #[inline]
    #[must_use]
    pub fn id_token(&self) -> Option<&Token> {
        self.id_token.as_ref()
    }

    /// The expected nonce
    #[inline]
    #[must_use]
    pub fn nonce(&self) -> Option<&NonceRef> {
        self.nonce.as_deref()
    }

    /// The OAuth2 state parameter
    #[inline]
    #[must_use]
    pub fn state(&self) -> Option<&OAuthStateRef> {
        self.state.as_deref()
    }

    /// Where to send the browser when sign-in is required
    #[inline]
    #[must_use]
    pub fn authorize_url(&self) -> Option<&AuthorizeUrl> {
        self.authorize_url.as_ref()
    }

    /// The identity provider domain
    #[inline]
    #[must_use]
    pub fn auth_domain(&self) -> Option<&str> {
        self.auth_domain.as_deref()
    }
}
