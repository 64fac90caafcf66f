//! Per-application authorization policy
//!
//! An [`Application`] is usually deserialized from the service configuration
//! and matched to a request by host before authorization begins.
//!
//! ```
//! use forwardauth::Application;
//!
//! let app: Application = serde_json::from_str(r#"{
//!     "name": "dashboard",
//!     "client-id": "abc123",
//!     "redirect-uri": "https://dashboard.example.com/signin",
//!     "restricted-methods": ["DELETE", "PUT"],
//!     "required-permissions": ["read:data"]
//! }"#).unwrap();
//!
//! assert!(app.is_restricted_method("delete"));
//! assert!(!app.is_restricted_method("GET"));
//! ```

use serde::{Deserialize, Serialize};

use crate::permission::Permissions;

/// Authorization policy for one protected application
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
#[must_use]
pub struct Application {
    name: String,
    client_id: String,
    audience: String,
    scope: String,
    redirect_uri: String,
    restricted_methods: Vec<String>,
    required_permissions: Permissions,
}

impl Application {
    /// An application with the given name and an otherwise empty policy
    ///
    /// An empty policy has no sign-in URL, restricts no methods, and
    /// requires no permissions.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the OAuth2 client ID used when building the authorize URL
    #[inline]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the audience requested when building the authorize URL
    #[inline]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Sets the scope requested when building the authorize URL
    #[inline]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the sign-in redirect URI
    ///
    /// Requests under this URI are part of the sign-in flow and bypass
    /// authorization entirely.
    #[inline]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Adds an HTTP method that requires the sign-in redirect
    #[inline]
    pub fn add_restricted_method(mut self, method: impl Into<String>) -> Self {
        self.restricted_methods.push(method.into());
        self
    }

    /// Replaces the permissions an access token must grant
    #[inline]
    pub fn with_required_permissions(mut self, permissions: Permissions) -> Self {
        self.required_permissions = permissions;
        self
    }

    /// The application name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The OAuth2 client ID
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The audience to request
    #[inline]
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The scope to request
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The sign-in redirect URI
    #[inline]
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// HTTP methods that require the sign-in redirect
    #[inline]
    #[must_use]
    pub fn restricted_methods(&self) -> &[String] {
        &self.restricted_methods
    }

    /// Permissions every access token must grant
    #[inline]
    pub fn required_permissions(&self) -> &Permissions {
        &self.required_permissions
    }

    /// Whether `method` is restricted, ignoring ASCII case
    #[must_use]
    pub fn is_restricted_method(&self, method: &str) -> bool {
        self.restricted_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}
