//! Two-phase authentication middleware.
//!
//! Requests to the callback path take one of two shapes:
//!
//! - **stage**: no bearer token. The widget posts a JSON object with a `uuid`;
//!   everything except the reserved fields is staged in the [`Store`].
//! - **authorize**: `Authorization: BEARER <token>` plus an identifier (the
//!   `uuid` header, or the JSON body). The staged data is taken from the
//!   store, the token is verified remotely, and on success the data is
//!   attached to the request as [`OneAccountData`] before the next handler
//!   runs.
//!
//! Every other request passes through untouched.
//!
//! ```no_run
//! use axum::{Router, routing::post};
//! use oneaccount_auth::{Collaborators, Config, OneAccount, OneAccountData};
//!
//! async fn callback(data: OneAccountData) -> String {
//!     String::from_utf8_lossy(data.as_bytes()).into_owned()
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let oa = OneAccount::new(Config::default(), Collaborators::default())?;
//! let app: Router = Router::new()
//!     .route("/oneaccountauth", post(callback))
//!     .layer(axum::middleware::from_fn_with_state(oa, oneaccount_auth::authenticate));
//! # Ok(())
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{Extensions, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{AuthError, AuthResult, Phase};
use crate::payload::{UUID_FIELD, bearer_token, identifier_from_body, stage_payload};
use crate::store::{AdapterStore, Getter, Setter, Store, TtlStore};
use crate::verify::{HttpVerifier, Verifier};

/// Observer notified of every locally handled failure.
pub type ErrorListener = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// Pluggable parts of the middleware. Unset fields fall back to defaults.
///
/// At most one storage option is honoured: a full `store`, or a
/// `setter`/`getter` pair wrapped in an [`AdapterStore`]. With neither, a
/// [`TtlStore`] is created.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub store: Option<Arc<dyn Store>>,
    pub setter: Option<Setter>,
    pub getter: Option<Getter>,
    pub verifier: Option<Arc<dyn Verifier>>,
    pub on_error: Option<ErrorListener>,
}

struct Shared {
    store: Arc<dyn Store>,
    default_store: Option<TtlStore>,
    verifier: Arc<dyn Verifier>,
    callback_path: String,
    on_error: Option<ErrorListener>,
    max_body_bytes: usize,
    shutdown: CancellationToken,
}

/// Orchestrates stage → verify → deliver.
///
/// Cheap to clone; all clones share the same store and verifier.
#[derive(Clone)]
pub struct OneAccount {
    shared: Arc<Shared>,
}

impl OneAccount {
    /// Build the middleware, applying defaults for anything not supplied.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, if a custom store is
    /// combined with a setter or getter, or if the default verifier cannot
    /// be built.
    pub fn new(config: Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        config.validate()?;

        let Collaborators { store, setter, getter, verifier, on_error } = collaborators;

        let mut default_store = None;
        let (store, kind): (Arc<dyn Store>, &str) = match (store, setter, getter) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                anyhow::bail!("a custom store cannot be combined with a setter or getter");
            }
            (Some(store), None, None) => (store, "custom"),
            (None, None, None) => {
                let ttl_store = TtlStore::with_settings(config.entry_ttl, config.sweep_interval);
                default_store = Some(ttl_store.clone());
                let store: Arc<dyn Store> = Arc::new(ttl_store);
                (store, "ttl")
            }
            (None, setter, getter) => {
                let store: Arc<dyn Store> = Arc::new(AdapterStore::from_parts(setter, getter));
                (store, "adapter")
            }
        };

        let verifier: Arc<dyn Verifier> = match verifier {
            Some(verifier) => verifier,
            None => Arc::new(HttpVerifier::new(&config)?),
        };

        let callback_path = config.resolved_callback_path();
        tracing::info!(
            callback_path = %callback_path,
            store = kind,
            "OneAccount middleware configured"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                default_store,
                verifier,
                callback_path,
                on_error,
                max_body_bytes: config.max_body_bytes,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Callback path without surrounding slashes.
    #[must_use]
    pub fn callback_path(&self) -> &str {
        &self.shared.callback_path
    }

    /// Stop the default store's sweep; later store calls see a cancelled context.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        if let Some(store) = &self.shared.default_store {
            store.shutdown();
        }
    }

    fn intercepts(&self, path: &str) -> bool {
        path.trim_matches('/') == self.shared.callback_path
    }

    /// Phase 1: stage the widget's data under its identifier.
    pub async fn save(&self, body: &[u8], cancel: &CancellationToken) -> AuthResult<()> {
        let (uuid, payload) = stage_payload(body)?;
        self.shared.store.set(&uuid, payload, cancel).await?;
        tracing::debug!("Staged authorization data");
        Ok(())
    }

    /// Phase 2: take the staged data and verify the token.
    ///
    /// The entry is consumed before verification, so a rejected token
    /// cannot be retried without the widget staging again.
    pub async fn authorize(
        &self,
        token: &str,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<Vec<u8>> {
        if token.is_empty() {
            return Err(AuthError::validation("bearer token", "is required"));
        }
        if identifier.is_empty() {
            return Err(AuthError::validation(UUID_FIELD, "is not provided"));
        }

        let payload = self.shared.store.get(identifier, cancel).await?;

        if let Err(e) = self.shared.verifier.verify(token, identifier).await {
            tracing::warn!(transport = e.is_transport(), error = %e, "Token verification failed");
            return Err(e.into());
        }

        tracing::debug!("Authorization data delivered");
        Ok(payload)
    }

    /// Notify the observer and build the client-facing error response.
    fn fail(&self, err: &AuthError, phase: Phase) -> Response {
        tracing::warn!(phase = ?phase, error = %err, "OneAccount callback failed");

        if let Some(listener) = &self.shared.on_error {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(err))).is_err() {
                tracing::error!("OneAccount error listener panicked");
            }
        }

        (
            err.status(),
            [(header::X_CONTENT_TYPE_OPTIONS, "nosniff")],
            Json(serde_json::json!({ "error": err.to_user_message(phase) })),
        )
            .into_response()
    }
}

impl std::fmt::Debug for OneAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneAccount")
            .field("callback_path", &self.shared.callback_path)
            .field("has_error_listener", &self.shared.on_error.is_some())
            .finish()
    }
}

/// axum middleware entry point, for use with
/// [`axum::middleware::from_fn_with_state`].
pub async fn authenticate(State(oa): State<OneAccount>, request: Request, next: Next) -> Response {
    if !oa.intercepts(request.uri().path()) {
        return next.run(request).await;
    }

    let cancel = oa.shared.shutdown.child_token();
    let limit = oa.shared.max_body_bytes;

    let token = bearer_token(request.headers()).map(str::to_owned);
    let Some(token) = token else {
        let body = match axum::body::to_bytes(request.into_body(), limit).await {
            Ok(body) => body,
            Err(e) => return oa.fail(&AuthError::malformed_body(e.to_string()), Phase::Stage),
        };
        return match oa.save(&body, &cancel).await {
            Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
            Err(e) => oa.fail(&e, Phase::Stage),
        };
    };

    let header_identifier = request
        .headers()
        .get(UUID_FIELD)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    let (identifier, mut request) = match header_identifier {
        Some(identifier) => (identifier, request),
        None => {
            let (parts, body) = request.into_parts();
            let body = match axum::body::to_bytes(body, limit).await {
                Ok(body) => body,
                Err(e) => {
                    return oa.fail(&AuthError::malformed_body(e.to_string()), Phase::Authorize);
                }
            };
            let identifier = identifier_from_body(&body).unwrap_or_default();
            (identifier, Request::from_parts(parts, Body::from(body)))
        }
    };

    match oa.authorize(&token, &identifier, &cancel).await {
        Ok(payload) => {
            request.extensions_mut().insert(OneAccountData(Bytes::from(payload)));
            next.run(request).await
        }
        Err(e) => oa.fail(&e, Phase::Authorize),
    }
}

/// Data recovered by a successful authorization.
///
/// The only value the middleware adds to request extensions. Holds the
/// staged JSON object without its reserved fields. As an extractor it
/// rejects with `401` when the request was not authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneAccountData(pub Bytes);

impl OneAccountData {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Deserialize the recovered JSON object.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for OneAccountData {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Recovered data attached to a request, if it was authorized.
#[must_use]
pub fn data(extensions: &Extensions) -> Option<&Bytes> {
    extensions.get::<OneAccountData>().map(|d| &d.0)
}

/// Whether the request completed the authorize phase.
#[must_use]
pub fn is_authenticated(extensions: &Extensions) -> bool {
    extensions.get::<OneAccountData>().is_some()
}
