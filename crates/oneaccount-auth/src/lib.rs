//! OneAccount Authentication Middleware
//!
//! Two-phase, out-of-band authentication for axum applications. The
//! OneAccount widget posts user data to a callback endpoint; later the
//! client resumes on the same endpoint with a bearer token, which is
//! verified remotely before the staged data is handed to the application.
//!
//! # Features
//!
//! - **Pluggable staging**: in-memory TTL store by default, any [`Store`]
//!   or a pair of async setter/getter functions otherwise
//! - **At-most-once delivery**: pickup is destructive and atomic
//! - **Self-cleaning**: a background sweep evicts abandoned entries
//! - **Quiet failures**: clients get short messages, details go to tracing
//!   and an optional error listener
//!
//! # Example
//!
//! ```no_run
//! use oneaccount_auth::{Collaborators, Config, OneAccount};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let oa = OneAccount::new(config, Collaborators::default())?;
//!
//!     let app: axum::Router = axum::Router::new()
//!         .layer(axum::middleware::from_fn_with_state(oa, oneaccount_auth::authenticate));
//!     # let _ = app;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod payload;
pub mod store;
pub mod verify;

pub use config::Config;
pub use error::{AuthError, StoreError, VerifyError};
pub use middleware::{
    Collaborators, ErrorListener, OneAccount, OneAccountData, authenticate, data, is_authenticated,
};
pub use store::{AdapterStore, Store, TtlStore};
pub use verify::{HttpVerifier, Verifier};
