//! Application context and bootstrap.
//!
//! [`AppContext`] is the one place the client core is assembled: it takes an
//! [`AppConfig`] (host bridges plus settings), builds the identity provider,
//! the backend client, the session store, the router and the dataset cache,
//! and wires the forced-logout path between the API client and the session
//! store: a `401` clears the session before the host is redirected.
//! Desktop apps typically enable the `desktop-shims` feature so
//! missing bridges fall back to the `bridge-desktop` implementations.
//!
//! ```no_run
//! use bridge_desktop::ChannelNavigator;
//! use core_runtime::config::AppConfigBuilder;
//! use core_service::AppContext;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_service::Result<()> {
//! let (navigator, _redirects) = ChannelNavigator::new();
//! let config = AppConfigBuilder::from_env()
//!     .navigator(Arc::new(navigator))
//!     .build()?;
//!
//! let app = AppContext::start(config).await?;
//! let landed = app.router().navigate("/").await?;
//! println!("showing {landed}");
//!
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use core_api::{ApiClient, AuthBackend, BackendApi, SessionRevoker};
use core_auth::{FederatedCredentialSource, FirebaseIdentityProvider, IdentityProvider};
use core_dataset::DatasetStore;
use core_runtime::config::AppConfig;
use core_runtime::events::EventBus;
use core_session::{RouteGuard, RouteTable, Router, SessionPolicy, SessionStore};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builder for [`AppContext`] with optional overrides.
pub struct AppContextBuilder {
    config: AppConfig,
    identity: Option<Arc<dyn IdentityProvider>>,
    federated: Option<Arc<dyn FederatedCredentialSource>>,
    routes: Option<RouteTable>,
}

impl AppContextBuilder {
    /// Use a custom identity provider instead of Firebase.
    pub fn identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Enable Google sign-in on the default Firebase provider.
    pub fn federated_source(mut self, source: Arc<dyn FederatedCredentialSource>) -> Self {
        self.federated = Some(source);
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Assemble the context. Must run inside a Tokio runtime.
    pub async fn build(self) -> Result<AppContext> {
        let config = self.config;
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let identity: Arc<dyn IdentityProvider> = match self.identity {
            Some(identity) => identity,
            None => {
                let mut firebase = FirebaseIdentityProvider::new(
                    config.identity.clone(),
                    config.http_client.clone(),
                    config.secure_store.clone(),
                );
                if let Some(source) = self.federated {
                    firebase = firebase.with_federated_source(source);
                }
                Arc::new(firebase)
            }
        };

        let api = Arc::new(ApiClient::from_config(
            &config,
            identity.clone(),
            event_bus.clone(),
        )?);
        let backend = BackendApi::new(api.clone());

        let session = Arc::new(
            SessionStore::new(
                identity.clone(),
                event_bus.clone(),
                SessionPolicy::from(&config.session),
            )
            .with_backend(Arc::new(backend.clone()) as Arc<dyn AuthBackend>),
        );
        api.attach_revoker(Arc::downgrade(&session) as Weak<dyn SessionRevoker>);
        let listener = session.spawn_revocation_listener(&event_bus);

        let guard = RouteGuard::new(
            session.clone(),
            config.session.login_path.clone(),
            config.session.home_path.clone(),
        );
        let router = Arc::new(Router::new(
            self.routes.unwrap_or_else(RouteTable::datafy),
            guard,
            event_bus.clone(),
            config.session.max_redirects,
        ));

        let dataset = Arc::new(
            DatasetStore::load(config.settings_store.clone())
                .await?
                .with_event_bus(event_bus.clone()),
        );

        info!(api = %api.base_url(), "Application context started");

        Ok(AppContext {
            config,
            event_bus,
            identity,
            api,
            backend,
            session,
            router,
            dataset,
            listener: Mutex::new(Some(listener)),
        })
    }
}

/// Everything a host needs to drive the Datafy client core.
pub struct AppContext {
    config: AppConfig,
    event_bus: EventBus,
    identity: Arc<dyn IdentityProvider>,
    api: Arc<ApiClient>,
    backend: BackendApi,
    session: Arc<SessionStore>,
    router: Arc<Router>,
    dataset: Arc<DatasetStore>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    pub fn builder(config: AppConfig) -> AppContextBuilder {
        AppContextBuilder {
            config,
            identity: None,
            federated: None,
            routes: None,
        }
    }

    /// Build a context with the default Firebase provider and route table.
    pub async fn start(config: AppConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn backend(&self) -> &BackendApi {
        &self.backend
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn dataset(&self) -> &Arc<DatasetStore> {
        &self.dataset
    }

    /// Stop background tasks. Safe to call more than once.
    pub async fn shutdown(&self) {
        let handle = match self.listener.lock() {
            Ok(mut listener) => listener.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(handle) = handle {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Revocation listener ended abnormally");
                }
            }
            info!("Application context shut down");
        } else {
            debug!("Application context already shut down");
        }
    }
}
