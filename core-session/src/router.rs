//! Route table and guarded navigation.

use crate::{
    error::{NavigationError, Result},
    guard::{GuardDecision, RouteGuard, RouteMeta},
};
use core_runtime::events::{CoreEvent, EventBus, NavigationEvent};
use std::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub path: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
}

impl RouteDef {
    pub fn new(path: impl Into<String>, name: Option<&str>, meta: RouteMeta) -> Self {
        Self {
            path: path.into(),
            name: name.map(str::to_string),
            meta,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteDef) -> Self {
        self.routes.push(route);
        self
    }

    /// Pages of the Datafy web client.
    pub fn datafy() -> Self {
        Self::new()
            .with_route(RouteDef::new("/", Some("DataProcessor"), RouteMeta::AUTH))
            .with_route(RouteDef::new(
                "/dashboard-builder",
                Some("DashboardBuilder"),
                RouteMeta::OPEN,
            ))
            .with_route(RouteDef::new("/register", Some("Register"), RouteMeta::GUEST))
            .with_route(RouteDef::new("/login", None, RouteMeta::GUEST))
            .with_route(RouteDef::new("/about", Some("About"), RouteMeta::OPEN))
            .with_route(RouteDef::new(
                "/saved-reports",
                Some("SavedReports"),
                RouteMeta::AUTH,
            ))
            .with_route(RouteDef::new("/settings", Some("Settings"), RouteMeta::OPEN))
            .with_route(RouteDef::new("/support", Some("support"), RouteMeta::OPEN))
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteDef> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    /// Metadata for `path`; unknown paths are open.
    pub fn meta_for(&self, path: &str) -> RouteMeta {
        self.resolve(path).map(|r| r.meta).unwrap_or_default()
    }
}

/// Strip query, fragment and trailing slash.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Resolves paths, applies the guard and follows its redirects.
pub struct Router {
    table: RouteTable,
    guard: RouteGuard,
    event_bus: EventBus,
    max_redirects: usize,
    current: RwLock<Option<String>>,
}

impl Router {
    pub fn new(
        table: RouteTable,
        guard: RouteGuard,
        event_bus: EventBus,
        max_redirects: usize,
    ) -> Self {
        Self {
            table,
            guard,
            event_bus,
            max_redirects,
            current: RwLock::new(None),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Path of the last completed navigation.
    pub fn current_path(&self) -> Option<String> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Navigate to `path` and return where the navigation settled.
    pub async fn navigate(&self, path: &str) -> Result<String> {
        let requested = normalize(path).to_string();
        let mut target = requested.clone();
        let mut hops = 0;

        loop {
            let meta = self.table.meta_for(&target);

            match self.guard.check(&meta).await {
                GuardDecision::Proceed => break,
                GuardDecision::Redirect(to) => {
                    hops += 1;
                    if hops > self.max_redirects {
                        warn!(path = %requested, hops, "Redirect loop detected");
                        return Err(NavigationError::RedirectLoop {
                            path: requested,
                            hops,
                        });
                    }

                    debug!(from = %target, to = %to, "Guard redirected navigation");
                    let _ = self
                        .event_bus
                        .emit(CoreEvent::Navigation(NavigationEvent::Redirected {
                            from: target.clone(),
                            to: to.clone(),
                        }));
                    target = normalize(&to).to_string();
                }
            }
        }

        match self.current.write() {
            Ok(mut current) => *current = Some(target.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(target.clone()),
        }

        let name = self.table.resolve(&target).and_then(|r| r.name.clone());
        info!(path = %target, "Navigated");
        let _ = self
            .event_bus
            .emit(CoreEvent::Navigation(NavigationEvent::Navigated {
                path: target.clone(),
                name,
            }));

        Ok(target)
    }
}
