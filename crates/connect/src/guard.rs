//! Route guard adapter.
//!
//! Runs one session resolution per activated view and turns the pure
//! [`guard`] decision into a navigation. Deactivating the handle before the
//! resolution settles cancels it; no redirect fires after deactivation.

use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::SessionResolver;
use brokerlink_core::guard::{
    guard, guard_on_failure, AccessPolicy, GuardDecision, GuardRoutes, Route,
};

/// Performs client-side navigation. Implemented by whatever drives the views.
pub trait Navigator: Send + Sync {
    /// Replaces the current location with `path`.
    fn replace(&self, path: &str);
}

/// Progress of a guard activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    /// Resolution in flight; protected content must not render.
    Loading,
    Allowed,
    Redirected(Route),
    /// Deactivated before resolution settled.
    Cancelled,
}

pub struct RouteGuard {
    resolver: Arc<SessionResolver>,
    navigator: Arc<dyn Navigator>,
    routes: GuardRoutes,
    timeout: Duration,
}

impl RouteGuard {
    pub fn new(
        resolver: Arc<SessionResolver>,
        navigator: Arc<dyn Navigator>,
        routes: GuardRoutes,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            navigator,
            routes,
            timeout,
        }
    }

    /// Starts resolution for a view declaring `policy`. Must be called from
    /// within a Tokio runtime.
    pub fn activate(&self, policy: AccessPolicy) -> GuardHandle {
        let (status_tx, status_rx) = watch::channel(GuardStatus::Loading);
        let shared = Arc::new(Shared {
            deactivated: Mutex::new(false),
            status: status_tx,
        });

        let task = {
            let shared = Arc::clone(&shared);
            let resolver = Arc::clone(&self.resolver);
            let navigator = Arc::clone(&self.navigator);
            let routes = self.routes.clone();
            let timeout = self.timeout;

            tokio::spawn(async move {
                let decision = match tokio::time::timeout(timeout, resolver.resolve()).await {
                    Ok(Ok(state)) => guard(policy, state.kind()),
                    Ok(Err(e)) => {
                        warn!("[RouteGuard] Session resolution failed: {}", e);
                        guard_on_failure(policy)
                    }
                    Err(_) => {
                        warn!("[RouteGuard] Session resolution timed out after {:?}", timeout);
                        guard_on_failure(policy)
                    }
                };
                shared.settle(decision, navigator.as_ref(), &routes);
            })
        };

        GuardHandle {
            shared,
            status: status_rx,
            task: Some(task),
        }
    }
}

struct Shared {
    deactivated: Mutex<bool>,
    status: watch::Sender<GuardStatus>,
}

impl Shared {
    fn settle(&self, decision: GuardDecision, navigator: &dyn Navigator, routes: &GuardRoutes) {
        // Held across navigation so that deactivation and redirect never interleave.
        let deactivated = self.deactivated.lock().unwrap_or_else(PoisonError::into_inner);
        if *deactivated {
            debug!("[RouteGuard] Dropping decision for a deactivated view");
            return;
        }

        let status = match decision {
            GuardDecision::Allow => GuardStatus::Allowed,
            GuardDecision::RedirectTo(route) => {
                let path = routes.path(route);
                debug!("[RouteGuard] Redirecting to {}", path);
                navigator.replace(path);
                GuardStatus::Redirected(route)
            }
        };
        self.status.send_replace(status);
    }
}

/// Handle to one guard activation. Dropping it deactivates the guard.
pub struct GuardHandle {
    shared: Arc<Shared>,
    status: watch::Receiver<GuardStatus>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    /// True until the resolution settles or the guard is deactivated.
    pub fn loading(&self) -> bool {
        *self.status.borrow() == GuardStatus::Loading
    }

    pub fn status(&self) -> GuardStatus {
        *self.status.borrow()
    }

    /// Waits until the activation leaves [`GuardStatus::Loading`].
    pub async fn wait(&mut self) -> GuardStatus {
        let settled = self
            .status
            .wait_for(|s| *s != GuardStatus::Loading)
            .await
            .map(|status| *status);
        settled.unwrap_or_else(|_| self.status())
    }

    /// Cancels a pending resolution. Idempotent.
    pub fn deactivate(&mut self) {
        {
            let mut deactivated = self
                .shared
                .deactivated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *deactivated {
                return;
            }
            *deactivated = true;
            self.shared.status.send_if_modified(|status| {
                if *status == GuardStatus::Loading {
                    *status = GuardStatus::Cancelled;
                    true
                } else {
                    false
                }
            });
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}
