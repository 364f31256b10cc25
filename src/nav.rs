// Client navigation surface
// A protected workspace root, login and signup entry points, and a catch-all
// back to the root

use crate::auth::{SessionGuard, SessionState};

/// Navigable destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The protected root
    Workspace,
    Login,
    Signup,
}

impl Route {
    /// Resolve a path; unknown paths fall through to the protected root
    pub fn parse(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            _ => Route::Workspace,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Workspace)
    }
}

/// Gates navigation on the locally evaluated session state.
///
/// The guard runs on every navigation, not once at startup, since elapsed
/// time alone can invalidate the session. An unauthorized navigation to a
/// protected route redirects to login and records the requested destination
/// so a successful login can return there.
pub struct Navigator {
    guard: SessionGuard,
    state: SessionState,
    pending: Option<Route>,
}

impl Navigator {
    pub fn new(guard: SessionGuard) -> Self {
        Self {
            guard,
            state: SessionState::Unknown,
            pending: None,
        }
    }

    /// Most recently evaluated session state. `Unknown` until the first
    /// navigation completes.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Navigate, returning the route that actually renders
    pub fn navigate(&mut self, to: Route) -> Route {
        self.state = self.guard.evaluate();

        if to.is_protected() && self.state != SessionState::Authorized {
            self.pending = Some(to);
            return Route::Login;
        }
        to
    }

    /// Destination to resume after a successful login
    pub fn take_pending(&mut self) -> Route {
        self.pending.take().unwrap_or(Route::Workspace)
    }
}
