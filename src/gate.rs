use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::domain::Role;

/// What the session provider reports. The gate never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub role: Option<Role>,
    pub is_loading_auth: bool,
}

impl Session {
    pub fn loading() -> Self {
        Session {
            role: None,
            is_loading_auth: true,
        }
    }

    pub fn resolved(role: Option<Role>) -> Self {
        Session {
            role,
            is_loading_auth: false,
        }
    }
}

/// Landing route per role, with a fallback for sessions without a known role.
#[derive(Debug, Clone)]
pub struct RedirectMap {
    routes: HashMap<Role, String>,
    fallback: String,
}

impl RedirectMap {
    pub fn new(fallback: impl Into<String>) -> Self {
        RedirectMap {
            routes: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with(mut self, role: Role, route: impl Into<String>) -> Self {
        self.routes.insert(role, route.into());
        self
    }

    pub fn landing(&self, role: Option<Role>) -> &str {
        role.and_then(|r| self.routes.get(&r))
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Authorized,
    Unauthorized,
}

#[derive(Debug)]
pub enum Gated<'a, P> {
    Loading,
    Page(&'a mut P),
    Redirect(String),
}

/// Wraps a page and only hands it out to sessions whose role is allowed.
pub struct RoleGate<P> {
    allowed: BTreeSet<Role>,
    state: GateState,
    page: P,
}

impl<P> RoleGate<P> {
    pub fn new(page: P, allowed: impl IntoIterator<Item = Role>) -> Self {
        RoleGate {
            allowed: allowed.into_iter().collect(),
            state: GateState::Loading,
            page,
        }
    }

    pub fn allows(&self, role: Option<Role>) -> bool {
        role.is_some_and(|r| self.allowed.contains(&r))
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Starts a new mount; the next evaluation decides again.
    pub fn mount(&mut self) {
        self.state = GateState::Loading;
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    /// Decides for the current session. An unauthorized gate stays
    /// unauthorized until mounted again.
    pub fn evaluate(&mut self, session: &Session, redirects: &RedirectMap) -> Gated<'_, P> {
        let next = match self.state {
            GateState::Unauthorized => GateState::Unauthorized,
            GateState::Loading if session.is_loading_auth => GateState::Loading,
            GateState::Authorized if session.is_loading_auth => GateState::Authorized,
            _ if self.allows(session.role) => GateState::Authorized,
            _ => GateState::Unauthorized,
        };
        if next != self.state {
            debug!("Role gate {:?} -> {:?} for role {:?}", self.state, next, session.role);
            self.state = next;
        }

        match self.state {
            GateState::Loading => Gated::Loading,
            GateState::Authorized => Gated::Page(&mut self.page),
            GateState::Unauthorized => {
                let target = redirects.landing(session.role).to_string();
                info!("Role {:?} not allowed here, redirecting to {}", session.role, target);
                Gated::Redirect(target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirects() -> RedirectMap {
        RedirectMap::new("/login")
            .with(Role::Doctor, "/doctor/patients")
            .with(Role::Nurse, "/nurse/patients")
    }

    #[test]
    fn allowed_role_renders_page() {
        let mut gate = RoleGate::new("nurse page", [Role::Nurse]);
        let session = Session::resolved(Some(Role::Nurse));
        assert!(matches!(
            gate.evaluate(&session, &redirects()),
            Gated::Page(p) if *p == "nurse page"
        ));
        assert_eq!(gate.state(), GateState::Authorized);
    }

    #[test]
    fn other_role_is_redirected_to_its_landing() {
        let mut gate = RoleGate::new("nurse page", [Role::Nurse]);
        let session = Session::resolved(Some(Role::Doctor));
        assert!(matches!(
            gate.evaluate(&session, &redirects()),
            Gated::Redirect(path) if path == "/doctor/patients"
        ));
    }

    #[test]
    fn loading_session_waits() {
        let mut gate = RoleGate::new("nurse page", [Role::Nurse]);
        assert!(matches!(
            gate.evaluate(&Session::loading(), &redirects()),
            Gated::Loading
        ));
        assert_eq!(gate.state(), GateState::Loading);
    }

    #[test]
    fn missing_or_unmapped_role_falls_back() {
        let mut gate = RoleGate::new((), [Role::Nurse]);
        assert!(matches!(
            gate.evaluate(&Session::resolved(None), &redirects()),
            Gated::Redirect(path) if path == "/login"
        ));

        let mut gate = RoleGate::new((), [Role::Nurse]);
        assert!(matches!(
            gate.evaluate(&Session::resolved(Some(Role::Asha)), &redirects()),
            Gated::Redirect(path) if path == "/login"
        ));
    }

    #[test]
    fn role_downgrade_revokes_access_until_remount() {
        let mut gate = RoleGate::new((), [Role::Admin]);
        gate.evaluate(&Session::resolved(Some(Role::Admin)), &redirects());
        assert_eq!(gate.state(), GateState::Authorized);

        // token refresh in flight keeps the page
        gate.evaluate(&Session::loading(), &redirects());
        assert_eq!(gate.state(), GateState::Authorized);

        gate.evaluate(&Session::resolved(Some(Role::Nurse)), &redirects());
        assert_eq!(gate.state(), GateState::Unauthorized);
        gate.evaluate(&Session::resolved(Some(Role::Admin)), &redirects());
        assert_eq!(gate.state(), GateState::Unauthorized);

        gate.mount();
        gate.evaluate(&Session::resolved(Some(Role::Admin)), &redirects());
        assert_eq!(gate.state(), GateState::Authorized);
    }
}
