//! Session and authorization controller.
//!
//! The in-memory `Session` lives in a shared cell. Writing goes through
//! `SessionWriter`, which only the controller and the 401 handler hold; every
//! other part of the program gets a `SessionReader` and sees snapshots.

use crate::http::{ApiClients, ApiError};
use crate::schema::{AuthResponse, LoginRequest, RegisterRequest};
use crate::session::{SessionStore, User};
use crate::transcript::SharedTranscript;
use std::cell::RefCell;
use std::rc::Rc;

/// The current user's authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    /// Only meaningful once `admin_checked` is true
    pub is_admin: bool,
    pub admin_checked: bool,
    pub loading: bool,
}

impl Session {
    /// The state at process start, before hydration
    pub fn initial() -> Self {
        Self {
            token: None,
            user: None,
            is_admin: false,
            admin_checked: false,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn admin_status(&self) -> AdminStatus {
        if !self.admin_checked {
            AdminStatus::Unverified
        } else if self.is_admin {
            AdminStatus::Admin
        } else {
            AdminStatus::NotAdmin
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStatus {
    Unverified,
    Admin,
    NotAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Hydrating,
    Anonymous,
    Authenticated(AdminStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Uninitialized,
    Hydrating,
    Ready,
}

struct Shared {
    session: Session,
    stage: Stage,
    /// Bumped whenever the token changes
    generation: u64,
}

/// Read-only view of the session
#[derive(Clone)]
pub struct SessionReader {
    inner: Rc<RefCell<Shared>>,
}

impl SessionReader {
    pub fn snapshot(&self) -> Session {
        self.inner.borrow().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.borrow().session.is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.borrow().session.user.clone()
    }

    pub fn phase(&self) -> Phase {
        let shared = self.inner.borrow();
        match shared.stage {
            Stage::Uninitialized => Phase::Uninitialized,
            Stage::Hydrating => Phase::Hydrating,
            Stage::Ready if shared.session.is_authenticated() => {
                Phase::Authenticated(shared.session.admin_status())
            }
            Stage::Ready => Phase::Anonymous,
        }
    }
}

/// Write capability over the session
#[derive(Clone)]
pub struct SessionWriter {
    inner: Rc<RefCell<Shared>>,
}

impl SessionWriter {
    /// Create the process-wide session and its two capabilities
    pub fn create() -> (SessionWriter, SessionReader) {
        let inner = Rc::new(RefCell::new(Shared {
            session: Session::initial(),
            stage: Stage::Uninitialized,
            generation: 0,
        }));
        (
            SessionWriter {
                inner: inner.clone(),
            },
            SessionReader { inner },
        )
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            inner: self.inner.clone(),
        }
    }

    fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    fn token(&self) -> Option<String> {
        self.inner.borrow().session.token.clone()
    }

    fn begin_hydration(&self) {
        self.inner.borrow_mut().stage = Stage::Hydrating;
    }

    fn finish_loading(&self) {
        let mut shared = self.inner.borrow_mut();
        shared.stage = Stage::Ready;
        shared.session.loading = false;
    }

    /// Replace token and user together; admin status becomes unknown
    fn adopt(&self, token: String, user: User) {
        let mut shared = self.inner.borrow_mut();
        shared.generation += 1;
        shared.session.token = Some(token);
        shared.session.user = Some(user);
        shared.session.is_admin = false;
        shared.session.admin_checked = false;
    }

    /// Clear token and user together. With no token the admin answer is
    /// known without asking: not admin.
    pub fn reset(&self) {
        let mut shared = self.inner.borrow_mut();
        if shared.session.token.is_some() {
            shared.generation += 1;
        }
        shared.session.token = None;
        shared.session.user = None;
        shared.session.is_admin = false;
        shared.session.admin_checked = true;
    }

    /// Record an admin check result obtained for `generation`. A result for a
    /// token that has since been replaced is dropped; if the token is gone,
    /// the fail-closed answer applies.
    fn apply_admin(&self, generation: u64, granted: bool) {
        let mut shared = self.inner.borrow_mut();
        if shared.generation == generation {
            shared.session.is_admin = granted;
            shared.session.admin_checked = true;
        } else if shared.session.token.is_none() {
            shared.session.is_admin = false;
            shared.session.admin_checked = true;
        }
    }
}

/// Orchestrates login, registration, logout and the admin check
pub struct AuthController {
    session: SessionWriter,
    store: Rc<dyn SessionStore>,
    clients: Rc<ApiClients>,
    transcript: SharedTranscript,
}

impl AuthController {
    pub fn new(
        session: SessionWriter,
        store: Rc<dyn SessionStore>,
        clients: Rc<ApiClients>,
        transcript: SharedTranscript,
    ) -> Self {
        Self {
            session,
            store,
            clients,
            transcript,
        }
    }

    pub fn reader(&self) -> SessionReader {
        self.session.reader()
    }

    pub fn session(&self) -> Session {
        self.session.reader().snapshot()
    }

    /// Adopt the persisted session, if any. Ends with `loading = false`.
    pub fn hydrate(&self) {
        self.session.begin_hydration();

        match self.store.load() {
            Some(stored) => self.session.adopt(stored.token, stored.user),
            None => {
                // A half-written or corrupt record must not keep feeding a
                // token to the request interceptor.
                if self.store.has_residue() {
                    if let Err(e) = self.store.clear() {
                        eprintln!("Warning: failed to clear stale session: {}", e);
                    }
                }
                self.session.reset();
            }
        }

        self.session.finish_loading();
        let authenticated = self.reader().is_authenticated();
        let _ = self.transcript.borrow_mut().hydrated(authenticated);
    }

    pub fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        if username.trim().is_empty() {
            return Err(ApiError::invalid("username", "must not be empty"));
        }
        if password.is_empty() {
            return Err(ApiError::invalid("password", "must not be empty"));
        }
        let response: AuthResponse = self
            .clients
            .api
            .post("auth/login/", &LoginRequest { username, password })?;
        self.establish("login", response)
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<User, ApiError> {
        if username.trim().is_empty() {
            return Err(ApiError::invalid("username", "must not be empty"));
        }
        if !email.contains('@') {
            return Err(ApiError::invalid("email", format!("'{}' is not an email address", email)));
        }
        if password.is_empty() {
            return Err(ApiError::invalid("password", "must not be empty"));
        }
        let response: AuthResponse = self.clients.api.post(
            "auth/register/",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )?;
        self.establish("register", response)
    }

    /// Persist and adopt a fresh token, then verify admin status for it
    fn establish(&self, kind: &str, response: AuthResponse) -> Result<User, ApiError> {
        let response = response.validate()?;
        let user = response.to_user();

        if let Err(e) = self.store.save(&response.token, &user) {
            // A half-written record would still feed its token to AuthHeader
            let _ = self.store.clear();
            return Err(e.into());
        }
        self.session.adopt(response.token, user.clone());
        let _ = self
            .transcript
            .borrow_mut()
            .signed_in(kind, &user.username, user.id);

        self.check_admin_status();
        Ok(user)
    }

    /// Drop the session locally. No request is made.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            eprintln!("Warning: failed to clear saved session: {}", e);
        }
        self.session.reset();
        let _ = self.transcript.borrow_mut().logout();
    }

    /// Ask the backend whether the current token is an admin's. Any 2xx is a
    /// yes; any failure is a no. Returns the resulting `is_admin`.
    pub fn check_admin_status(&self) -> bool {
        if self.session.token().is_none() {
            self.session.reset();
            let _ = self.transcript.borrow_mut().admin_check(false, false);
            return false;
        }

        let generation = self.session.generation();
        let request = self.clients.api.request(crate::http::Method::Get, "admin/me/");
        let granted = self.clients.api.execute(request).is_ok();
        self.session.apply_admin(generation, granted);

        let _ = self.transcript.borrow_mut().admin_check(granted, true);
        self.reader().snapshot().is_admin
    }

    /// Run the admin check unless it already completed for this token
    pub fn ensure_admin_checked(&self) -> bool {
        let session = self.session();
        if session.admin_checked {
            return session.is_admin;
        }
        self.check_admin_status()
    }
}
