//! Interceptors attached to both API clients.

use crate::auth::SessionWriter;
use crate::http::{ApiError, ApiRequest, ApiResponse, Interceptor};
use crate::navigation::Navigator;
use crate::session::SessionStore;
use crate::transcript::SharedTranscript;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Attaches `Authorization: Token <t>` from the session store to every request
pub struct AuthHeader {
    store: Rc<dyn SessionStore>,
}

impl AuthHeader {
    pub fn new(store: Rc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

impl Interceptor for AuthHeader {
    fn before_request(&self, request: &mut ApiRequest) {
        if let Some(token) = self.store.token() {
            request.set_header("Authorization", &format!("Token {}", token));
        }
    }
}

/// On any 401: clear the store, reset the session and go back to `/`.
/// The error itself still reaches the caller.
pub struct UnauthorizedReset {
    store: Rc<dyn SessionStore>,
    session: SessionWriter,
    navigator: Rc<Navigator>,
    transcript: SharedTranscript,
}

impl UnauthorizedReset {
    pub fn new(
        store: Rc<dyn SessionStore>,
        session: SessionWriter,
        navigator: Rc<Navigator>,
        transcript: SharedTranscript,
    ) -> Self {
        Self {
            store,
            session,
            navigator,
            transcript,
        }
    }
}

impl Interceptor for UnauthorizedReset {
    fn on_error(&self, request: &ApiRequest, error: &ApiError) {
        if !matches!(error, ApiError::Unauthorized) {
            return;
        }
        if let Err(e) = self.store.clear() {
            eprintln!("Warning: failed to clear saved session: {}", e);
        }
        self.session.reset();
        self.navigator.redirect_root();
        let _ = self
            .transcript
            .borrow_mut()
            .session_reset("unauthorized", &request.path);
    }
}

/// Writes every request outcome to the transcript; traces to stderr when
/// verbose
pub struct RequestLog {
    transcript: SharedTranscript,
    verbose: Cell<bool>,
}

impl RequestLog {
    pub fn new(transcript: SharedTranscript, verbose: bool) -> Self {
        Self {
            transcript,
            verbose: Cell::new(verbose),
        }
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.set(verbose);
    }

    pub fn verbose(&self) -> bool {
        self.verbose.get()
    }
}

impl Interceptor for RequestLog {
    fn on_response(&self, request: &ApiRequest, response: &ApiResponse, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        if self.verbose.get() {
            eprintln!(
                "[HTTP] {} {} -> {} ({} ms)",
                request.method.as_str(),
                request.url,
                response.status,
                ms
            );
        }
        let _ = self.transcript.borrow_mut().request(
            request.method.as_str(),
            &request.path,
            response.status,
            ms,
        );
    }

    fn on_error(&self, request: &ApiRequest, error: &ApiError) {
        if self.verbose.get() {
            eprintln!(
                "[HTTP] {} {} failed: {}",
                request.method.as_str(),
                request.url,
                error
            );
        }
        let _ = self.transcript.borrow_mut().request_failed(
            request.method.as_str(),
            &request.path,
            &error.to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MockTransport;
    use crate::http::{ApiClient, ApiClients};
    use crate::session::{MemorySessionStore, User};
    use crate::transcript::Transcript;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn user() -> User {
        User {
            id: 1,
            username: "u".to_string(),
            email: None,
            is_staff: false,
        }
    }

    #[test]
    fn test_auth_header_follows_store() {
        let transport = MockTransport::new();
        transport.respond(200, json!([]));
        transport.respond(200, json!([]));
        let store = Rc::new(MemorySessionStore::new());
        let client = ApiClient::new("http://x/api", transport.clone())
            .with_interceptor(Rc::new(AuthHeader::new(store.clone())));

        let _: Value = client.get("products/").unwrap();
        store.save("abc", &user()).unwrap();
        let _: Value = client.get("products/").unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].header("Authorization"), None);
        assert_eq!(requests[1].header("Authorization"), Some("Token abc"));
    }

    #[test]
    fn test_401_on_either_client_resets_session() {
        for token in ["T1", "another-token"] {
            let transport = MockTransport::new();
            transport.respond(401, json!({"detail": "Invalid token."}));
            transport.respond(401, json!({"detail": "Invalid token."}));

            let store = Rc::new(MemorySessionStore::new());
            store.save(token, &user()).unwrap();
            let navigator = Rc::new(Navigator::new());
            navigator.go("/orders");
            let (writer, reader) = SessionWriter::create();
            let transcript = Transcript::disabled("t").shared();

            let interceptors: Vec<Rc<dyn Interceptor>> = vec![
                Rc::new(AuthHeader::new(store.clone())),
                Rc::new(UnauthorizedReset::new(
                    store.clone(),
                    writer,
                    navigator.clone(),
                    transcript,
                )),
            ];
            let clients = ApiClients::new(
                "http://x/api",
                "http://x/api/admin",
                transport.clone(),
                &interceptors,
            );

            let err = clients.api.get::<Value>("orders/listorders/").unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized));
            assert!(store.load().is_none());
            assert_eq!(navigator.location(), "/");
            assert!(!reader.is_authenticated());

            // A second 401 in flight repeats the reset harmlessly
            let err = clients.admin.get::<Value>("orders/").unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized));
            assert!(store.load().is_none());
            assert_eq!(navigator.location(), "/");
        }
    }

    #[test]
    fn test_non_401_errors_leave_session_alone() {
        let transport = MockTransport::new();
        transport.respond(403, json!({"detail": "forbidden"}));
        let store = Rc::new(MemorySessionStore::new());
        store.save("T1", &user()).unwrap();
        let navigator = Rc::new(Navigator::new());
        navigator.go("/cart");
        let (writer, _reader) = SessionWriter::create();
        let client = ApiClient::new("http://x/api", transport).with_interceptor(Rc::new(
            UnauthorizedReset::new(
                store.clone(),
                writer,
                navigator.clone(),
                Transcript::disabled("t").shared(),
            ),
        ));

        assert!(client.get::<Value>("carts/current/").is_err());
        assert_eq!(store.token().as_deref(), Some("T1"));
        assert_eq!(navigator.location(), "/cart");
    }

    #[test]
    fn test_request_log_writes_transcript() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let transcript = Transcript::new(&path, "run").unwrap().shared();
        let transport = MockTransport::new();
        transport.respond(200, json!([]));
        transport.respond(500, json!({"detail": "boom"}));
        let client = ApiClient::new("http://x/api", transport)
            .with_interceptor(Rc::new(RequestLog::new(transcript, false)));

        let _: Value = client.get("products/").unwrap();
        let _ = client.get::<Value>("categories/");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["type"], "request");
        assert_eq!(lines[0]["path"], "products/");
        assert_eq!(lines[1]["type"], "request_failed");
        assert!(lines[1]["error"].as_str().unwrap().contains("500"));
        assert!(!content.contains("Authorization"));
    }
}
