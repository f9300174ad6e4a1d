//! Test doubles for the transport seam.
//!
//! Shipped in-tree so both unit tests and the integration-tests crate can
//! script backend behavior without a server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::TransportError;

/// One scripted reply.
enum Reply {
    Response(HttpResponse),
    Error(TransportError),
}

impl Reply {
    fn clone_out(&self) -> Result<HttpResponse, TransportError> {
        match self {
            Self::Response(response) => Ok(response.clone()),
            // TransportError is not Clone; synthesize an equivalent.
            Self::Error(error) => Err(TransportError::Connection(error.to_string())),
        }
    }
}

/// A route rule: consumed FIFO from `queue`, then `sticky` forever.
struct Rule {
    method: Method,
    path: String,
    queue: VecDeque<Reply>,
    sticky: Option<Reply>,
    /// When set, each matching request takes one permit before replying.
    /// Lets tests hold a call (e.g. the refresh) in flight deterministically.
    gate: Option<Arc<Semaphore>>,
}

impl Rule {
    fn matches(&self, request: &HttpRequest) -> bool {
        request.method == self.method && path_of(&request.url).starts_with(&self.path)
    }
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Scripted transport: replies per route, records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one JSON reply for a route. Matching is by method plus path
    /// prefix (query strings ignored).
    pub fn respond(&self, method: Method, path: &str, status: u16, body: &Value) {
        self.push(method, path, Reply::Response(json_response(status, body)), false);
    }

    /// Set the reply a route falls back to once its queue is drained.
    pub fn always(&self, method: Method, path: &str, status: u16, body: &Value) {
        self.push(method, path, Reply::Response(json_response(status, body)), true);
    }

    /// Queue a connection-level failure for a route.
    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(
            method,
            path,
            Reply::Error(TransportError::Connection(message.to_string())),
            false,
        );
    }

    /// Gate a route: each matching request must take a permit from the
    /// returned semaphore before its reply is produced. Start with zero
    /// permits and `add_permits` to release held calls.
    #[must_use]
    pub fn gate(&self, method: Method, path: &str) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        let mut rules = self.lock_rules();
        if let Some(rule) = rules
            .iter_mut()
            .find(|rule| rule.method == method && rule.path == path)
        {
            rule.gate = Some(Arc::clone(&semaphore));
        } else {
            rules.push(Rule {
                method,
                path: path.to_string(),
                queue: VecDeque::new(),
                sticky: None,
                gate: Some(Arc::clone(&semaphore)),
            });
        }
        semaphore
    }

    /// Every request seen so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many requests matched a method and path prefix.
    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == *method && path_of(&request.url).starts_with(path))
            .count()
    }

    fn push(&self, method: Method, path: &str, reply: Reply, sticky: bool) {
        let mut rules = self.lock_rules();
        if let Some(existing) = rules
            .iter_mut()
            .find(|rule| rule.method == method && rule.path == path)
        {
            Self::store_reply(existing, reply, sticky);
            return;
        }

        let mut rule = Rule {
            method,
            path: path.to_string(),
            queue: VecDeque::new(),
            sticky: None,
            gate: None,
        };
        Self::store_reply(&mut rule, reply, sticky);
        rules.push(rule);
    }

    fn store_reply(rule: &mut Rule, reply: Reply, sticky: bool) {
        if sticky {
            rule.sticky = Some(reply);
        } else {
            rule.queue.push_back(reply);
        }
    }

    fn lock_rules(&self) -> std::sync::MutexGuard<'_, Vec<Rule>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_reply(&self, request: &HttpRequest) -> (Option<Arc<Semaphore>>, Result<HttpResponse, TransportError>) {
        let mut rules = self.lock_rules();
        let Some(rule) = rules.iter_mut().find(|rule| rule.matches(request)) else {
            return (
                None,
                Err(TransportError::Connection(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                ))),
            );
        };

        let gate = rule.gate.clone();
        let reply = rule.queue.pop_front().map_or_else(
            || {
                rule.sticky.as_ref().map_or_else(
                    || {
                        Err(TransportError::Connection(format!(
                            "scripted responses exhausted for {} {}",
                            request.method, request.url
                        )))
                    },
                    Reply::clone_out,
                )
            },
            |reply| reply.clone_out(),
        );

        (gate, reply)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let (gate, reply) = self.take_reply(&request);

        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| TransportError::Connection("gate closed".to_string()))?;
            permit.forget();
        }

        reply
    }
}

/// Build a JSON response.
#[must_use]
pub fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}
