//! Network interception: stubbed replies and aliased request spies
//!
//! Stands in for the dashboard's backend. The page layer hands every
//! outgoing request to [`Interceptor::handle`]; matching routes either reply
//! with a stub or let the upstream response through, and aliased routes
//! record the exchange so scenarios can [`Interceptor::wait`] on it.

use std::collections::HashMap;

use backoffice_recurse::{PollConfig, Poller, ProbeErrorPolicy};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{E2eError, E2eResult};

/// Canned reply for a stubbed route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubReply {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: Value,
}

impl InterceptedRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl From<StubReply> for InterceptedResponse {
    fn from(stub: StubReply) -> Self {
        Self {
            status: stub.status,
            body: stub.body,
        }
    }
}

/// One request/response pair recorded under an alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Position among all recorded exchanges, starting at 0
    pub seq: u64,
    pub alias: String,
    pub request: InterceptedRequest,
    pub response: Option<InterceptedResponse>,
}

/// A method + URL glob with an optional alias and stub
#[derive(Debug, Clone)]
pub struct Route {
    method: String,
    pattern: String,
    matcher: Regex,
    alias: Option<String>,
    reply: Option<StubReply>,
}

impl Route {
    /// `method` may be `*` for any method. In `pattern`, `**` matches
    /// anything and `*` matches anything but `/`.
    pub fn new(method: &str, pattern: &str) -> E2eResult<Self> {
        let matcher = glob_to_regex(pattern).map_err(|e| E2eError::InvalidRoute {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            method: method.to_ascii_uppercase(),
            pattern: pattern.to_string(),
            matcher,
            alias: None,
            reply: None,
        })
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn reply(mut self, status: u16, body: Value) -> Self {
        self.reply = Some(StubReply { status, body });
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, method: &str, url: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method)) && self.matcher.is_match(url)
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                re.push_str(".*");
            } else {
                re.push_str("[^/]*");
            }
        } else {
            re.push_str(&regex::escape(&c.to_string()));
        }
    }
    re.push('$');
    Regex::new(&re)
}

#[derive(Debug, Default)]
struct InterceptState {
    routes: Vec<Route>,
    exchanges: Vec<Exchange>,
    /// Exchanges already handed out by `wait`, per alias
    consumed: HashMap<String, usize>,
}

/// Route registry and exchange log for one scenario
#[derive(Debug, Default)]
pub struct Interceptor {
    state: Mutex<InterceptState>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Later routes take precedence over earlier ones.
    pub fn route(&self, route: Route) {
        debug!(
            method = %route.method,
            pattern = %route.pattern,
            alias = route.alias.as_deref().unwrap_or("-"),
            stubbed = route.reply.is_some(),
            "Registered route"
        );
        self.state.lock().routes.push(route);
    }

    /// Route a request. Returns the stub of the matching route, otherwise
    /// `upstream`. Exchanges on aliased routes are recorded.
    pub fn handle(
        &self,
        request: InterceptedRequest,
        upstream: Option<InterceptedResponse>,
    ) -> Option<InterceptedResponse> {
        let mut state = self.state.lock();
        let Some(route) = state
            .routes
            .iter()
            .rev()
            .find(|r| r.matches(&request.method, &request.url))
        else {
            trace!(method = %request.method, url = %request.url, "Unmatched request passed through");
            return upstream;
        };

        let response = match &route.reply {
            Some(stub) => Some(InterceptedResponse::from(stub.clone())),
            None => upstream,
        };

        if let Some(alias) = route.alias.clone() {
            let seq = state.exchanges.len() as u64;
            trace!(alias = %alias, seq, url = %request.url, "Recorded exchange");
            state.exchanges.push(Exchange {
                seq,
                alias,
                request,
                response: response.clone(),
            });
        }

        response
    }

    /// Every exchange recorded under `alias`, oldest first
    pub fn all(&self, alias: &str) -> Vec<Exchange> {
        self.state
            .lock()
            .exchanges
            .iter()
            .filter(|e| e.alias == alias)
            .cloned()
            .collect()
    }

    /// The oldest exchange under `alias` not yet returned by a wait
    pub fn take_next(&self, alias: &str) -> E2eResult<Exchange> {
        let mut state = self.state.lock();
        let consumed = state.consumed.get(alias).copied().unwrap_or(0);
        let next = state
            .exchanges
            .iter()
            .filter(|e| e.alias == alias)
            .nth(consumed)
            .cloned();

        match next {
            Some(exchange) => {
                state.consumed.insert(alias.to_string(), consumed + 1);
                Ok(exchange)
            }
            None => Err(E2eError::NotYetObserved(alias.to_string())),
        }
    }

    /// Wait for the next exchange under `alias`.
    ///
    /// Successive waits return successive exchanges. A request that has not
    /// arrived yet is polled for until the config's deadline, whatever the
    /// config's probe-error policy says.
    pub async fn wait(&self, alias: &str, config: &PollConfig) -> E2eResult<Exchange> {
        if !self.has_alias(alias) {
            return Err(E2eError::StepFailed {
                step: format!("wait:@{}", alias),
                reason: "no route registered under this alias".to_string(),
            });
        }

        let config = config.clone().with_probe_errors(ProbeErrorPolicy::Tolerant);
        let poller = Poller::new(format!("@{}", alias), config);
        let exchange = poller
            .until(|| std::future::ready(self.take_next(alias)), |_| Ok(true))
            .await?;
        Ok(exchange)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.state
            .lock()
            .routes
            .iter()
            .any(|r| r.alias.as_deref() == Some(alias))
    }

    /// Drop all routes and recorded exchanges
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = InterceptState::default();
    }
}
