//! Scripted doubles for the dispatcher's injected capabilities.

use crate::dialog::{ConfirmPrompt, DialogProvider, SelectPrompt};
use crate::error::TransportError;
use crate::model::{OperationRequest, ResourceListing, Route, Verb};
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

type Scripted = Result<serde_json::Value, TransportError>;

/// Transport answering from per-(verb, route) queues and recording every call.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<(Verb, Route), VecDeque<Scripted>>>,
    calls: Mutex<Vec<OperationRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, verb: Verb, route: Route, result: Scripted) -> Self {
        self.responses
            .lock()
            .entry((verb, route))
            .or_default()
            .push_back(result);
        self
    }

    pub(crate) fn listing(self, route: Route, names: &[&str], paths: &[&str]) -> Self {
        let listing = listing(names, paths);
        self.respond(Verb::Get, route, Ok(serde_json::to_value(listing).unwrap()))
    }

    pub(crate) fn message(self, verb: Verb, route: Route, message: &str) -> Self {
        self.respond(verb, route, Ok(serde_json::json!({ "message": message })))
    }

    pub(crate) fn fail(self, verb: Verb, route: Route, status: u16, reason: &str) -> Self {
        self.respond(
            verb,
            route,
            Err(TransportError::Backend {
                status,
                reason: reason.to_string(),
            }),
        )
    }

    pub(crate) fn calls(&self) -> Vec<OperationRequest> {
        self.calls.lock().clone()
    }

    /// `(verb, route)` of every call, in order.
    pub(crate) fn call_routes(&self) -> Vec<(&'static str, &'static str)> {
        self.calls
            .lock()
            .iter()
            .map(|c| (c.verb.as_str(), c.route.as_str()))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &OperationRequest) -> Scripted {
        self.calls.lock().push(request.clone());
        self.responses
            .lock()
            .get_mut(&(request.verb, request.route))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::Network(format!(
                    "no scripted response for {} {}",
                    request.verb, request.route
                )))
            })
    }
}

/// Dialogs answering from queues. An exhausted queue behaves like a dismissal.
#[derive(Default)]
pub(crate) struct ScriptedDialogs {
    selections: Mutex<VecDeque<Option<String>>>,
    confirmations: Mutex<VecDeque<bool>>,
    pub(crate) select_prompts: Mutex<Vec<(SelectPrompt, Vec<String>)>>,
    pub(crate) confirm_prompts: Mutex<Vec<ConfirmPrompt>>,
    pub(crate) informed: Mutex<Vec<(String, String)>>,
}

impl ScriptedDialogs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn select(self, label: &str) -> Self {
        self.selections.lock().push_back(Some(label.to_string()));
        self
    }

    pub(crate) fn dismiss_select(self) -> Self {
        self.selections.lock().push_back(None);
        self
    }

    pub(crate) fn confirm(self, accept: bool) -> Self {
        self.confirmations.lock().push_back(accept);
        self
    }

    pub(crate) fn dialog_count(&self) -> usize {
        self.select_prompts.lock().len() + self.confirm_prompts.lock().len()
    }
}

#[async_trait]
impl DialogProvider for ScriptedDialogs {
    async fn select(&self, prompt: &SelectPrompt, items: &[String]) -> Option<String> {
        self.select_prompts.lock().push((prompt.clone(), items.to_vec()));
        self.selections.lock().pop_front().flatten()
    }

    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.confirm_prompts.lock().push(prompt.clone());
        self.confirmations.lock().pop_front().unwrap_or(false)
    }

    async fn inform(&self, title: &str, body: &str) {
        self.informed.lock().push((title.to_string(), body.to_string()));
    }
}

pub(crate) fn listing(names: &[&str], paths: &[&str]) -> ResourceListing {
    ResourceListing::new(
        names.iter().map(|s| s.to_string()).collect(),
        paths.iter().map(|s| s.to_string()).collect(),
    )
}
