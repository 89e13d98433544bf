//! Scripted in-memory transport for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use driveup_common::{Error, Result};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

enum Responder {
    Queue(Mutex<VecDeque<Result<HttpResponse>>>),
    Handler(Handler),
}

/// Transport that answers from a script and records every request.
///
/// Useful for testing. Nothing touches the network.
pub struct ScriptedTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Answer requests with `responses`, in order. Once the script runs out
    /// every further request fails with a network error.
    pub fn with_responses(responses: impl IntoIterator<Item = Result<HttpResponse>>) -> Self {
        Self {
            responder: Responder::Queue(Mutex::new(responses.into_iter().collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request by calling `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Responder::Handler(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let outcome = match &self.responder {
            Responder::Queue(queue) => queue.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(Error::Network(format!(
                    "No scripted response for {} {}",
                    request.method, request.url
                )))
            }),
            Responder::Handler(handler) => handler(&request),
        };

        self.requests.lock().unwrap().push(request);
        outcome
    }
}
