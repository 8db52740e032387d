//! Scripted inference backend.
//!
//! Replays queued [`ScriptStep`]s in order, then repeats its fallback step
//! forever. Counts invocations and keeps every prompt it was given.

use crate::error::CallError;
use crate::resilience::InferenceBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(String),
    /// Transient overload signal
    Unavailable,
    /// Non-transient rejection, e.g. an invalid credential
    Reject,
    /// Sleep, then behave like the inner step
    Delay(Duration, Box<ScriptStep>),
}

impl ScriptStep {
    pub fn reply(text: impl Into<String>) -> Self {
        ScriptStep::Reply(text.into())
    }

    pub fn delayed(delay: Duration, then: ScriptStep) -> Self {
        ScriptStep::Delay(delay, Box::new(then))
    }
}

#[derive(Debug)]
pub struct ScriptedBackend {
    id: String,
    script: Mutex<VecDeque<ScriptStep>>,
    fallback: ScriptStep,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// A backend that reports unavailable until told otherwise
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptStep::Unavailable,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-shot step
    pub fn then(self, step: ScriptStep) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Step repeated once the queue is empty
    pub fn always(mut self, step: ScriptStep) -> Self {
        self.fallback = step;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, prompt: &str) -> Result<String, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        let mut step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        loop {
            match step {
                ScriptStep::Reply(text) => return Ok(text),
                ScriptStep::Unavailable => {
                    return Err(CallError::Unavailable(format!("{} is overloaded", self.id)))
                }
                ScriptStep::Reject => {
                    return Err(CallError::Rejected(format!("{} rejected the credential", self.id)))
                }
                ScriptStep::Delay(delay, then) => {
                    tokio::time::sleep(delay).await;
                    step = *then;
                }
            }
        }
    }
}
