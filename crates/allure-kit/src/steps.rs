//! Step helpers over the current execution context.
//!
//! Steps form a flat sequence: calling a helper inside another helper's
//! closure records two sibling steps, outer first.

use crate::context::{lock, SharedContext, StepId, StepStatus};
use crate::propagation::ContextStore;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Message recorded for steps interrupted by a panic
pub const PANICKED_MESSAGE: &str = "step panicked";

/// A running step that completes when finished or when unwound by a panic.
///
/// Dropping an unfinished guard outside a panic (for example when its future
/// is cancelled) leaves the step without an end time.
#[derive(Debug)]
#[must_use = "an unfinished step never gets an end time"]
pub struct StepGuard {
    context: SharedContext,
    id: StepId,
    name: String,
    started: Instant,
    finished: bool,
}

impl StepGuard {
    /// Id of the underlying step
    #[must_use]
    pub const fn id(&self) -> StepId {
        self.id
    }

    /// Complete as passed
    pub fn pass(self) {
        self.finish(StepStatus::Passed, None);
    }

    /// Complete as failed with a message
    pub fn fail(self, message: impl Into<String>) {
        self.finish(StepStatus::Failed, Some(message.into()));
    }

    /// Complete with an explicit status
    pub fn finish(mut self, status: StepStatus, message: Option<String>) {
        self.complete(status, message);
    }

    fn complete(&mut self, status: StepStatus, message: Option<String>) {
        self.finished = true;
        lock(&self.context).complete_step(self.id, status, message);
        debug!(
            step = %self.name,
            %status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "step finished"
        );
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            self.complete(StepStatus::Failed, Some(PANICKED_MESSAGE.to_string()));
        } else {
            debug!(step = %self.name, "step abandoned without completion");
        }
    }
}

/// Start a step on the current execution
pub fn begin_step(name: impl Into<String>, description: Option<&str>) -> StepGuard {
    begin_step_in(&ContextStore::current(), name, description)
}

/// Start a step on an explicit context
pub fn begin_step_in(
    context: &SharedContext,
    name: impl Into<String>,
    description: Option<&str>,
) -> StepGuard {
    let name = name.into();
    let id = lock(context).add_step(name.clone(), description.map(str::to_string));
    StepGuard {
        context: SharedContext::clone(context),
        id,
        name,
        started: Instant::now(),
        finished: false,
    }
}

/// Run `f` as a step: passed on `Ok`, failed with the error's message on `Err`.
/// The result is returned unchanged.
pub fn run_step<T, E: Display>(
    name: impl Into<String>,
    description: Option<&str>,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let guard = begin_step(name, description);
    let result = f();
    settle(guard, &result);
    result
}

/// Run an infallible closure as a step; only a panic marks it failed
pub fn step<T>(name: impl Into<String>, f: impl FnOnce() -> T) -> T {
    let guard = begin_step(name, None);
    let value = f();
    guard.pass();
    value
}

/// Async counterpart of [`run_step`]
pub async fn run_step_async<T, E: Display>(
    name: impl Into<String>,
    description: Option<&str>,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let guard = begin_step(name, description);
    let result = future.await;
    settle(guard, &result);
    result
}

fn settle<T, E: Display>(guard: StepGuard, result: &Result<T, E>) {
    match result {
        Ok(_) => guard.pass(),
        Err(err) => guard.fail(err.to_string()),
    }
}

/// Step for a UI interaction: "`{action} {element}`"
pub fn ui_step<T, E: Display>(
    action: &str,
    element: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    run_step(
        format!("{action} {element}"),
        Some(format!("UI Interaction: {action} on {element}").as_str()),
        f,
    )
}

/// Step for an API request: "`{method} {endpoint}`"
pub fn api_step<T, E: Display>(
    method: &str,
    endpoint: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    run_step(
        format!("{method} {endpoint}"),
        Some(format!("API Request: {method} {endpoint}").as_str()),
        f,
    )
}

/// Step for a verification: "Verify {what}"
pub fn verification_step<T, E: Display>(what: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    run_step(format!("Verify {what}"), Some(format!("Verification: {what}").as_str()), f)
}

/// Step for data setup: "Prepare {what}"
pub fn data_preparation_step<T, E: Display>(
    what: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    run_step(format!("Prepare {what}"), Some(format!("Data Preparation: {what}").as_str()), f)
}
