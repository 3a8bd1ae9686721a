//! Execution-scoped binding of the current [`ExecutionContext`].
//!
//! Async executions run inside [`ContextStore::scope`], which installs a
//! task-local slot that follows the future across `.await` points and worker
//! threads. A spawned tokio task without a scope is keyed by its task id, so
//! it keeps one context wherever it is resumed. Synchronous code falls back
//! to a thread-local slot. Either way, two concurrent executions never see
//! each other's context.
//!
//! ```no_run
//! use allure_kit::{ContextStore, context::lock};
//!
//! # async fn example() {
//! ContextStore::scope(async {
//!     lock(&ContextStore::current()).add_step("Open home page", None);
//!
//!     // Spawned work keeps reporting into the same test
//!     let child = tokio::spawn(ContextStore::propagate(async {
//!         lock(&ContextStore::current()).add_step("Load cart", None);
//!     }));
//!     child.await.ok();
//! })
//! .await;
//! # }
//! ```

use crate::context::{ExecutionContext, SharedContext};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tokio::task::Id as TaskId;
use tracing::{debug, warn};

tokio::task_local! {
    static TASK_SLOT: RefCell<Option<SharedContext>>;
}

thread_local! {
    static THREAD_SLOT: RefCell<Option<SharedContext>> = const { RefCell::new(None) };
}

/// Contexts of spawned tasks running without a scope, keyed by task id
static UNSCOPED_TASKS: LazyLock<Mutex<HashMap<TaskId, SharedContext>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn unscoped_tasks() -> MutexGuard<'static, HashMap<TaskId, SharedContext>> {
    UNSCOPED_TASKS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn in_task_scope() -> bool {
    TASK_SLOT.try_with(|_| ()).is_ok()
}

/// Where the binding of the calling execution lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Inside a [`ContextStore::scope`]
    Task,
    /// Spawned tokio task without a scope, keyed by its task id
    UnscopedTask,
    /// Plain thread, no task
    Thread,
}

/// Access to the context of the calling logical execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStore;

impl ContextStore {
    /// Context of the calling execution, created on first access
    #[must_use]
    pub fn current() -> SharedContext {
        let from_task = TASK_SLOT.try_with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(|| {
                    debug!("creating execution context for task");
                    ExecutionContext::shared()
                })
                .clone()
        });
        if let Ok(context) = from_task {
            return context;
        }

        if let Some(id) = tokio::task::try_id() {
            return unscoped_tasks()
                .entry(id)
                .or_insert_with(|| {
                    debug!(task = %id, "creating execution context for unscoped task");
                    ExecutionContext::shared()
                })
                .clone();
        }

        THREAD_SLOT.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(|| {
                    if tokio::runtime::Handle::try_current().is_ok() {
                        warn!(
                            thread = ?std::thread::current().id(),
                            "binding execution context to a runtime thread; wrap async tests in ContextStore::scope"
                        );
                    } else {
                        debug!(thread = ?std::thread::current().id(), "creating execution context for thread");
                    }
                    ExecutionContext::shared()
                })
                .clone()
        })
    }

    /// Context of the calling execution without creating one
    #[must_use]
    pub fn try_current() -> Option<SharedContext> {
        if let Ok(context) = TASK_SLOT.try_with(|slot| slot.borrow().clone()) {
            return context;
        }
        if let Some(id) = tokio::task::try_id() {
            return unscoped_tasks().get(&id).cloned();
        }
        THREAD_SLOT.with(|slot| slot.borrow().clone())
    }

    /// Which slot serves the calling execution
    #[must_use]
    pub fn binding() -> Binding {
        if in_task_scope() {
            Binding::Task
        } else if tokio::task::try_id().is_some() {
            Binding::UnscopedTask
        } else {
            Binding::Thread
        }
    }

    /// Bind an existing context to the calling execution
    pub fn bind(context: SharedContext) {
        let mut pending = Some(context);
        let bound = TASK_SLOT.try_with(|slot| {
            *slot.borrow_mut() = pending.take();
        });
        if bound.is_ok() {
            return;
        }
        match (tokio::task::try_id(), pending) {
            (Some(id), Some(context)) => {
                unscoped_tasks().insert(id, context);
            }
            (None, pending) => THREAD_SLOT.with(|slot| *slot.borrow_mut() = pending),
            (Some(_), None) => {}
        }
    }

    /// Drop the binding of the calling execution
    pub fn reset() {
        if TASK_SLOT.try_with(|slot| slot.borrow_mut().take()).is_ok() {
            return;
        }
        if let Some(id) = tokio::task::try_id() {
            unscoped_tasks().remove(&id);
        } else {
            THREAD_SLOT.with(|slot| slot.borrow_mut().take());
        }
    }

    /// Run a future as a new logical execution with its own empty slot
    pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
        TASK_SLOT.scope(RefCell::new(None), future)
    }

    /// Run a future as a new logical execution bound to `context`
    pub fn scope_with<F: Future>(context: SharedContext, future: F) -> impl Future<Output = F::Output> {
        TASK_SLOT.scope(RefCell::new(Some(context)), future)
    }

    /// Wrap a future so it continues the calling execution (e.g. before `tokio::spawn`)
    pub fn propagate<F: Future>(future: F) -> impl Future<Output = F::Output> {
        Self::scope_with(Self::current(), future)
    }

    /// Run a closure as a new synchronous execution with its own empty slot.
    ///
    /// The previous thread binding is restored afterwards, even on panic.
    pub fn run_isolated<R>(f: impl FnOnce() -> R) -> R {
        struct Restore(Option<SharedContext>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                THREAD_SLOT.with(|slot| *slot.borrow_mut() = previous);
            }
        }

        let previous = THREAD_SLOT.with(|slot| slot.borrow_mut().take());
        let _restore = Restore(previous);
        TASK_SLOT.sync_scope(RefCell::new(None), f)
    }

    /// Whether two handles refer to the same execution
    #[must_use]
    pub fn same(a: &SharedContext, b: &SharedContext) -> bool {
        Arc::ptr_eq(a, b)
    }
}
