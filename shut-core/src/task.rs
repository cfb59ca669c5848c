//! Tasks, their status lifecycle and the actions they run.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use serde::Serialize;

use crate::error::{Error, Result};

/// Lifecycle state of a task.
///
/// `Pending -> Running -> {Success, Skipped, Error}`; the last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Skipped,
    Success,
    Error,
}

impl TaskStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Skipped | TaskStatus::Success | TaskStatus::Error
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a task's action reports back to the scheduler.
#[derive(Debug)]
pub enum Outcome {
    /// The action did its work.
    Completed,
    /// The action opted out of doing any work. Not an error.
    Skipped,
    /// The action failed; the error is recorded on the task.
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Outcome::Failed(error.into())
    }
}

impl From<anyhow::Result<()>> for Outcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Completed,
            Err(error) => Outcome::Failed(error),
        }
    }
}

/// Read-only information handed to an action while it runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Full identifier of the running task.
    pub id: &'a str,
    /// Short name of the running task.
    pub name: &'a str,
}

/// The unit of work a task performs when executed.
///
/// Closures of the form `FnMut(&ActionContext) -> Outcome` implement this trait.
pub trait TaskAction {
    fn run(&mut self, ctx: &ActionContext<'_>) -> Outcome;
}

impl<F> TaskAction for F
where
    F: FnMut(&ActionContext<'_>) -> Outcome,
{
    fn run(&mut self, ctx: &ActionContext<'_>) -> Outcome {
        self(ctx)
    }
}

/// Broad classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The action returned an error.
    Error,
    /// The action returned an error caused by an I/O failure.
    Io,
    /// The action panicked.
    Panic,
}

/// Failure descriptor captured on a task whose action failed.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Underlying causes, outermost first, excluding `message` itself.
    pub causes: Vec<String>,
    /// Where the failure originated: the error's captured backtrace, or for a panic its
    /// location (followed by a backtrace when `RUST_BACKTRACE` enables one).
    pub backtrace: Option<String>,
}

impl TaskFailure {
    pub fn from_error(error: &anyhow::Error) -> Self {
        let kind = if error.chain().any(|cause| cause.is::<std::io::Error>()) {
            FailureKind::Io
        } else {
            FailureKind::Error
        };

        let backtrace = error.backtrace();
        let backtrace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            kind,
            message: error.to_string(),
            causes: error.chain().skip(1).map(|c| c.to_string()).collect(),
            backtrace,
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>, origin: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };

        Self {
            kind: FailureKind::Panic,
            message,
            causes: Vec::new(),
            backtrace: origin,
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

thread_local! {
    static PANIC_ORIGIN: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs, once per process, a panic hook that records the origin of each panic for the
/// panicking thread before delegating to the previously installed hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|location| location.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let backtrace = Backtrace::capture();
            let origin = match backtrace.status() {
                BacktraceStatus::Captured => format!("panicked at {}\n{}", location, backtrace),
                _ => format!("panicked at {}", location),
            };
            PANIC_ORIGIN.with(|slot| *slot.borrow_mut() = Some(origin));
            previous(info);
        }));
    });
}

fn take_panic_origin() -> Option<String> {
    PANIC_ORIGIN.with(|slot| slot.borrow_mut().take())
}

/// A named unit of work with a one-shot status lifecycle.
///
/// A task is created detached and becomes part of a graph when it is added to the graph or to one
/// of its groups; the graph takes ownership of it from then on.
pub struct Task {
    name: String,
    status: TaskStatus,
    error: Option<TaskFailure>,
    action: Box<dyn TaskAction>,
    pub(crate) parent: Option<usize>,
}

impl Task {
    pub fn new(name: impl Into<String>, action: impl TaskAction + 'static) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
            error: None,
            action: Box::new(action),
            parent: None,
        }
    }

    /// Creates a task from a closure, letting the compiler infer the argument type.
    pub fn from_fn<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnMut(&ActionContext<'_>) -> Outcome + 'static,
    {
        Self::new(name, action)
    }

    /// Creates a task whose action does nothing and completes.
    pub fn noop(name: impl Into<String>) -> Self {
        Self::new(name, |_: &ActionContext<'_>| Outcome::Completed)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// The failure recorded when the task ended in [`TaskStatus::Error`].
    #[inline]
    pub fn error(&self) -> Option<&TaskFailure> {
        self.error.as_ref()
    }

    pub(crate) fn begin(&mut self, id: &str) -> Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(Error::AlreadyExecuted {
                id: id.to_string(),
                status: self.status.to_string(),
            });
        }
        self.status = TaskStatus::Running;
        Ok(())
    }

    /// Runs the action and moves the task into its terminal status. Panics are caught and
    /// recorded like any other failure.
    pub(crate) fn run_action(&mut self, id: &str) -> TaskStatus {
        let ctx = ActionContext {
            id,
            name: &self.name,
        };
        let action = &mut self.action;
        install_panic_hook();
        take_panic_origin();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.run(&ctx)));

        let (status, error) = match outcome {
            Ok(Outcome::Completed) => (TaskStatus::Success, None),
            Ok(Outcome::Skipped) => (TaskStatus::Skipped, None),
            Ok(Outcome::Failed(err)) => (TaskStatus::Error, Some(TaskFailure::from_error(&err))),
            Err(payload) => (
                TaskStatus::Error,
                Some(TaskFailure::from_panic(payload, take_panic_origin())),
            ),
        };

        self.status = status;
        self.error = error;
        status
    }

    /// Completes a running task as skipped without invoking its action.
    pub(crate) fn mark_skipped(&mut self) {
        self.status = TaskStatus::Skipped;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::noop("build");
        assert_eq!(task.name(), "build");
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.error().is_none());
    }

    #[test]
    fn test_begin_rejects_second_run() {
        let mut task = Task::noop("build");
        task.begin("build").unwrap();
        assert_eq!(task.run_action("build"), TaskStatus::Success);

        let err = task.begin("build").unwrap_err();
        assert!(err.to_string().contains("already executed"));
        assert_eq!(task.status(), TaskStatus::Success);
    }

    #[test]
    fn test_failure_is_recorded() {
        let mut task = Task::new("fail", |_: &ActionContext<'_>| {
            Outcome::Failed(anyhow::anyhow!("boom").context("while building"))
        });
        task.begin("fail").unwrap();
        assert_eq!(task.run_action("fail"), TaskStatus::Error);

        let failure = task.error().unwrap();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "while building");
        assert_eq!(failure.causes, vec!["boom".to_string()]);
        assert_eq!(failure.to_string(), "while building: boom");
    }

    #[test]
    fn test_io_failure_kind() {
        let mut task = Task::new("io", |_: &ActionContext<'_>| {
            Outcome::failed(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
        });
        task.begin("io").unwrap();
        task.run_action("io");
        assert_eq!(task.error().unwrap().kind, FailureKind::Io);
    }

    #[test]
    fn test_panic_is_caught() {
        let mut task = Task::new("panics", |_: &ActionContext<'_>| -> Outcome {
            panic!("kaboom");
        });
        task.begin("panics").unwrap();
        assert_eq!(task.run_action("panics"), TaskStatus::Error);

        let failure = task.error().unwrap();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "kaboom");
        let origin = failure.backtrace.as_deref().unwrap();
        assert!(origin.starts_with("panicked at "));
        assert!(origin.contains("task.rs"));
    }

    #[test]
    fn test_outcome_from_result() {
        assert!(matches!(Outcome::from(Ok(())), Outcome::Completed));
        assert!(matches!(
            Outcome::from(Err(anyhow::anyhow!("x"))),
            Outcome::Failed(_)
        ));
    }
}
