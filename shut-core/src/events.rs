//! Synchronous event notification around task execution.

use crate::graph::TaskKey;
use crate::task::Task;

/// Event emitted after a task entered [`crate::TaskStatus::Running`].
pub const TASK_BEGIN: &str = "task.begin";
/// Event emitted after a task reached its terminal status.
pub const TASK_END: &str = "task.end";

/// The task an event is about.
#[derive(Debug, Clone, Copy)]
pub struct TaskRef<'a> {
    pub key: TaskKey,
    pub id: &'a str,
    pub task: &'a Task,
}

/// Callback receiving every `(event_name, task)` pair in the order events are triggered.
///
/// Invoked on the thread that triggered the event; there is no buffering or filtering.
pub type EventSink = Box<dyn FnMut(&str, TaskRef<'_>)>;
