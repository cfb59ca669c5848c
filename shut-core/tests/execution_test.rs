use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;
use shut_core::{
    ActionContext, FailureKind, Outcome, Task, TaskAction, TaskGraph, TaskGroup, TaskStatus,
    TASK_BEGIN, TASK_END,
};

type EventLog = Rc<RefCell<Vec<(String, String, TaskStatus)>>>;

fn recording_graph() -> (TaskGraph, EventLog) {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink_log = Rc::clone(&log);
    let graph = TaskGraph::with_event_sink(move |event, task| {
        sink_log
            .borrow_mut()
            .push((event.to_string(), task.id.to_string(), task.task.status()));
    });
    (graph, log)
}

struct Counter {
    runs: Rc<RefCell<u32>>,
}

impl TaskAction for Counter {
    fn run(&mut self, _ctx: &ActionContext<'_>) -> Outcome {
        *self.runs.borrow_mut() += 1;
        Outcome::Completed
    }
}

#[test]
fn test_execute_success_emits_events() {
    let (mut graph, log) = recording_graph();
    let group = graph.create_group("build", None).unwrap();
    let key = graph
        .group_mut(group)
        .unwrap()
        .add_task(Task::noop("compile"))
        .unwrap();

    assert_eq!(graph.execute(key).unwrap(), TaskStatus::Success);
    assert_eq!(graph.task(key).unwrap().status(), TaskStatus::Success);
    assert_eq!(
        *log.borrow(),
        vec![
            (TASK_BEGIN.to_string(), "build:compile".to_string(), TaskStatus::Running),
            (TASK_END.to_string(), "build:compile".to_string(), TaskStatus::Success),
        ]
    );
}

#[test]
fn test_failure_is_recorded_and_end_event_emitted() {
    let (mut graph, log) = recording_graph();
    let key = graph
        .add_task(Task::from_fn("lint", |_| {
            Outcome::Failed(anyhow!("3 warnings"))
        }))
        .unwrap();

    assert_eq!(graph.execute(key).unwrap(), TaskStatus::Error);

    let task = graph.task(key).unwrap();
    let failure = task.error().unwrap();
    assert_eq!(failure.kind, FailureKind::Error);
    assert_eq!(failure.message, "3 warnings");

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1], (TASK_END.to_string(), "lint".to_string(), TaskStatus::Error));
}

#[test]
fn test_panicking_action_still_emits_end() {
    let (mut graph, log) = recording_graph();
    let key = graph
        .add_task(Task::from_fn("explode", |_| panic!("unexpected state")))
        .unwrap();

    assert_eq!(graph.execute(key).unwrap(), TaskStatus::Error);
    let failure = graph.task(key).unwrap().error().unwrap();
    assert_eq!(failure.kind, FailureKind::Panic);
    assert!(failure
        .backtrace
        .as_deref()
        .is_some_and(|origin| origin.contains("execution_test.rs")));
    assert_eq!(log.borrow().last().unwrap().0, TASK_END);
}

#[test]
fn test_skip_is_not_an_error() {
    let mut graph = TaskGraph::new();
    let key = graph
        .add_task(Task::from_fn("optional", |_| Outcome::Skipped))
        .unwrap();

    assert_eq!(graph.execute(key).unwrap(), TaskStatus::Skipped);
    assert!(graph.task(key).unwrap().error().is_none());
}

#[test]
fn test_action_receives_context() {
    let seen = Rc::new(RefCell::new(String::new()));
    let seen_in_action = Rc::clone(&seen);

    let mut graph = TaskGraph::new();
    let group = graph.create_group("g", None).unwrap();
    let key = graph
        .group_mut(group)
        .unwrap()
        .add_task(Task::from_fn("t", move |ctx| {
            *seen_in_action.borrow_mut() = format!("{}|{}", ctx.id, ctx.name);
            Outcome::Completed
        }))
        .unwrap();

    graph.execute(key).unwrap();
    assert_eq!(*seen.borrow(), "g:t|t");
}

#[test]
fn test_execute_twice_is_an_error() {
    let runs = Rc::new(RefCell::new(0));
    let mut graph = TaskGraph::new();
    let key = graph
        .add_task(Task::new(
            "once",
            Counter {
                runs: Rc::clone(&runs),
            },
        ))
        .unwrap();

    graph.execute(key).unwrap();
    let err = graph.execute(key).unwrap_err();
    assert!(err.to_string().contains("already executed"));
    assert_eq!(*runs.borrow(), 1);
    assert_eq!(graph.task(key).unwrap().status(), TaskStatus::Success);
}

#[test]
fn test_skip_marks_task_without_running_action() {
    let runs = Rc::new(RefCell::new(0));
    let (mut graph, log) = recording_graph();
    let key = graph
        .add_task(Task::new(
            "blocked",
            Counter {
                runs: Rc::clone(&runs),
            },
        ))
        .unwrap();

    graph.skip(key).unwrap();
    assert_eq!(graph.task(key).unwrap().status(), TaskStatus::Skipped);
    assert_eq!(*runs.borrow(), 0);
    assert_eq!(log.borrow().len(), 2);
    assert!(graph.execute(key).is_err());
}

#[test]
fn test_graph_frozen_after_execution() {
    let mut graph = TaskGraph::new();
    let first = graph.add_task(Task::noop("first")).unwrap();
    let second = graph.add_task(Task::noop("second")).unwrap();
    assert!(!graph.is_frozen());

    graph.execute(first).unwrap();
    assert!(graph.is_frozen());

    assert!(graph.add_task(Task::noop("late")).is_err());
    assert!(graph.add_group(TaskGroup::new("late")).is_err());
    assert!(graph.add_edge(first, second).is_err());
    assert_eq!(graph.len(), 2);

    // ordering stays available for the remaining run
    assert_eq!(graph.ordered_tasks().unwrap(), vec![first, second]);
}

#[test]
fn test_trigger_event_reaches_sink() {
    let (mut graph, log) = recording_graph();
    let key = graph.add_task(Task::noop("t")).unwrap();
    graph.trigger_event("custom", key).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![("custom".to_string(), "t".to_string(), TaskStatus::Pending)]
    );
}

#[test]
fn test_missing_sink_drops_events() {
    let mut graph = TaskGraph::new();
    let key = graph.add_task(Task::noop("t")).unwrap();
    graph.trigger_event("custom", key).unwrap();
    assert_eq!(graph.execute(key).unwrap(), TaskStatus::Success);
}
