//! Task graph management using petgraph.
//!
//! The graph owns every task and group added to it. Tasks and groups are addressed through
//! copyable [`TaskKey`] and [`GroupKey`] handles that remember which graph minted them, so a
//! handle from one graph is rejected by another.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, TaskRef, TASK_BEGIN, TASK_END};
use crate::group::{GroupMut, GroupView, TaskGroup};
use crate::ident;
use crate::task::{Task, TaskStatus};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct GraphId(u64);

/// Handle to a task owned by a [`TaskGraph`].
///
/// Keys order by registration, which is also the tie-breaking order used by
/// [`TaskGraph::ordered_tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    graph: GraphId,
    index: usize,
}

/// Handle to a group owned by a [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    graph: GraphId,
    index: usize,
}

/// Result of looking up an identifier; tasks and groups share one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    Task(TaskKey),
    Group(GroupKey),
}

/// Directed acyclic graph of tasks, organized into nestable groups.
///
/// An edge `a -> b` means `b` depends on `a`, i.e. `a` must run first.
pub struct TaskGraph {
    uid: GraphId,
    // Node `i` is the task at index `i` of `tasks`; nodes are never removed.
    dag: DiGraph<String, ()>,
    tasks: IndexMap<String, Task>,
    groups: IndexMap<String, TaskGroup>,
    event_sink: Option<EventSink>,
    frozen: bool,
    custom_data: Map<String, Value>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            uid: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
            dag: DiGraph::new(),
            tasks: IndexMap::new(),
            groups: IndexMap::new(),
            event_sink: None,
            frozen: false,
            custom_data: Map::new(),
        }
    }

    /// Creates a graph that reports `task.begin` / `task.end` events to `sink`.
    pub fn with_event_sink<F>(sink: F) -> Self
    where
        F: FnMut(&str, TaskRef<'_>) + 'static,
    {
        let mut graph = Self::new();
        graph.event_sink = Some(Box::new(sink));
        graph
    }

    /// Number of tasks in the graph, at any nesting depth.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a task has been executed, after which the structure can no longer change.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Free-form key/value bag for collaborators (e.g. which plugins were applied).
    #[inline]
    pub fn custom_data(&self) -> &Map<String, Value> {
        &self.custom_data
    }

    #[inline]
    pub fn custom_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.custom_data
    }

    /// Adds a task at the root level of the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or already used by a root task or group.
    pub fn add_task(&mut self, task: Task) -> Result<TaskKey> {
        self.attach_task(None, task)
    }

    /// Adds a group at the root level of the graph.
    pub fn add_group(&mut self, group: TaskGroup) -> Result<GroupKey> {
        self.attach_group(None, group)
    }

    /// Creates a group named `name` under `parent`, or at the root if `parent` is `None`.
    pub fn create_group(&mut self, name: &str, parent: Option<GroupKey>) -> Result<GroupKey> {
        let parent = parent.map(|key| self.group_index(key)).transpose()?;
        self.attach_group(parent, TaskGroup::new(name))
    }

    /// Returns a handle for adding children to an existing group.
    pub fn group_mut(&mut self, key: GroupKey) -> Result<GroupMut<'_>> {
        let index = self.group_index(key)?;
        Ok(GroupMut::new(self, index))
    }

    /// Records that `to` depends on `from`, so `from` is ordered first.
    ///
    /// Cycles are not checked here; they are reported by the ordering functions.
    ///
    /// # Errors
    ///
    /// Returns an error if either task belongs to another graph.
    pub fn add_edge(&mut self, from: TaskKey, to: TaskKey) -> Result<()> {
        self.ensure_mutable("add edges")?;
        let from = self.task_index(from)?;
        let to = self.task_index(to)?;
        self.dag
            .update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        debug!(from = %self.dag[NodeIndex::new(from)], to = %self.dag[NodeIndex::new(to)], "added dependency edge");
        Ok(())
    }

    /// Makes `task` depend on every task in `dependencies`.
    ///
    /// Every handle is checked before any edge is recorded, so a failed call leaves the graph
    /// unchanged.
    pub fn depends_on<I>(&mut self, task: TaskKey, dependencies: I) -> Result<()>
    where
        I: IntoIterator<Item = TaskKey>,
    {
        self.ensure_mutable("add edges")?;
        self.task_index(task)?;
        let dependencies: Vec<TaskKey> = dependencies
            .into_iter()
            .map(|dependency| self.task_index(dependency).map(|_| dependency))
            .collect::<Result<_>>()?;

        for dependency in dependencies {
            self.add_edge(dependency, task)?;
        }
        Ok(())
    }

    pub(crate) fn attach_task(&mut self, parent: Option<usize>, mut task: Task) -> Result<TaskKey> {
        self.ensure_mutable("add tasks")?;
        ident::validate_name(task.name())?;
        let id = self.child_id(parent, task.name(), "task")?;

        let index = self.tasks.len();
        task.parent = parent;
        let node = self.dag.add_node(id.clone());
        debug_assert_eq!(node.index(), index);

        if let Some(parent) = parent {
            self.groups[parent]
                .tasks
                .insert(task.name().to_string(), index);
        }
        debug!(id = %id, "registered task");
        self.tasks.insert(id, task);

        Ok(self.task_key_at(index))
    }

    pub(crate) fn attach_group(
        &mut self,
        parent: Option<usize>,
        mut group: TaskGroup,
    ) -> Result<GroupKey> {
        self.ensure_mutable("add groups")?;
        ident::validate_name(group.name())?;
        let id = self.child_id(parent, group.name(), "group")?;

        let index = self.groups.len();
        group.parent = parent;
        if let Some(parent) = parent {
            self.groups[parent]
                .groups
                .insert(group.name().to_string(), index);
        }
        debug!(id = %id, "registered group");
        self.groups.insert(id, group);

        Ok(self.group_key_at(index))
    }

    /// Computes the identifier a new child would get, rejecting sibling name collisions.
    fn child_id(&self, parent: Option<usize>, name: &str, kind: &'static str) -> Result<String> {
        let parent_id = parent.map(|index| self.group_id_at(index));
        let id = ident::join(parent_id.as_deref(), name);

        if self.tasks.contains_key(&id) || self.groups.contains_key(&id) {
            return Err(Error::DuplicateName {
                kind,
                name: name.to_string(),
                parent: parent_id
                    .map(|p| format!("group {:?}", p))
                    .unwrap_or_else(|| "graph".to_string()),
            });
        }

        Ok(id)
    }

    fn ensure_mutable(&self, action: &'static str) -> Result<()> {
        if self.frozen {
            return Err(Error::GraphFrozen(action));
        }
        Ok(())
    }

    /// Returns the identifier of a task, computed from its parent chain.
    pub fn identifier(&self, key: TaskKey) -> Result<String> {
        let index = self.task_index(key)?;
        let task = &self.tasks[index];
        Ok(self.resolve_id(task.name(), task.parent))
    }

    /// Returns the identifier of a group, computed from its parent chain.
    pub fn group_identifier(&self, key: GroupKey) -> Result<String> {
        let index = self.group_index(key)?;
        Ok(self.group_id_at(index))
    }

    pub(crate) fn group_id_at(&self, index: usize) -> String {
        let group = &self.groups[index];
        self.resolve_id(group.name(), group.parent)
    }

    fn resolve_id<'a>(&'a self, name: &'a str, parent: Option<usize>) -> String {
        ident::resolve(name, parent, |index| {
            let group = &self.groups[index];
            (group.name(), group.parent)
        })
    }

    pub fn task(&self, key: TaskKey) -> Result<&Task> {
        let index = self.task_index(key)?;
        Ok(&self.tasks[index])
    }

    /// The group a task was added to, or `None` for root tasks.
    pub fn task_parent(&self, key: TaskKey) -> Result<Option<GroupKey>> {
        let index = self.task_index(key)?;
        Ok(self.tasks[index].parent.map(|p| self.group_key_at(p)))
    }

    pub fn group(&self, key: GroupKey) -> Result<GroupView<'_>> {
        let index = self.group_index(key)?;
        Ok(GroupView::new(self, index))
    }

    pub(crate) fn group_at(&self, index: usize) -> &TaskGroup {
        &self.groups[index]
    }

    /// Resolves a full identifier to a task or group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing is registered under `id`.
    pub fn lookup(&self, id: &str) -> Result<Member> {
        if let Some(index) = self.groups.get_index_of(id) {
            return Ok(Member::Group(self.group_key_at(index)));
        }
        if let Some(index) = self.tasks.get_index_of(id) {
            return Ok(Member::Task(self.task_key_at(index)));
        }
        Err(self.not_found(id))
    }

    /// Resolves a full identifier that must name a task.
    pub fn task_key(&self, id: &str) -> Result<TaskKey> {
        self.tasks
            .get_index_of(id)
            .map(|index| self.task_key_at(index))
            .ok_or_else(|| self.not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id) || self.groups.contains_key(id)
    }

    fn not_found(&self, id: &str) -> Error {
        let available: Vec<&str> = self
            .groups
            .keys()
            .chain(self.tasks.keys())
            .map(String::as_str)
            .collect();
        Error::NotFound {
            id: id.to_string(),
            available: available.join(", "),
        }
    }

    /// All tasks with their identifiers, in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskKey, &str, &Task)> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .map(|(index, (id, task))| (self.task_key_at(index), id.as_str(), task))
    }

    /// All groups with their identifiers, in registration order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &str)> + '_ {
        self.groups
            .keys()
            .enumerate()
            .map(|(index, id)| (self.group_key_at(index), id.as_str()))
    }

    /// Groups added directly to the graph.
    pub fn root_groups(&self) -> impl Iterator<Item = GroupKey> + '_ {
        self.groups
            .values()
            .enumerate()
            .filter(|(_, group)| group.parent.is_none())
            .map(|(index, _)| self.group_key_at(index))
    }

    /// Direct dependencies of a task, in registration order.
    pub fn dependencies(&self, key: TaskKey) -> Result<Vec<TaskKey>> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Tasks that directly depend on `key`, in registration order.
    pub fn dependants(&self, key: TaskKey) -> Result<Vec<TaskKey>> {
        self.neighbors(key, Direction::Outgoing)
    }

    fn neighbors(&self, key: TaskKey, direction: Direction) -> Result<Vec<TaskKey>> {
        let index = self.task_index(key)?;
        let mut keys: Vec<TaskKey> = self
            .dag
            .neighbors_directed(NodeIndex::new(index), direction)
            .map(|node| self.task_key_at(node.index()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Resolves identifiers to the set of tasks they name.
    ///
    /// A task identifier selects that task; a group identifier selects every task nested under
    /// the group at any depth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown identifier.
    pub fn select<S: AsRef<str>>(&self, selection: &[S]) -> Result<BTreeSet<TaskKey>> {
        let mut indices = BTreeSet::new();
        for id in selection {
            match self.lookup(id.as_ref())? {
                Member::Task(key) => {
                    indices.insert(key.index);
                }
                Member::Group(key) => self.collect_group_tasks(key.index, &mut indices),
            }
        }
        Ok(indices
            .into_iter()
            .map(|index| self.task_key_at(index))
            .collect())
    }

    fn collect_group_tasks(&self, index: usize, out: &mut BTreeSet<usize>) {
        let group = &self.groups[index];
        out.extend(group.tasks.values().copied());
        for &child in group.groups.values() {
            self.collect_group_tasks(child, out);
        }
    }

    /// Returns every task in an order where dependencies come before their dependants.
    ///
    /// Tasks without a relative constraint keep registration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircularDependency`] if the graph contains a cycle.
    pub fn ordered_tasks(&self) -> Result<Vec<TaskKey>> {
        let nodes: FxHashSet<NodeIndex> = self.dag.node_indices().collect();
        self.topological_order(&nodes)
    }

    /// Returns the selected tasks plus all of their transitive dependencies, ordered.
    ///
    /// Tasks that merely depend on the selection are not included.
    pub fn ordered_selection<S: AsRef<str>>(&self, selection: &[S]) -> Result<Vec<TaskKey>> {
        let selected = self.select(selection)?;
        let nodes = self.dependency_closure(&selected);
        debug!(
            selected = selected.len(),
            closure = nodes.len(),
            "computed dependency closure"
        );
        self.topological_order(&nodes)
    }

    fn dependency_closure(&self, selected: &BTreeSet<TaskKey>) -> FxHashSet<NodeIndex> {
        let reversed = Reversed(&self.dag);
        let mut dfs = Dfs::empty(reversed);
        dfs.stack
            .extend(selected.iter().map(|key| NodeIndex::new(key.index)));

        let mut nodes = FxHashSet::default();
        while let Some(node) = dfs.next(reversed) {
            nodes.insert(node);
        }
        nodes
    }

    /// Kahn's algorithm over the subgraph induced by `nodes`, always releasing the
    /// earliest-registered ready task first.
    fn topological_order(&self, nodes: &FxHashSet<NodeIndex>) -> Result<Vec<TaskKey>> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut ready = BinaryHeap::new();

        for &node in nodes {
            let degree = self
                .dag
                .neighbors_directed(node, Direction::Incoming)
                .filter(|dep| nodes.contains(dep))
                .count();
            if degree == 0 {
                ready.push(Reverse(node.index()));
            }
            in_degree.insert(node, degree);
        }

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(self.task_key_at(index));
            for next in self
                .dag
                .neighbors_directed(NodeIndex::new(index), Direction::Outgoing)
            {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(next.index()));
                    }
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(self.cycle_error(nodes));
        }
        Ok(order)
    }

    fn cycle_error(&self, nodes: &FxHashSet<NodeIndex>) -> Error {
        let cycles: Vec<String> = tarjan_scc(&self.dag)
            .into_iter()
            .filter(|scc| scc.iter().all(|node| nodes.contains(node)))
            .filter(|scc| scc.len() > 1 || self.dag.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort();
                scc.iter()
                    .map(|node| self.dag[*node].as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();

        warn!(cycles = cycles.len(), "task graph contains a cycle");
        Error::CircularDependency(format!(
            "no valid task order exists. Cycle involving: {}",
            cycles.join("; ")
        ))
    }

    /// Executes a pending task and returns its terminal status.
    ///
    /// Emits `task.begin` once the task is running and `task.end` once its status is final,
    /// whatever the action's outcome. Action failures are recorded on the task, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExecuted`] if the task is not pending.
    pub fn execute(&mut self, key: TaskKey) -> Result<TaskStatus> {
        let index = self.task_index(key)?;
        let id = self.dag[NodeIndex::new(index)].clone();

        self.tasks[index].begin(&id)?;
        self.frozen = true;
        self.emit(TASK_BEGIN, index);

        let status = self.tasks[index].run_action(&id);
        match self.tasks[index].error() {
            Some(failure) => warn!(id = %id, kind = ?failure.kind, "task failed: {}", failure),
            None => info!(id = %id, status = %status, "task finished"),
        }

        self.emit(TASK_END, index);
        Ok(status)
    }

    /// Completes a pending task as [`TaskStatus::Skipped`] without invoking its action.
    ///
    /// Goes through the same begin/end events as [`TaskGraph::execute`].
    pub fn skip(&mut self, key: TaskKey) -> Result<()> {
        let index = self.task_index(key)?;
        let id = self.dag[NodeIndex::new(index)].clone();

        self.tasks[index].begin(&id)?;
        self.frozen = true;
        self.emit(TASK_BEGIN, index);
        self.tasks[index].mark_skipped();
        info!(id = %id, "task skipped");
        self.emit(TASK_END, index);
        Ok(())
    }

    /// Synchronously passes `(event, task)` to the event sink, if one is configured.
    pub fn trigger_event(&mut self, event: &str, key: TaskKey) -> Result<()> {
        let index = self.task_index(key)?;
        self.emit(event, index);
        Ok(())
    }

    fn emit(&mut self, event: &str, index: usize) {
        let key = self.task_key_at(index);
        if let (Some(sink), Some((id, task))) =
            (self.event_sink.as_mut(), self.tasks.get_index(index))
        {
            sink(event, TaskRef { key, id, task });
        }
    }

    fn task_index(&self, key: TaskKey) -> Result<usize> {
        if key.graph != self.uid || key.index >= self.tasks.len() {
            return Err(Error::ForeignHandle(format!("task #{}", key.index)));
        }
        Ok(key.index)
    }

    fn group_index(&self, key: GroupKey) -> Result<usize> {
        if key.graph != self.uid || key.index >= self.groups.len() {
            return Err(Error::ForeignHandle(format!("group #{}", key.index)));
        }
        Ok(key.index)
    }

    #[inline]
    pub(crate) fn task_key_at(&self, index: usize) -> TaskKey {
        TaskKey {
            graph: self.uid,
            index,
        }
    }

    #[inline]
    pub(crate) fn group_key_at(&self, index: usize) -> GroupKey {
        GroupKey {
            graph: self.uid,
            index,
        }
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("edges", &self.dag.edge_count())
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}
