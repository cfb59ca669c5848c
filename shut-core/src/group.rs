//! Named containers of tasks and nested groups.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::graph::{GroupKey, Member, TaskGraph, TaskKey};
use crate::ident;
use crate::task::Task;

/// A group of tasks and sub-groups, used for organization and bulk selection.
///
/// Groups carry no execution semantics. A group is created detached and becomes usable once it
/// is added to a graph (directly or under another group).
#[derive(Debug)]
pub struct TaskGroup {
    name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) tasks: IndexMap<String, usize>,
    pub(crate) groups: IndexMap<String, usize>,
}

impl TaskGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            tasks: IndexMap::new(),
            groups: IndexMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Read-only view of a group registered in a graph.
#[derive(Clone, Copy)]
pub struct GroupView<'g> {
    graph: &'g TaskGraph,
    index: usize,
}

impl<'g> GroupView<'g> {
    pub(crate) fn new(graph: &'g TaskGraph, index: usize) -> Self {
        Self { graph, index }
    }

    fn entry(&self) -> &'g TaskGroup {
        self.graph.group_at(self.index)
    }

    pub fn key(&self) -> GroupKey {
        self.graph.group_key_at(self.index)
    }

    pub fn name(&self) -> &'g str {
        self.entry().name()
    }

    pub fn id(&self) -> String {
        self.graph.group_id_at(self.index)
    }

    pub fn parent(&self) -> Option<GroupKey> {
        self.entry().parent.map(|p| self.graph.group_key_at(p))
    }

    pub fn contains(&self, name: &str) -> bool {
        let entry = self.entry();
        entry.tasks.contains_key(name) || entry.groups.contains_key(name)
    }

    /// Looks up a direct child by name.
    pub fn get(&self, name: &str) -> Result<Member> {
        let entry = self.entry();
        if let Some(&index) = entry.groups.get(name) {
            return Ok(Member::Group(self.graph.group_key_at(index)));
        }
        if let Some(&index) = entry.tasks.get(name) {
            return Ok(Member::Task(self.graph.task_key_at(index)));
        }

        let available: Vec<&str> = entry
            .groups
            .keys()
            .chain(entry.tasks.keys())
            .map(String::as_str)
            .collect();
        Err(Error::NotFound {
            id: ident::join(Some(&self.id()), name),
            available: available.join(", "),
        })
    }

    /// Direct child tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = (&'g str, TaskKey)> + 'g {
        let graph = self.graph;
        self.entry()
            .tasks
            .iter()
            .map(move |(name, &index)| (name.as_str(), graph.task_key_at(index)))
    }

    /// Direct child groups in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = (&'g str, GroupKey)> + 'g {
        let graph = self.graph;
        self.entry()
            .groups
            .iter()
            .map(move |(name, &index)| (name.as_str(), graph.group_key_at(index)))
    }

    /// Calls `func` for this group, then each of its tasks, then recursively for each sub-group.
    pub fn visit<F>(&self, func: &mut F)
    where
        F: FnMut(Member),
    {
        func(Member::Group(self.key()));
        for (_, task) in self.tasks() {
            func(Member::Task(task));
        }
        for &child in self.entry().groups.values() {
            GroupView::new(self.graph, child).visit(func);
        }
    }
}

/// Mutable handle to a group registered in a graph, used to add children to it.
pub struct GroupMut<'g> {
    graph: &'g mut TaskGraph,
    index: usize,
}

impl<'g> GroupMut<'g> {
    pub(crate) fn new(graph: &'g mut TaskGraph, index: usize) -> Self {
        Self { graph, index }
    }

    pub fn key(&self) -> GroupKey {
        self.graph.group_key_at(self.index)
    }

    /// Adds a task to this group and registers it with the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or already used by a sibling task or group.
    pub fn add_task(&mut self, task: Task) -> Result<TaskKey> {
        self.graph.attach_task(Some(self.index), task)
    }

    /// Adds a sub-group to this group and registers it with the graph.
    pub fn add_group(&mut self, group: TaskGroup) -> Result<GroupKey> {
        self.graph.attach_group(Some(self.index), group)
    }

    /// Creates an empty sub-group named `name`.
    pub fn create_group(&mut self, name: &str) -> Result<GroupKey> {
        self.add_group(TaskGroup::new(name))
    }
}
