//! Dependency graph for tasks
//!
//! Stores "dependent waits on prerequisite" edges in two adjacency maps keyed
//! by [`TaskId`], one per direction. Every insertion is checked for
//! reachability first, so the graph is acyclic at all times.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::DependencyError;
use crate::task::TaskStatus;
use crate::types::TaskId;

type Adjacency = BTreeMap<TaskId, BTreeSet<TaskId>>;

/// Directed acyclic graph of task dependencies
///
/// # Invariants
///
/// - No cycles: an edge that would close one is rejected before insertion
/// - `prerequisites` and `dependents` mirror each other exactly
/// - Both maps hold an entry for every registered task
///
/// Edges naming a dependent that is not registered yet are parked and
/// applied when that task is added.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// task -> tasks it waits on
    prerequisites: Adjacency,

    /// task -> tasks waiting on it
    dependents: Adjacency,

    /// unregistered dependent -> prerequisites declared for it in advance
    deferred: Adjacency,
}

impl DependencyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prerequisites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prerequisites.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.prerequisites.contains_key(&id)
    }

    /// Registered ids in ascending order
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.prerequisites.keys().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.prerequisites.values().map(BTreeSet::len).sum()
    }

    /// Register a task together with its edges
    ///
    /// All-or-nothing: if any edge fails, every edge inserted by this call is
    /// rolled back and the task is not registered.
    ///
    /// # Errors
    ///
    /// - `DuplicateTask` if `id` is already registered
    /// - `SelfDependency` if `id` appears in either list
    /// - `UnknownTask` for an unregistered prerequisite
    /// - `WouldCreateCycle` if an edge would close a cycle
    pub fn add_task(
        &mut self,
        id: TaskId,
        prerequisites: &[TaskId],
        dependents: &[TaskId],
    ) -> Result<(), DependencyError> {
        if self.contains(id) {
            return Err(DependencyError::DuplicateTask(id));
        }
        if prerequisites.contains(&id) || dependents.contains(&id) {
            return Err(DependencyError::SelfDependency(id));
        }

        self.prerequisites.insert(id, BTreeSet::new());
        self.dependents.insert(id, BTreeSet::new());
        let parked = self.deferred.remove(&id).unwrap_or_default();

        let mut edges: Vec<(TaskId, TaskId)> = prerequisites
            .iter()
            .chain(parked.iter())
            .map(|p| (id, *p))
            .collect();
        edges.extend(
            dependents
                .iter()
                .filter(|d| self.contains(**d))
                .map(|d| (*d, id)),
        );

        for (dependent, prerequisite) in edges {
            if let Err(err) = self.add_dependency(dependent, prerequisite) {
                self.remove_task(id);
                if !parked.is_empty() {
                    self.deferred.insert(id, parked);
                }
                return Err(err);
            }
        }

        let missing: Vec<TaskId> = dependents
            .iter()
            .copied()
            .filter(|d| !self.contains(*d))
            .collect();
        for dependent in missing {
            self.deferred.entry(dependent).or_default().insert(id);
        }

        Ok(())
    }

    /// Add an edge: `dependent` waits on `prerequisite`
    ///
    /// Returns `Ok(false)` if the edge already existed.
    ///
    /// # Errors
    ///
    /// Rejects self edges, unregistered endpoints and edges that would create
    /// a cycle. The graph is unchanged on error.
    pub fn add_dependency(
        &mut self,
        dependent: TaskId,
        prerequisite: TaskId,
    ) -> Result<bool, DependencyError> {
        if dependent == prerequisite {
            return Err(DependencyError::SelfDependency(dependent));
        }
        for id in [dependent, prerequisite] {
            if !self.contains(id) {
                return Err(DependencyError::UnknownTask(id));
            }
        }
        if self.prerequisites[&dependent].contains(&prerequisite) {
            return Ok(false);
        }
        if self.reaches(prerequisite, dependent) {
            return Err(DependencyError::WouldCreateCycle {
                dependent,
                prerequisite,
            });
        }

        self.prerequisites
            .entry(dependent)
            .or_default()
            .insert(prerequisite);
        self.dependents
            .entry(prerequisite)
            .or_default()
            .insert(dependent);
        Ok(true)
    }

    /// Remove an edge
    ///
    /// # Errors
    ///
    /// Returns `EdgeNotFound` if the edge does not exist.
    pub fn remove_dependency(
        &mut self,
        dependent: TaskId,
        prerequisite: TaskId,
    ) -> Result<(), DependencyError> {
        let removed = self
            .prerequisites
            .get_mut(&dependent)
            .map(|set| set.remove(&prerequisite))
            .unwrap_or(false);
        if !removed {
            return Err(DependencyError::EdgeNotFound {
                dependent,
                prerequisite,
            });
        }
        if let Some(set) = self.dependents.get_mut(&prerequisite) {
            set.remove(&dependent);
        }
        Ok(())
    }

    /// Unregister a task and prune every edge touching it
    ///
    /// Returns false if the task was not registered.
    pub fn remove_task(&mut self, id: TaskId) -> bool {
        let Some(prerequisites) = self.prerequisites.remove(&id) else {
            return false;
        };
        let dependents = self.dependents.remove(&id).unwrap_or_default();

        for prerequisite in prerequisites {
            if let Some(set) = self.dependents.get_mut(&prerequisite) {
                set.remove(&id);
            }
        }
        for dependent in dependents {
            if let Some(set) = self.prerequisites.get_mut(&dependent) {
                set.remove(&id);
            }
        }

        self.deferred.retain(|_, waiting_on| {
            waiting_on.remove(&id);
            !waiting_on.is_empty()
        });
        true
    }

    /// Direct prerequisites in ascending order
    pub fn prerequisites(&self, id: TaskId) -> Vec<TaskId> {
        self.prerequisites
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Direct dependents in ascending order
    pub fn dependents(&self, id: TaskId) -> Vec<TaskId> {
        self.dependents
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every task `id` transitively waits on
    pub fn all_prerequisites(&self, id: TaskId) -> BTreeSet<TaskId> {
        Self::closure(&self.prerequisites, id)
    }

    /// Every task transitively waiting on `id`
    pub fn all_dependents(&self, id: TaskId) -> BTreeSet<TaskId> {
        Self::closure(&self.dependents, id)
    }

    fn closure(edges: &Adjacency, start: TaskId) -> BTreeSet<TaskId> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<TaskId> = edges
            .get(&start)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        while let Some(node) = stack.pop() {
            if node == start || !visited.insert(node) {
                continue;
            }
            if let Some(next) = edges.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
        visited
    }

    /// Can `to` be reached from `from` along prerequisite edges?
    fn reaches(&self, from: TaskId, to: TaskId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(next) = self.prerequisites.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// True iff every direct prerequisite is Completed
    ///
    /// A prerequisite with no known status counts as not completed. An
    /// unregistered `id` is never executable.
    pub fn can_execute<F>(&self, id: TaskId, status_of: F) -> bool
    where
        F: Fn(TaskId) -> Option<TaskStatus>,
    {
        match self.prerequisites.get(&id) {
            Some(prerequisites) => prerequisites
                .iter()
                .all(|p| status_of(*p) == Some(TaskStatus::Completed)),
            None => false,
        }
    }

    /// Registered tasks whose prerequisites are all Completed
    pub fn executable_tasks<F>(&self, status_of: F) -> Vec<TaskId>
    where
        F: Fn(TaskId) -> Option<TaskStatus>,
    {
        self.task_ids()
            .filter(|id| self.can_execute(*id, &status_of))
            .collect()
    }

    /// Order every task after all of its prerequisites
    ///
    /// Depth-first, visiting roots and children in ascending id order, so the
    /// result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` with the offending path instead of a partial
    /// order.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, DependencyError> {
        let mut order = Vec::with_capacity(self.len());
        let mut done = BTreeSet::new();
        let mut visiting = Vec::new();

        for id in self.task_ids() {
            self.visit(id, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: TaskId,
        visiting: &mut Vec<TaskId>,
        done: &mut BTreeSet<TaskId>,
        order: &mut Vec<TaskId>,
    ) -> Result<(), DependencyError> {
        if done.contains(&id) {
            return Ok(());
        }
        if let Some(pos) = visiting.iter().position(|v| *v == id) {
            return Err(DependencyError::CycleDetected(visiting[pos..].to_vec()));
        }

        visiting.push(id);
        if let Some(prerequisites) = self.prerequisites.get(&id) {
            for prerequisite in prerequisites {
                self.visit(*prerequisite, visiting, done, order)?;
            }
        }
        visiting.pop();

        done.insert(id);
        order.push(id);
        Ok(())
    }

    /// Audit the adjacency maps for a cycle
    ///
    /// Runs Tarjan's strongly connected components over a petgraph copy of
    /// the edges. Returns the members of the first cycle found, which should
    /// never happen while the invariants hold.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        use petgraph::algo::tarjan_scc;

        let mut graph: DiGraph<TaskId, ()> = DiGraph::new();
        let mut nodes: HashMap<TaskId, NodeIndex> = HashMap::new();
        for id in self.task_ids() {
            nodes.insert(id, graph.add_node(id));
        }
        for (dependent, prerequisites) in &self.prerequisites {
            for prerequisite in prerequisites {
                if let (Some(&from), Some(&to)) = (nodes.get(prerequisite), nodes.get(dependent))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .find(|scc| scc.len() > 1 || scc.iter().any(|n| graph.contains_edge(*n, *n)))
            .map(|scc| {
                let mut cycle: Vec<TaskId> = scc.iter().map(|idx| graph[*idx]).collect();
                cycle.sort();
                cycle
            })
    }

    /// Longest chain by estimated duration, prerequisites first
    ///
    /// Returns an empty path for an empty or cyclic graph.
    pub fn critical_path<F>(&self, duration_of: F) -> Vec<TaskId>
    where
        F: Fn(TaskId) -> f64,
    {
        let Ok(order) = self.topological_order() else {
            return Vec::new();
        };

        // Longest total duration of a chain ending at each task
        let mut best: HashMap<TaskId, (f64, Option<TaskId>)> = HashMap::new();
        for id in &order {
            let via = self.prerequisites[id]
                .iter()
                .filter_map(|p| best.get(p).map(|(len, _)| (*len, *p)))
                .fold(None, |acc: Option<(f64, TaskId)>, (len, p)| match acc {
                    Some((best_len, _)) if best_len >= len => acc,
                    _ => Some((len, p)),
                });
            let (base, previous) = match via {
                Some((len, p)) => (len, Some(p)),
                None => (0.0, None),
            };
            best.insert(*id, (base + duration_of(*id), previous));
        }

        let mut end = None;
        for id in &order {
            let length = best[id].0;
            match end {
                Some((_, best_len)) if best_len >= length => {}
                _ => end = Some((*id, length)),
            }
        }

        let mut path = Vec::new();
        let mut cursor = end.map(|(id, _)| id);
        while let Some(id) = cursor {
            path.push(id);
            cursor = best[&id].1;
        }
        path.reverse();
        path
    }
}
