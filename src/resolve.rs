use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

use crate::{BoxRunnable, BoxRunnableSync, PhaseError};

/// Identity and ordering declarations of a registered task.
pub trait Registration {
    fn task_id(&self) -> String;
    fn predecessor_ids(&self) -> Vec<String>;
}

impl<P: Send + 'static> Registration for BoxRunnable<P> {
    fn task_id(&self) -> String {
        self.id().to_string()
    }

    fn predecessor_ids(&self) -> Vec<String> {
        self.run_after()
    }
}

impl<P> Registration for BoxRunnableSync<P> {
    fn task_id(&self) -> String {
        self.id().to_string()
    }

    fn predecessor_ids(&self) -> Vec<String> {
        self.run_after()
    }
}

#[derive(Debug, Clone)]
pub struct TaskNode<T> {
    pub id: String,
    /// Deduplicated, in declaration order.
    pub predecessor_ids: Vec<String>,
    /// Indices into [`TaskGraph::nodes`], parallel to `predecessor_ids`.
    pub predecessors: Vec<usize>,
    pub body: T,
}

/// The normalized task set of one phase invocation.
#[derive(Debug, Clone)]
pub struct TaskGraph<T> {
    phase_id: String,
    nodes: Vec<TaskNode<T>>,
    dependents: Vec<Vec<usize>>,
}

/// Turns raw registrations into a [`TaskGraph`].
///
/// Fails on the first duplicate id, then on the first predecessor that is not
/// registered in this phase, both in registration order.
pub fn resolve<T, I>(phase_id: &str, registrations: I) -> Result<TaskGraph<T>, PhaseError>
where
    T: Registration,
    I: IntoIterator<Item = T>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut pending: Vec<(String, Vec<String>, T)> = Vec::new();

    for registration in registrations {
        let id = registration.task_id();
        if index.contains_key(&id) {
            return Err(PhaseError::DuplicateTaskId {
                phase_id: phase_id.to_string(),
                task_id: id,
            });
        }
        index.insert(id.clone(), pending.len());

        let mut seen = HashSet::new();
        let predecessor_ids = registration
            .predecessor_ids()
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();
        pending.push((id, predecessor_ids, registration));
    }

    let mut nodes = Vec::with_capacity(pending.len());
    let mut dependents = vec![Vec::new(); pending.len()];

    for (position, (id, predecessor_ids, body)) in pending.into_iter().enumerate() {
        let mut predecessors = Vec::with_capacity(predecessor_ids.len());
        for dep in &predecessor_ids {
            let Some(&dep_index) = index.get(dep) else {
                return Err(PhaseError::UnresolvedPredecessor {
                    phase_id: phase_id.to_string(),
                    task_id: id,
                    missing_predecessor_id: dep.clone(),
                });
            };
            predecessors.push(dep_index);
            dependents[dep_index].push(position);
        }

        nodes.push(TaskNode {
            id,
            predecessor_ids,
            predecessors,
            body,
        });
    }

    Ok(TaskGraph {
        phase_id: phase_id.to_string(),
        nodes,
        dependents,
    })
}

impl<T> TaskGraph<T> {
    pub fn phase_id(&self) -> &str {
        &self.phase_id
    }

    pub fn nodes(&self) -> &[TaskNode<T>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of the nodes that declared `index` as a predecessor.
    pub fn dependents_of(&self, index: usize) -> &[usize] {
        self.dependents.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn into_parts(self) -> (String, Vec<TaskNode<T>>, Vec<Vec<usize>>) {
        (self.phase_id, self.nodes, self.dependents)
    }

    /// One order in which the tasks could run one at a time, or `None` if the
    /// graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<&str>> {
        let mut in_degrees: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut ready: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degrees[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(current) = ready.pop_front() {
            order.push(self.nodes[current].id.as_str());
            for &child in &self.dependents[current] {
                in_degrees[child] -= 1;
                if in_degrees[child] == 0 {
                    ready.push_back(child);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Renders every root task followed by the chains that hang off it.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if !node.predecessors.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}", node.id);
            let mut path = vec![index];
            self.render_chain(index, "  ", &mut path, &mut out);
            out.push('\n');
        }
        out
    }

    fn render_chain(&self, index: usize, prefix: &str, path: &mut Vec<usize>, out: &mut String) {
        for &child in &self.dependents[index] {
            if path.contains(&child) {
                continue;
            }
            let _ = writeln!(out, "{}└─> {}", prefix, self.nodes[child].id);
            path.push(child);
            self.render_chain(child, &format!("{}    ", prefix), path, out);
            path.pop();
        }
    }
}
