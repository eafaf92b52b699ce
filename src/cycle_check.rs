use crate::{PhaseError, TaskGraph};

/// Fails with [`PhaseError::CycleDetected`] if the predecessor relation of
/// `graph` is not acyclic. The reported ids are the tasks on the first cycle
/// found, in the order they were reached.
pub fn validate<T>(phase_id: &str, graph: &TaskGraph<T>) -> Result<(), PhaseError> {
    match find_cycle(graph) {
        None => Ok(()),
        Some(cycle) => Err(PhaseError::CycleDetected {
            phase_id: phase_id.to_string(),
            involved_task_ids: cycle
                .into_iter()
                .map(|index| graph.nodes()[index].id.clone())
                .collect(),
        }),
    }
}

pub fn has_cycle<T>(graph: &TaskGraph<T>) -> bool {
    find_cycle(graph).is_some()
}

fn find_cycle<T>(graph: &TaskGraph<T>) -> Option<Vec<usize>> {
    let len = graph.len();
    let mut visited = vec![false; len];
    let mut on_path = vec![false; len];
    let mut path = Vec::new();

    fn dfs<T>(
        index: usize,
        graph: &TaskGraph<T>,
        visited: &mut [bool],
        on_path: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if on_path[index] {
            let start = path.iter().position(|&i| i == index).unwrap_or(0);
            return Some(path[start..].to_vec());
        }
        if visited[index] {
            return None;
        }

        visited[index] = true;
        on_path[index] = true;
        path.push(index);

        for &dep in &graph.nodes()[index].predecessors {
            if let Some(cycle) = dfs(dep, graph, visited, on_path, path) {
                return Some(cycle);
            }
        }

        path.pop();
        on_path[index] = false;
        None
    }

    for index in 0..len {
        if !visited[index] {
            if let Some(cycle) = dfs(index, graph, &mut visited, &mut on_path, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}
