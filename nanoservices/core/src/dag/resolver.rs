use std::collections::{HashMap, HashSet, VecDeque};

use crate::dag::node::TaskNode;

/// Errors that can occur during DAG resolution.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("step '{0}' depends on unknown step '{1}'")]
    MissingUpstream(String, String),

    #[error("step '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("Cycle detected in DAG involving tasks: {0:?}")]
    CycleDetected(Vec<String>),
}

/// A resolved DAG with execution order.
#[derive(Debug, Clone)]
pub struct ResolvedDag {
    /// Tasks in topological order (safe to execute in this sequence).
    pub order: Vec<String>,
    /// Map from task name to the tasks it must wait for.
    pub dependencies: HashMap<String, HashSet<String>>,
    /// Map from task name to tasks that depend on it.
    pub dependents: HashMap<String, HashSet<String>>,
}

impl ResolvedDag {
    /// Every task that transitively depends on `task`, in execution order.
    pub fn downstream_of(&self, task: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![task.to_string()];
        while let Some(current) = stack.pop() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if seen.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }
        self.order.iter().filter(|t| seen.contains(*t)).cloned().collect()
    }
}

/// Resolve TaskNodes into an execution order. Ties are broken by declaration
/// order, so a linear chain always runs exactly as declared.
pub fn resolve(nodes: Vec<TaskNode>) -> Result<ResolvedDag, DagError> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if position.insert(node.name.as_str(), i).is_some() {
            return Err(DagError::DuplicateTask(node.name.clone()));
        }
    }

    let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
    let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
    for node in &nodes {
        dependents.entry(node.name.clone()).or_default();
        let deps = dependencies.entry(node.name.clone()).or_default();
        for up in &node.upstream {
            if !position.contains_key(up.as_str()) {
                return Err(DagError::MissingUpstream(node.name.clone(), up.clone()));
            }
            deps.insert(up.clone());
        }
    }
    for node in &nodes {
        for up in &node.upstream {
            dependents.entry(up.clone()).or_default().insert(node.name.clone());
        }
    }

    // Kahn's algorithm over declaration order
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| dependencies[&n.name].len()).collect();
    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order: Vec<String> = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        let task = &nodes[i].name;
        order.push(task.clone());
        let mut ready: Vec<usize> = dependents[task]
            .iter()
            .filter_map(|d| position.get(d.as_str()).copied())
            .filter(|j| {
                in_degree[*j] -= 1;
                in_degree[*j] == 0
            })
            .collect();
        ready.sort_unstable();
        queue.extend(ready);
    }

    if order.len() != nodes.len() {
        let remaining = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, n)| n.name.clone())
            .collect();
        return Err(DagError::CycleDetected(remaining));
    }

    Ok(ResolvedDag {
        order,
        dependencies,
        dependents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_pipeline_resolves() {
        let nodes = vec![
            TaskNode::root("reset_tables"),
            TaskNode::after("load_staging", &["reset_tables"]),
            TaskNode::after("transform_facts", &["load_staging"]),
            TaskNode::after("report_metrics", &["transform_facts"]),
        ];

        let dag = resolve(nodes).unwrap();
        assert_eq!(dag.order, vec!["reset_tables", "load_staging", "transform_facts", "report_metrics"]);
        assert!(dag.dependencies["reset_tables"].is_empty());
        assert!(dag.dependencies["load_staging"].contains("reset_tables"));
        assert_eq!(
            dag.downstream_of("load_staging"),
            vec!["transform_facts", "report_metrics"]
        );
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let nodes = vec![
            TaskNode::root("b"),
            TaskNode::root("a"),
            TaskNode::after("c", &["a", "b"]),
        ];

        let dag = resolve(nodes).unwrap();
        assert_eq!(dag.order, vec!["b", "a", "c"]);
    }

    #[test]
    fn diamond_dag_resolves() {
        let nodes = vec![
            TaskNode::root("fetch"),
            TaskNode::after("clean_a", &["fetch"]),
            TaskNode::after("clean_b", &["fetch"]),
            TaskNode::after("merge", &["clean_a", "clean_b"]),
            TaskNode::after("save", &["merge"]),
        ];

        let dag = resolve(nodes).unwrap();
        assert_eq!(dag.order, vec!["fetch", "clean_a", "clean_b", "merge", "save"]);
        assert_eq!(dag.downstream_of("clean_b"), vec!["merge", "save"]);
    }

    #[test]
    fn missing_upstream_errors() {
        let nodes = vec![TaskNode::after("save", &["nonexistent"])];

        let err = resolve(nodes).unwrap_err();
        assert!(matches!(err, DagError::MissingUpstream(ref t, ref u) if t == "save" && u == "nonexistent"));
    }

    #[test]
    fn duplicate_task_errors() {
        let nodes = vec![TaskNode::root("load"), TaskNode::root("load")];

        let err = resolve(nodes).unwrap_err();
        assert!(matches!(err, DagError::DuplicateTask(ref t) if t == "load"));
    }

    #[test]
    fn cycle_errors() {
        let nodes = vec![
            TaskNode::root("start"),
            TaskNode::after("a", &["start", "b"]),
            TaskNode::after("b", &["a"]),
        ];

        let err = resolve(nodes).unwrap_err();
        match err {
            DagError::CycleDetected(tasks) => assert_eq!(tasks, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
