/// A single step in the DAG and the steps it must wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub name: String,
    pub upstream: Vec<String>,
}

impl TaskNode {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upstream: Vec::new(),
        }
    }

    pub fn after(name: impl Into<String>, upstream: &[&str]) -> Self {
        Self {
            name: name.into(),
            upstream: upstream.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.upstream.is_empty()
    }
}
