// Hierarchical boolean-variable tree with wildcard path selection
//
// Built once, eagerly, from a nested key structure; each leaf value becomes
// a boolean decision variable named by the path of labels leading to it.
// Selection expands one axis per keyed level and returns the reachable leaf
// variables in depth-first order.

use std::collections::HashSet;

use tracing::warn;

use crate::domain::{ModelError, Node, Result};
use crate::model::Solver;

/// Nested key/value structure the tree is built from.
///
/// Branches keep insertion order; leaf values are coerced to text labels.
#[derive(Debug, Clone)]
pub enum KeySpec {
    Branch(Vec<(String, KeySpec)>),
    Leaves(Vec<String>),
}

impl KeySpec {
    pub fn branch<K: Into<String>>(entries: Vec<(K, KeySpec)>) -> Self {
        KeySpec::Branch(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn leaves<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        KeySpec::Leaves(values.into_iter().map(|v| v.to_string()).collect())
    }
}

/// One selection axis: a single label, an explicit label list, or the
/// wildcard meaning every label present at that depth.
#[derive(Debug, Clone)]
pub enum Axis {
    Label(String),
    Labels(Vec<String>),
    All,
}

impl Axis {
    pub fn label(label: impl Into<String>) -> Self {
        Axis::Label(label.into())
    }

    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Axis::Labels(labels.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Axis {
    fn from(label: &str) -> Self {
        Axis::Label(label.to_string())
    }
}

#[derive(Debug)]
enum TreeNode {
    Branch(Vec<(String, TreeNode)>),
    Leaves(Vec<Node>),
}

/// Tree of boolean decision variables keyed by nested labels.
#[derive(Debug)]
pub struct DictBoolVar {
    root: TreeNode,
    depth: usize,
    /// Distinct labels per keyed depth, plus the leaf values at index
    /// `depth`. Used to validate selection queries.
    labels: Vec<HashSet<String>>,
    /// Labels reported missing by the last `select` call.
    missing: Vec<String>,
}

impl DictBoolVar {
    /// Builds the full tree eagerly, creating one boolean variable per leaf
    /// value through the facade. All branches must have uniform depth.
    pub fn new(solver: &mut Solver, spec: &KeySpec) -> Result<Self> {
        let mut depth = None;
        check_depth(spec, 0, &mut depth, &mut Vec::new())?;
        let depth = depth.unwrap_or(0);

        let mut labels = vec![HashSet::new(); depth + 1];
        let mut path = Vec::new();
        let root = build(solver, spec, &mut path, &mut labels)?;
        Ok(Self {
            root,
            depth,
            labels,
            missing: Vec::new(),
        })
    }

    /// Number of keyed levels, which is also the number of selection axes.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Labels seen at `depth` during construction; index `depth()` holds the
    /// leaf values.
    pub fn labels_at(&self, depth: usize) -> Option<&HashSet<String>> {
        self.labels.get(depth)
    }

    /// Labels reported missing by the most recent `select` call.
    pub fn missing_labels(&self) -> &[String] {
        &self.missing
    }

    /// Selects leaf variables by the Cartesian expansion of the axes,
    /// intersected with what exists in the tree.
    ///
    /// Takes exactly one axis per keyed level; fewer or more is a fatal
    /// usage error. Labels absent from a depth's recorded label set are
    /// warned about and dropped; an axis whose labels are all missing
    /// degrades to the wildcard. Result order is depth-first.
    pub fn select(&mut self, axes: &[Axis]) -> Result<Vec<Node>> {
        self.missing.clear();
        if axes.len() != self.depth {
            return Err(ModelError::SelectionArity {
                expected: self.depth,
                got: axes.len(),
            });
        }

        let mut resolved: Vec<Option<Vec<String>>> = Vec::with_capacity(axes.len());
        for (depth, axis) in axes.iter().enumerate() {
            let requested: Option<Vec<String>> = match axis {
                Axis::All => None,
                Axis::Label(label) => Some(vec![label.clone()]),
                Axis::Labels(labels) => Some(labels.clone()),
            };
            let filtered = requested.map(|labels| {
                let known = &self.labels[depth];
                let mut existing = Vec::new();
                for label in labels {
                    if known.contains(&label) {
                        existing.push(label);
                    } else {
                        warn!(depth, label = label.as_str(), "selection label not present at this depth");
                        self.missing.push(label);
                    }
                }
                existing
            });
            // every requested label was missing: fall back to the wildcard
            let filtered = match filtered {
                Some(existing) if existing.is_empty() => None,
                other => other,
            };
            resolved.push(filtered);
        }

        let mut result = Vec::new();
        collect(&self.root, &resolved, 0, &mut result);
        Ok(result)
    }
}

fn check_depth(
    spec: &KeySpec,
    depth: usize,
    expected: &mut Option<usize>,
    path: &mut Vec<String>,
) -> Result<()> {
    match spec {
        KeySpec::Leaves(_) => match *expected {
            None => {
                *expected = Some(depth);
                Ok(())
            }
            Some(d) if d == depth => Ok(()),
            Some(d) => Err(ModelError::RaggedTree(format!(
                "leaves at `{}` sit at depth {} but earlier leaves sit at depth {}",
                path.join("/"),
                depth,
                d
            ))),
        },
        KeySpec::Branch(entries) => {
            for (label, sub) in entries {
                path.push(label.clone());
                check_depth(sub, depth + 1, expected, path)?;
                path.pop();
            }
            Ok(())
        }
    }
}

fn build(
    solver: &mut Solver,
    spec: &KeySpec,
    path: &mut Vec<String>,
    labels: &mut [HashSet<String>],
) -> Result<TreeNode> {
    match spec {
        KeySpec::Branch(entries) => {
            let depth = path.len();
            let mut children = Vec::with_capacity(entries.len());
            for (label, sub) in entries {
                labels[depth].insert(label.clone());
                path.push(label.clone());
                let child = build(solver, sub, path, labels)?;
                path.pop();
                children.push((label.clone(), child));
            }
            Ok(TreeNode::Branch(children))
        }
        KeySpec::Leaves(values) => {
            let depth = path.len();
            let mut leaves = Vec::with_capacity(values.len());
            for value in values {
                labels[depth].insert(value.clone());
                let name = if path.is_empty() {
                    value.clone()
                } else {
                    format!("{}_{}", path.join("_"), value)
                };
                leaves.push(solver.new_bool_var(name)?);
            }
            Ok(TreeNode::Leaves(leaves))
        }
    }
}

fn collect(
    node: &TreeNode,
    resolved: &[Option<Vec<String>>],
    depth: usize,
    result: &mut Vec<Node>,
) {
    match node {
        TreeNode::Leaves(leaves) => result.extend(leaves.iter().cloned()),
        TreeNode::Branch(children) => match &resolved[depth] {
            None => {
                for (_, child) in children {
                    collect(child, resolved, depth + 1, result);
                }
            }
            Some(requested) => {
                for label in requested {
                    // a label may exist at this depth globally but not under
                    // this particular branch; skip silently
                    if let Some((_, child)) =
                        children.iter().find(|(edge, _)| edge == label)
                    {
                        collect(child, resolved, depth + 1, result);
                    }
                }
            }
        },
    }
}
