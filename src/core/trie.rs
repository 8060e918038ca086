//! Per-method path trie.
//!
//! Each [`Node`] stands at one segment boundary and holds:
//! * literal children, keyed by exact segment text
//! * wildcard children (`:name`), tried in registration order
//! * leaf handlers for a literal final segment
//! * at most one tail wildcard matching any final segment
//!
//! Lookup is recursive over the remaining segments. At every level the literal
//! child is tried before any wildcard child, and a wildcard binding made for a
//! failed descent is undone before the next candidate is tried.
use std::collections::HashMap;

use crate::core::{
    context::Params,
    error::{RouteError, RouteResult},
    router::Handler,
};

/// A named capture bound to a handler, matching any single final segment.
struct WildcardLeaf {
    name: String,
    handler: Handler,
}

/// What a registration did to the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    Added,
    /// A literal leaf with the same path existed and was replaced.
    Replaced,
}

#[derive(Default)]
pub(crate) struct Node {
    literal_children: HashMap<String, Node>,
    wildcard_children: Vec<(String, Node)>,
    leaf_handlers: HashMap<String, Handler>,
    tail_wildcard: Option<WildcardLeaf>,
}

fn is_capture(segment: &str) -> bool {
    segment.starts_with(':')
}

impl Node {
    /// Insert `handler` under `segments`. `path` is only used for error messages.
    pub(crate) fn insert(
        &mut self,
        segments: &[&str],
        handler: Handler,
        path: &str,
    ) -> RouteResult<Insertion> {
        match segments {
            [] => Err(RouteError::MalformedPath(path.to_string())),
            [last] if is_capture(last) => {
                if let Some(existing) = &self.tail_wildcard {
                    return Err(RouteError::DuplicateTailWildcard {
                        path: path.to_string(),
                        name: last.to_string(),
                        existing: existing.name.clone(),
                    });
                }
                self.tail_wildcard = Some(WildcardLeaf {
                    name: last.to_string(),
                    handler,
                });
                Ok(Insertion::Added)
            }
            [last] => match self.leaf_handlers.insert(last.to_string(), handler) {
                Some(_) => Ok(Insertion::Replaced),
                None => Ok(Insertion::Added),
            },
            [first, rest @ ..] => self.child_mut(first).insert(rest, handler, path),
        }
    }

    fn child_mut(&mut self, segment: &str) -> &mut Node {
        if !is_capture(segment) {
            return self.literal_children.entry(segment.to_string()).or_default();
        }

        let position = self
            .wildcard_children
            .iter()
            .position(|(name, _)| name == segment);
        let index = match position {
            Some(index) => index,
            None => {
                self.wildcard_children
                    .push((segment.to_string(), Node::default()));
                self.wildcard_children.len() - 1
            }
        };
        &mut self.wildcard_children[index].1
    }

    /// Find the handler for `segments`, recording captures into `params`.
    ///
    /// On `None` the bindings in `params` are exactly what they were on entry.
    pub(crate) fn find<'a>(&'a self, segments: &[&str], params: &mut Params) -> Option<&'a Handler> {
        match segments {
            [] => None,
            [last] => {
                if let Some(handler) = self.leaf_handlers.get(*last) {
                    return Some(handler);
                }
                let tail = self.tail_wildcard.as_ref()?;
                params.insert(tail.name.clone(), last.to_string());
                Some(&tail.handler)
            }
            [first, rest @ ..] => {
                if let Some(handler) = self
                    .literal_children
                    .get(*first)
                    .and_then(|child| child.find(rest, params))
                {
                    return Some(handler);
                }

                for (name, child) in &self.wildcard_children {
                    let previous = params.insert(name.clone(), first.to_string());
                    if let Some(handler) = child.find(rest, params) {
                        return Some(handler);
                    }
                    match previous {
                        Some(value) => params.insert(name.clone(), value),
                        None => params.remove(name),
                    };
                }
                None
            }
        }
    }

    /// Number of handlers reachable from this node.
    pub(crate) fn route_count(&self) -> usize {
        self.leaf_handlers.len()
            + usize::from(self.tail_wildcard.is_some())
            + self
                .literal_children
                .values()
                .chain(self.wildcard_children.iter().map(|(_, child)| child))
                .map(Node::route_count)
                .sum::<usize>()
    }

    /// Registered route patterns, e.g. `/blog/:id/comments`.
    pub(crate) fn patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_patterns(&mut Vec::new(), &mut out);
        out.sort();
        out
    }

    fn collect_patterns<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<String>) {
        let leaves = self
            .leaf_handlers
            .keys()
            .map(String::as_str)
            .chain(self.tail_wildcard.as_ref().map(|tail| tail.name.as_str()));
        for leaf in leaves {
            out.push(format!("/{}", join_with(prefix, leaf)));
        }

        let children = self
            .literal_children
            .iter()
            .map(|(segment, child)| (segment.as_str(), child))
            .chain(
                self.wildcard_children
                    .iter()
                    .map(|(name, child)| (name.as_str(), child)),
            );
        for (segment, child) in children {
            prefix.push(segment);
            child.collect_patterns(prefix, out);
            prefix.pop();
        }
    }
}

fn join_with(prefix: &[&str], last: &str) -> String {
    let mut joined = prefix.join("/");
    if !prefix.is_empty() {
        joined.push('/');
    }
    joined.push_str(last);
    joined
}
