//! Virtual union of several independently built trees.
//!
//! A [`MergeGroup`] presents one logical child per distinct group name across
//! its sources. Same-named groups are merged recursively into a fresh
//! `MergeGroup`; leaf actions are passed through untouched, so a leaf name
//! that appears in two sources is delivered twice.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::Error;
use crate::node::{Descriptor, Grouper, Info, Node, Traversal, Visitor};

/// Grouper over an ordered list of source groupers.
///
/// Owns no children: every traversal re-derives the merged view from
/// `sources`, so a merged child is a new object each time.
pub struct MergeGroup {
    info: Info,
    sources: Vec<Arc<dyn Grouper>>,
}

impl MergeGroup {
    pub fn new(info: Info, sources: Vec<Arc<dyn Grouper>>) -> Self {
        Self { info, sources }
    }

    pub fn sources(&self) -> &[Arc<dyn Grouper>] {
        &self.sources
    }

    /// `first` followed by every same-named group found in `sources[start..]`.
    fn merge_after(
        &self,
        first: &Arc<dyn Grouper>,
        start: usize,
    ) -> Result<Vec<Arc<dyn Grouper>>, Error> {
        let mut merged = vec![Arc::clone(first)];
        for source in self.sources.iter().skip(start) {
            match source.child_by_name(first.name()) {
                Ok(Node::Group(group)) => merged.push(group),
                Ok(Node::Action(_)) | Err(Error::ChildNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(merged)
    }
}

impl Descriptor for MergeGroup {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn version(&self) -> &str {
        &self.info.version
    }

    fn description(&self) -> &str {
        &self.info.description
    }
}

impl Grouper for MergeGroup {
    fn visit_children(&self, visitor: &mut Visitor<'_>) -> Result<Traversal, Error> {
        // Names already delivered as a merged group, across all sources.
        let mut used: HashSet<String> = HashSet::new();

        for (index, source) in self.sources.iter().enumerate() {
            let traversal = source.visit_children(&mut |child| {
                if used.contains(child.name()) {
                    return Ok(ControlFlow::Continue(()));
                }
                let Node::Group(group) = child else {
                    return visitor(child);
                };
                let merged = self.merge_after(group, index + 1)?;
                if merged.len() < 2 {
                    return visitor(child);
                }
                used.insert(group.name().to_owned());
                let info = Info::new(group.name(), group.version(), group.description());
                visitor(&Node::group(MergeGroup::new(info, merged)))
            })?;

            if traversal == Traversal::Stopped {
                return Ok(Traversal::Stopped);
            }
        }

        Ok(Traversal::Finished)
    }
}
