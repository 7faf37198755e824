//! Node contracts shared by every level of the command tree.
//!
//! Every node is a [`Descriptor`]. Interior nodes are [`Grouper`]s, leaves are
//! [`Executor`]s, and some executors additionally carry the [`Confirmable`]
//! capability. [`Node`] is the tagged union handed to traversal visitors.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::Error;
use crate::value::Schema;

/// Identity shared by every node.
pub trait Descriptor {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
}

/// Owned name/version/description triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Info {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

impl Descriptor for Info {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Every child was visited.
    Finished,
    /// The visitor asked to stop.
    Stopped,
}

/// Callback invoked once per child. Returning `Break` stops the traversal;
/// returning an error stops it and propagates the error.
pub type Visitor<'a> = dyn FnMut(&Node) -> Result<ControlFlow<()>, Error> + 'a;

/// A node that exposes children through traversal.
pub trait Grouper: Descriptor + Send + Sync {
    /// Visit children in order. Implementations may recompute children on
    /// every call but must keep the order stable.
    fn visit_children(&self, visitor: &mut Visitor<'_>) -> Result<Traversal, Error>;

    /// First child named `name`, found by traversal rather than an index.
    fn child_by_name(&self, name: &str) -> Result<Node, Error> {
        let mut found = None;
        self.visit_children(&mut |child| {
            if child.name() == name {
                found = Some(child.clone());
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        found.ok_or_else(|| Error::ChildNotFound {
            parent: self.name().to_owned(),
            name: name.to_owned(),
        })
    }

    /// Every child, in traversal order.
    fn children(&self) -> Result<Vec<Node>, Error> {
        let mut children = Vec::new();
        self.visit_children(&mut |child| {
            children.push(child.clone());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(children)
    }
}

/// A leaf node representing one invocable action.
pub trait Executor: Descriptor + Send + Sync {
    fn parameter_schema(&self) -> &Schema;

    fn config_schema(&self) -> &Schema;

    /// Convert `parameters` and `configs` with the declared schemas, run the
    /// action and return its result. Conversion failures surface as
    /// [`Error::Validation`] before anything else happens.
    fn execute(&self, parameters: &Value, configs: &Value) -> Result<Value, Error>;

    /// Capability probe for interactive confirmation.
    fn as_confirmable(&self) -> Option<&dyn Confirmable> {
        None
    }

    /// Finish any construction deferred until the action is selected.
    fn prepare(&self) {}
}

/// Executors whose action is destructive enough to need explicit consent.
///
/// For these, [`Executor::execute`] refuses to run; callers go through
/// [`crate::confirm::run`], which calls [`Confirmable::execute_confirmed`]
/// only after an explicit yes.
pub trait Confirmable {
    /// Message shown to the user. Must not have side effects.
    fn confirm_prompt(&self, parameters: &Value, configs: &Value) -> Result<String, Error>;

    /// Run the action once consent has been given.
    fn execute_confirmed(&self, parameters: &Value, configs: &Value) -> Result<Value, Error>;
}

/// A child handed out by a traversal.
#[derive(Clone)]
pub enum Node {
    Group(Arc<dyn Grouper>),
    Action(Arc<dyn Executor>),
}

impl Node {
    pub fn group(group: impl Grouper + 'static) -> Self {
        Self::Group(Arc::new(group))
    }

    pub fn action(action: impl Executor + 'static) -> Self {
        Self::Action(Arc::new(action))
    }

    pub fn as_group(&self) -> Option<&Arc<dyn Grouper>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Action(_) => None,
        }
    }

    pub fn as_action(&self) -> Option<&Arc<dyn Executor>> {
        match self {
            Self::Action(action) => Some(action),
            Self::Group(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Group(g) => g.name(),
            Self::Action(a) => a.name(),
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Group(g) => g.version(),
            Self::Action(a) => a.version(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Group(g) => g.description(),
            Self::Action(a) => a.description(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Group(_) => "Group",
            Self::Action(_) => "Action",
        };
        f.debug_struct(kind)
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// A group whose children are fixed at construction.
pub struct StaticGroup {
    info: Info,
    children: Vec<Node>,
}

impl StaticGroup {
    pub fn new(info: Info, children: Vec<Node>) -> Self {
        Self { info, children }
    }
}

impl Descriptor for StaticGroup {
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

impl Grouper for StaticGroup {
    fn visit_children(&self, visitor: &mut Visitor<'_>) -> Result<Traversal, Error> {
        for child in &self.children {
            if visitor(child)?.is_break() {
                return Ok(Traversal::Stopped);
            }
        }
        Ok(Traversal::Finished)
    }
}

type Build = dyn Fn() -> Arc<dyn Executor> + Send + Sync;

/// Leaf whose executor is built on first use.
///
/// Traversals can hand one out per sibling for the price of its [`Info`]
/// and a builder closure. The builder runs at most once, on
/// [`Executor::prepare`] or on the first call that needs the executor.
pub struct LazyAction {
    info: Info,
    build: Box<Build>,
    built: OnceLock<Arc<dyn Executor>>,
}

impl LazyAction {
    pub fn new(
        info: Info,
        build: impl Fn() -> Arc<dyn Executor> + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            build: Box::new(build),
            built: OnceLock::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    fn executor(&self) -> &Arc<dyn Executor> {
        self.built.get_or_init(|| (self.build)())
    }
}

impl Descriptor for LazyAction {
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

impl Executor for LazyAction {
    fn parameter_schema(&self) -> &Schema {
        self.executor().parameter_schema()
    }

    fn config_schema(&self) -> &Schema {
        self.executor().config_schema()
    }

    fn execute(&self, parameters: &Value, configs: &Value) -> Result<Value, Error> {
        self.executor().execute(parameters, configs)
    }

    fn as_confirmable(&self) -> Option<&dyn Confirmable> {
        self.executor().as_confirmable()
    }

    fn prepare(&self) {
        self.executor().prepare();
    }
}
