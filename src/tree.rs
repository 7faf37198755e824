//! API description → command tree
//!
//! Builds the module → resource → action node hierarchy for parsed
//! documents. Resources are the operations' tags; actions are named by
//! [`action_names`]. Actions are handed out as [`LazyAction`]s, so listing a
//! resource builds no executors. `DELETE` operations come out wrapped in a
//! [`ConfirmAction`].

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::confirm::{self, ConfirmAction, Execution, Prompter};
use crate::dispatch::HttpAction;
use crate::error::{Error, Level};
use crate::merge::MergeGroup;
use crate::naming::{action_names, normalize_group};
use crate::node::{
    Descriptor, Executor, Grouper, Info, LazyAction, Node, StaticGroup, Traversal, Visitor,
};
use crate::source::SourceRef;
use crate::spec::{ApiDocument, ApiOperation};

/// Everything an action needs from the document it came from.
#[derive(Clone)]
struct Context {
    version: String,
    server: Option<String>,
    client: Client,
}

/// Operations sharing one tag, grouped once per document.
struct ResourceSeed {
    name: String,
    tag: String,
    operations: Arc<[ApiOperation]>,
}

/// One API description presented as a module.
///
/// Resources are sorted by name. Visiting them only hands out the shared
/// operation lists; action names are derived when a resource is traversed.
pub struct ModuleGroup {
    info: Info,
    resources: Vec<ResourceSeed>,
    context: Context,
}

impl ModuleGroup {
    pub fn new(module: &str, document: ApiDocument, client: Client) -> Self {
        let info = &document.info;
        let description = if info.title.is_empty() {
            info.description.clone()
        } else {
            info.title.clone()
        };
        let info = Info::new(module, info.version.clone(), description);
        let context = Context {
            version: document.info.version.clone(),
            server: document.info.server.clone(),
            client,
        };

        let mut grouped: BTreeMap<String, (String, Vec<ApiOperation>)> = BTreeMap::new();
        for op in document.operations {
            grouped
                .entry(normalize_group(&op.group))
                .or_insert_with(|| (op.group.clone(), Vec::new()))
                .1
                .push(op);
        }
        let resources = grouped
            .into_iter()
            .map(|(name, (tag, operations))| ResourceSeed {
                name,
                tag,
                operations: operations.into(),
            })
            .collect();

        Self {
            info,
            resources,
            context,
        }
    }
}

impl Descriptor for ModuleGroup {
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

impl Grouper for ModuleGroup {
    fn visit_children(&self, visitor: &mut Visitor<'_>) -> Result<Traversal, Error> {
        for seed in &self.resources {
            let resource = ResourceGroup {
                info: Info::new(
                    seed.name.clone(),
                    self.context.version.clone(),
                    format!("Manage {}", seed.tag),
                ),
                operations: Arc::clone(&seed.operations),
                context: self.context.clone(),
            };
            if visitor(&Node::group(resource))?.is_break() {
                return Ok(Traversal::Stopped);
            }
        }
        Ok(Traversal::Finished)
    }
}

/// The operations sharing one tag.
pub struct ResourceGroup {
    info: Info,
    operations: Arc<[ApiOperation]>,
    context: Context,
}

impl ResourceGroup {
    /// Unbuilt action for `operations[index]`.
    fn action(&self, name: String, index: usize) -> Node {
        let op = &self.operations[index];
        let description = if op.summary.is_empty() {
            format!("{} {}", op.method, op.path)
        } else {
            op.summary.clone()
        };
        let info = Info::new(name, self.context.version.clone(), description);

        let seed = info.clone();
        let resource = self.info.name.clone();
        let operations = Arc::clone(&self.operations);
        let context = self.context.clone();
        Node::action(LazyAction::new(info, move || {
            build_executor(seed.clone(), &resource, &operations[index], &context)
        }))
    }
}

fn build_executor(
    info: Info,
    resource: &str,
    op: &ApiOperation,
    context: &Context,
) -> Arc<dyn Executor> {
    let http = HttpAction::new(info, op.clone(), context.client.clone())
        .with_default_base_url(context.server.clone());
    if !op.is_destructive() {
        return Arc::new(http);
    }
    let template = delete_prompt(resource, op);
    Arc::new(ConfirmAction::new(Arc::new(http), template))
}

/// `Delete pods (podId={podId})? This cannot be undone.`
fn delete_prompt(resource: &str, op: &ApiOperation) -> String {
    let targets: Vec<String> = op
        .path_params
        .iter()
        .map(|p| format!("{0}={{{0}}}", p.name))
        .collect();
    if targets.is_empty() {
        format!("Delete {resource}? This cannot be undone.")
    } else {
        format!("Delete {resource} ({})? This cannot be undone.", targets.join(", "))
    }
}

impl Descriptor for ResourceGroup {
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

impl Grouper for ResourceGroup {
    fn visit_children(&self, visitor: &mut Visitor<'_>) -> Result<Traversal, Error> {
        for (index, name) in action_names(&self.operations).into_iter().enumerate() {
            if visitor(&self.action(name, index))?.is_break() {
                return Ok(Traversal::Stopped);
            }
        }
        Ok(Traversal::Finished)
    }
}

/// Parse every document of one module and present them as a single group:
/// the lone `ModuleGroup`, or a `MergeGroup` when several documents share the
/// module name.
pub fn module_node(
    module: &str,
    sources: &[SourceRef],
    client: &Client,
) -> Result<Arc<dyn Grouper>, Error> {
    let mut groups: Vec<Arc<dyn Grouper>> = Vec::with_capacity(sources.len());
    for source in sources {
        let document = source.load()?;
        groups.push(Arc::new(ModuleGroup::new(module, document, client.clone())));
    }

    match groups.len() {
        0 => Err(Error::unresolved(Level::Module, Some(module))),
        1 => Ok(groups.remove(0)),
        _ => {
            let first = &groups[0];
            let info = Info::new(module, first.version(), first.description());
            Ok(Arc::new(MergeGroup::new(info, groups)))
        }
    }
}

/// Eagerly built tree over every source, for programmatic use.
///
/// Each document becomes its own single-module tree; the root merges them,
/// so modules and resources defined by several documents appear once.
pub struct Catalog {
    root: MergeGroup,
}

impl Catalog {
    pub fn load(name: &str, sources: &[SourceRef], client: &Client) -> Result<Self, Error> {
        let mut roots: Vec<Arc<dyn Grouper>> = Vec::with_capacity(sources.len());
        for source in sources {
            let module = ModuleGroup::new(&source.module, source.load()?, client.clone());
            let root = StaticGroup::new(
                Info::new(source.path.display().to_string(), "", ""),
                vec![Node::group(module)],
            );
            roots.push(Arc::new(root));
        }
        Ok(Self {
            root: MergeGroup::new(Info::new(name, "", ""), roots),
        })
    }

    pub fn root(&self) -> &MergeGroup {
        &self.root
    }

    /// Walk module → resource → action by name.
    pub fn resolve(&self, module: &str, resource: &str, action: &str) -> Result<Arc<dyn Executor>, Error> {
        let module = lookup_group(&self.root, module, Level::Module)?;
        let resource = lookup_group(module.as_ref(), resource, Level::Resource)?;
        match resource.child_by_name(action) {
            Ok(Node::Action(executor)) => Ok(executor),
            Ok(Node::Group(_)) | Err(Error::ChildNotFound { .. }) => {
                Err(Error::unresolved(Level::Action, Some(action)))
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve `[module, resource, action]` and run it through
    /// [`confirm::run`], so destructive actions still ask `prompter` first.
    pub fn run(
        &self,
        path: [&str; 3],
        parameters: &Value,
        configs: &Value,
        prompter: &dyn Prompter,
        assume_yes: bool,
    ) -> Result<Execution, Error> {
        let [module, resource, action] = path;
        let executor = self.resolve(module, resource, action)?;
        confirm::run(executor.as_ref(), parameters, configs, prompter, assume_yes)
    }

    /// Names of every module, in traversal order.
    pub fn module_names(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        self.root.visit_children(&mut |child| {
            names.push(child.name().to_owned());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(names)
    }
}

fn lookup_group(parent: &dyn Grouper, name: &str, level: Level) -> Result<Arc<dyn Grouper>, Error> {
    match parent.child_by_name(name) {
        Ok(Node::Group(group)) => Ok(group),
        Ok(Node::Action(_)) | Err(Error::ChildNotFound { .. }) => {
            Err(Error::unresolved(level, Some(name)))
        }
        Err(err) => Err(err),
    }
}
