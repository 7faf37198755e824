//! Lazy three-level command loader.
//!
//! Every level of the hierarchy is a name-indexed map of [`Slot`]s. A slot
//! starts out [`Slot::Registered`] with a cheap seed and is turned into
//! its loaded form the first time something selects it. Module seeds are
//! unparsed sources, resource seeds are unvisited groups, and action seeds
//! are unbuilt executor handles ([`crate::node::LazyAction`]). Direct
//! invocation of one action therefore runs one loader per level no matter
//! how many siblings are registered; help at a level materializes all of them.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::binding::flag_args;
use crate::error::{Error, Level};
use crate::node::{Descriptor, Executor, Grouper, Node};
use crate::source::SourceRef;
use crate::tree::module_node;

/// A registered entry, before or after its loader ran.
#[derive(Debug)]
pub enum Slot<S, L> {
    Registered(S),
    Materialized(L),
}

impl<S, L> Slot<S, L> {
    /// Run `load` on the seed unless the slot is already materialized.
    /// A failed load leaves the slot registered.
    fn materialize(&mut self, load: impl FnOnce(&S) -> Result<L, Error>) -> Result<&mut L, Error> {
        if let Slot::Registered(seed) = self {
            let loaded = load(seed)?;
            *self = Slot::Materialized(loaded);
        }
        match self {
            Slot::Materialized(loaded) => Ok(loaded),
            Slot::Registered(_) => unreachable!("slot materialized above"),
        }
    }

    pub fn loaded(&self) -> Option<&L> {
        match self {
            Slot::Materialized(loaded) => Some(loaded),
            Slot::Registered(_) => None,
        }
    }
}

/// Number of loaders that have run at each level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub modules: usize,
    pub resources: usize,
    pub actions: usize,
}

type ModuleSlot = Slot<Vec<SourceRef>, LoadedModule>;
type ResourceSlot = Slot<Arc<dyn Grouper>, LoadedResource>;
type ActionSlot = Slot<Arc<dyn Executor>, ActionCommand>;

/// Entry point of the loader: one slot per module found by discovery.
pub struct Registry {
    modules: BTreeMap<String, ModuleSlot>,
    client: Client,
    stats: LoadStats,
}

impl Registry {
    /// Register one module per distinct module name. Nothing is parsed.
    pub fn new(sources: impl IntoIterator<Item = SourceRef>, client: Client) -> Self {
        let mut grouped: BTreeMap<String, Vec<SourceRef>> = BTreeMap::new();
        for source in sources {
            grouped.entry(source.module.clone()).or_default().push(source);
        }

        let mut registry = Self {
            modules: BTreeMap::new(),
            client,
            stats: LoadStats::default(),
        };
        for (name, sources) in grouped {
            registry.register_module(name, sources);
        }
        registry
    }

    /// Register `name`, replacing any earlier registration of that name.
    pub fn register_module(&mut self, name: impl Into<String>, sources: Vec<SourceRef>) {
        let name = name.into();
        debug!(module = %name, sources = sources.len(), "registered module");
        self.modules.insert(name, Slot::Registered(sources));
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// The module, if it has been materialized.
    pub fn module(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.get(name)?.loaded()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Parse the module's documents and register its resources.
    pub fn select_module(&mut self, name: &str) -> Result<&mut LoadedModule, Error> {
        let Self {
            modules,
            client,
            stats,
        } = self;
        load_module(modules, client, stats, name)
    }

    /// Register the actions of one resource.
    pub fn select_resource(
        &mut self,
        module: &str,
        resource: &str,
    ) -> Result<&mut LoadedResource, Error> {
        let Self {
            modules,
            client,
            stats,
        } = self;
        let module = load_module(modules, client, stats, module)?;
        load_resource(module, stats, resource)
    }

    /// Build the command node of one action. Flags stay unbound until
    /// [`ActionCommand::load_flags`].
    pub fn select_action(
        &mut self,
        module: &str,
        resource: &str,
        action: &str,
    ) -> Result<&mut ActionCommand, Error> {
        let Self {
            modules,
            client,
            stats,
        } = self;
        let module = load_module(modules, client, stats, module)?;
        let resource = load_resource(module, stats, resource)?;
        load_action(resource, stats, action)
    }

    /// Materialize every module, for root help. Modules that fail to build
    /// are reported and stay registered; the rest are still usable.
    pub fn materialize_all_modules(&mut self) -> Vec<(String, Error)> {
        let names: Vec<String> = self.modules.keys().cloned().collect();
        let mut failures = Vec::new();
        for name in names {
            if let Err(err) = self.select_module(&name) {
                warn!(module = %name, error = %err, "module failed to load");
                failures.push((name, err));
            }
        }
        failures
    }

    /// Materialize every resource of `module`, for module help.
    pub fn materialize_all_resources(&mut self, module: &str) -> Result<&mut LoadedModule, Error> {
        let Self {
            modules,
            client,
            stats,
        } = self;
        let loaded = load_module(modules, client, stats, module)?;
        let names: Vec<String> = loaded.resources.keys().cloned().collect();
        for name in names {
            load_resource(loaded, stats, &name)?;
        }
        Ok(loaded)
    }

    /// Materialize every action of one resource, for resource help.
    pub fn materialize_all_actions(
        &mut self,
        module: &str,
        resource: &str,
    ) -> Result<&mut LoadedResource, Error> {
        let Self {
            modules,
            client,
            stats,
        } = self;
        let module = load_module(modules, client, stats, module)?;
        let loaded = load_resource(module, stats, resource)?;
        let names: Vec<String> = loaded.actions.keys().cloned().collect();
        for name in names {
            load_action(loaded, stats, &name)?;
        }
        Ok(loaded)
    }
}

fn load_module<'a>(
    modules: &'a mut BTreeMap<String, ModuleSlot>,
    client: &Client,
    stats: &mut LoadStats,
    name: &str,
) -> Result<&'a mut LoadedModule, Error> {
    let slot = modules
        .get_mut(name)
        .ok_or_else(|| Error::unresolved(Level::Module, Some(name)))?;
    slot.materialize(|sources| {
        let node = module_node(name, sources, client)?;
        let loaded = LoadedModule::new(node)?;
        stats.modules += 1;
        debug!(module = name, resources = loaded.resources.len(), "materialized module");
        Ok(loaded)
    })
}

fn load_resource<'a>(
    module: &'a mut LoadedModule,
    stats: &mut LoadStats,
    name: &str,
) -> Result<&'a mut LoadedResource, Error> {
    let slot = module
        .resources
        .get_mut(name)
        .ok_or_else(|| Error::unresolved(Level::Resource, Some(name)))?;
    slot.materialize(|node| {
        let loaded = LoadedResource::new(node)?;
        stats.resources += 1;
        debug!(resource = name, actions = loaded.actions.len(), "materialized resource");
        Ok(loaded)
    })
}

fn load_action<'a>(
    resource: &'a mut LoadedResource,
    stats: &mut LoadStats,
    name: &str,
) -> Result<&'a mut ActionCommand, Error> {
    let slot = resource
        .actions
        .get_mut(name)
        .ok_or_else(|| Error::unresolved(Level::Action, Some(name)))?;
    slot.materialize(|executor| {
        executor.prepare();
        stats.actions += 1;
        debug!(action = name, "materialized action");
        Ok(ActionCommand::new(Arc::clone(executor)))
    })
}

/// A module whose document(s) have been parsed.
pub struct LoadedModule {
    node: Arc<dyn Grouper>,
    resources: BTreeMap<String, ResourceSlot>,
}

impl LoadedModule {
    fn new(node: Arc<dyn Grouper>) -> Result<Self, Error> {
        let mut resources = BTreeMap::new();
        node.visit_children(&mut |child| {
            match child {
                Node::Group(group) => {
                    resources
                        .entry(group.name().to_owned())
                        .or_insert_with(|| Slot::Registered(Arc::clone(group)));
                }
                Node::Action(action) => {
                    warn!(
                        module = node.name(),
                        action = action.name(),
                        "ignoring action outside of a resource"
                    );
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(Self { node, resources })
    }

    pub fn node(&self) -> &Arc<dyn Grouper> {
        &self.node
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// The resource, if it has been materialized.
    pub fn resource(&self, name: &str) -> Option<&LoadedResource> {
        self.resources.get(name)?.loaded()
    }
}

/// A resource whose actions have been registered.
pub struct LoadedResource {
    node: Arc<dyn Grouper>,
    actions: BTreeMap<String, ActionSlot>,
}

impl LoadedResource {
    fn new(node: &Arc<dyn Grouper>) -> Result<Self, Error> {
        let mut actions = BTreeMap::new();
        node.visit_children(&mut |child| {
            match child {
                Node::Action(action) => {
                    if actions.contains_key(action.name()) {
                        // Same action contributed by a later document.
                        warn!(
                            resource = node.name(),
                            action = action.name(),
                            "duplicate action, keeping the first"
                        );
                    } else {
                        actions.insert(action.name().to_owned(), Slot::Registered(Arc::clone(action)));
                    }
                }
                Node::Group(group) => {
                    warn!(
                        resource = node.name(),
                        group = group.name(),
                        "ignoring nested group below a resource"
                    );
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(Self {
            node: Arc::clone(node),
            actions,
        })
    }

    pub fn node(&self) -> &Arc<dyn Grouper> {
        &self.node
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// The action, if it has been materialized.
    pub fn action(&self, name: &str) -> Option<&ActionCommand> {
        self.actions.get(name)?.loaded()
    }
}

/// Command node of one action. Flag bindings are computed on first use.
pub struct ActionCommand {
    executor: Arc<dyn Executor>,
    flags: Option<Vec<Arg>>,
}

impl ActionCommand {
    fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            flags: None,
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn flags_loaded(&self) -> bool {
        self.flags.is_some()
    }

    /// Bind the executor's parameter schema to flags.
    pub fn load_flags(&mut self) -> &[Arg] {
        let executor = &self.executor;
        self.flags.get_or_insert_with(|| {
            debug!(action = executor.name(), "binding flags");
            flag_args(executor.parameter_schema())
        })
    }

    /// Full clap command for parsing and help. `bin_name` is the usage prefix.
    pub fn command(&mut self, bin_name: &str) -> Command {
        let confirmable = self.executor.as_confirmable().is_some();
        let mut cmd = Command::new(self.executor.name().to_owned())
            .bin_name(bin_name.to_owned())
            .about(self.executor.description().to_owned())
            .args(self.load_flags().to_vec())
            .arg(
                Arg::new("base-url")
                    .long("base-url")
                    .value_name("URL")
                    .help("API base URL")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("api-key")
                    .long("api-key")
                    .value_name("TOKEN")
                    .help("Bearer token")
                    .action(ArgAction::Set),
            );
        if confirmable {
            cmd = cmd.arg(
                Arg::new("yes")
                    .long("yes")
                    .short('y')
                    .help("Skip the confirmation prompt")
                    .action(ArgAction::SetTrue),
            );
        }
        cmd
    }
}
