//! Command-line front end over the lazy [`Registry`].
//!
//! Usage: `<program> [help] <module> <resource> <action> [flags]`.
//!
//! Only the levels actually named are loaded. Help at a level materializes
//! every entry of that level first, so its listing is complete. A name that
//! does not resolve produces [`Outcome::Unresolved`] together with the root
//! help.

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{ArgMatches, Command};
use serde_json::{Map, Value};
use tracing::debug;

use crate::binding::collect_parameters;
use crate::confirm::{self, Execution, Prompter, TerminalPrompter};
use crate::dispatch::{API_KEY, BASE_URL};
use crate::error::{Error, Level};
use crate::loader::Registry;
use crate::node::Descriptor;
use crate::settings::Settings;

const HELP: &str = "help";

/// Configuration for the command-line front end.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CliConfig {
    /// Root command name (e.g. "cloud", "myapi")
    pub name: String,
    /// Root command about/description
    pub about: String,
    /// Base URL used when `--base-url` is not given
    pub base_url: Option<String>,
    /// Bearer token used when `--api-key` is not given
    pub api_key: Option<String>,
    /// Skip confirmation prompts
    pub assume_yes: bool,
}

impl CliConfig {
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            base_url: None,
            api_key: None,
            assume_yes: false,
        }
    }

    pub fn from_settings(
        name: impl Into<String>,
        about: impl Into<String>,
        settings: &Settings,
    ) -> Self {
        Self::new(name, about)
            .base_url(settings.base_url.clone())
            .api_key(settings.api_key.clone())
            .assume_yes(settings.assume_yes)
    }

    pub fn base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }
}

/// What a single invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The action ran and returned this value.
    Executed(Value),
    /// A destructive action was not confirmed; nothing ran.
    Declined,
    /// Rendered help for the requested level.
    Help(String),
    /// A module, resource or action name was missing or unknown.
    Unresolved { message: String, help: String },
}

/// Parsed positional structure of an invocation.
struct Invocation<'a> {
    help: bool,
    names: Vec<&'a str>,
    flags: &'a [String],
}

impl<'a> Invocation<'a> {
    fn parse(args: &'a [String]) -> Self {
        let (mut help, rest) = match args.split_first() {
            Some((first, rest)) if first == HELP => (true, rest),
            _ => (false, args),
        };
        let names: Vec<&str> = rest
            .iter()
            .take_while(|arg| !arg.starts_with('-'))
            .take(3)
            .map(String::as_str)
            .collect();
        let flags = &rest[names.len()..];
        // Below the action level there is no clap command to handle these.
        if names.len() < 3 {
            help |= flags.iter().any(|f| f == "-h" || f == "--help");
        }
        Self { help, names, flags }
    }
}

pub struct App {
    config: CliConfig,
    registry: Registry,
    prompter: Box<dyn Prompter>,
}

impl App {
    pub fn new(config: CliConfig, registry: Registry) -> Self {
        Self {
            config,
            registry,
            prompter: Box::new(TerminalPrompter),
        }
    }

    /// Replace the interactive terminal prompt.
    pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one invocation. `args` excludes the program name.
    pub fn run<I, T>(&mut self, args: I) -> Result<Outcome, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let invocation = Invocation::parse(&args);
        debug!(names = ?invocation.names, help = invocation.help, "parsed invocation");

        let Some(&module) = invocation.names.first() else {
            if invocation.help {
                return self.root_help().map(Outcome::Help);
            }
            return self.recover(Error::unresolved(Level::Module, None));
        };
        if let Some(err) = self.registry.select_module(module).err() {
            return self.recover(err);
        }

        let Some(&resource) = invocation.names.get(1) else {
            if invocation.help {
                return self.module_help(module).map(Outcome::Help);
            }
            return self.recover(Error::unresolved(Level::Resource, None));
        };
        if let Some(err) = self.registry.select_resource(module, resource).err() {
            return self.recover(err);
        }

        let Some(&action) = invocation.names.get(2) else {
            if invocation.help {
                return self.resource_help(module, resource).map(Outcome::Help);
            }
            return self.recover(Error::unresolved(Level::Action, None));
        };

        let bin_name = format!("{} {module} {resource}", self.config.name);
        let selected = self
            .registry
            .select_action(module, resource, action)
            .map(|loaded| (Arc::clone(loaded.executor()), loaded.command(&bin_name)));
        let (executor, mut command) = match selected {
            Ok(selected) => selected,
            Err(err) => return self.recover(err),
        };
        if invocation.help {
            return Ok(Outcome::Help(command.render_help().to_string()));
        }

        let argv = std::iter::once(action.to_owned()).chain(invocation.flags.iter().cloned());
        let matches = match command.try_get_matches_from_mut(argv) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(Outcome::Help(err.render().to_string()));
            }
            Err(err) => return Err(Error::InvalidArguments(err)),
        };

        let parameters = collect_parameters(executor.parameter_schema(), &matches)?;
        let configs = self.configs(&matches);
        let assume_yes =
            self.config.assume_yes || (executor.as_confirmable().is_some() && matches.get_flag("yes"));

        match confirm::run(
            executor.as_ref(),
            &parameters,
            &configs,
            self.prompter.as_ref(),
            assume_yes,
        )? {
            Execution::Completed(value) => Ok(Outcome::Executed(value)),
            Execution::Declined => Ok(Outcome::Declined),
        }
    }

    /// Resolution failures become [`Outcome::Unresolved`]; anything else is
    /// returned as is.
    fn recover(&mut self, err: Error) -> Result<Outcome, Error> {
        if !err.is_resolution() {
            return Err(err);
        }
        debug!(error = %err, "falling back to root help");
        Ok(Outcome::Unresolved {
            message: err.to_string(),
            help: self.root_help()?,
        })
    }

    fn configs(&self, matches: &ArgMatches) -> Value {
        let mut configs = Map::new();
        let base_url = matches
            .get_one::<String>("base-url")
            .cloned()
            .or_else(|| self.config.base_url.clone());
        if let Some(url) = base_url {
            configs.insert(BASE_URL.to_owned(), Value::String(url));
        }
        let api_key = matches
            .get_one::<String>("api-key")
            .cloned()
            .or_else(|| self.config.api_key.clone());
        if let Some(key) = api_key {
            configs.insert(API_KEY.to_owned(), Value::String(key));
        }
        Value::Object(configs)
    }

    fn root_help(&mut self) -> Result<String, Error> {
        let failures = self.registry.materialize_all_modules();
        let entries = self
            .registry
            .module_names()
            .into_iter()
            .map(|name| {
                let about = match self.registry.module(name) {
                    Some(module) => module.node().description().to_owned(),
                    None => failures
                        .iter()
                        .find(|(failed, _)| failed == name)
                        .map(|(_, err)| format!("(failed to load: {err})"))
                        .unwrap_or_default(),
                };
                (name.to_owned(), about)
            })
            .collect();
        Ok(listing(
            &self.config.name,
            self.config.name.clone(),
            &self.config.about,
            Level::Module,
            entries,
        ))
    }

    fn module_help(&mut self, module: &str) -> Result<String, Error> {
        let loaded = self.registry.materialize_all_resources(module)?;
        let entries = loaded
            .resource_names()
            .into_iter()
            .map(|name| {
                let about = loaded
                    .resource(name)
                    .map(|r| r.node().description().to_owned())
                    .unwrap_or_default();
                (name.to_owned(), about)
            })
            .collect();
        let node = loaded.node();
        let about = format!("{} (version {})", node.description(), node.version());
        Ok(listing(
            module,
            format!("{} {module}", self.config.name),
            &about,
            Level::Resource,
            entries,
        ))
    }

    fn resource_help(&mut self, module: &str, resource: &str) -> Result<String, Error> {
        let loaded = self.registry.materialize_all_actions(module, resource)?;
        let entries = loaded
            .action_names()
            .into_iter()
            .map(|name| {
                let about = loaded
                    .action(name)
                    .map(|a| a.executor().description().to_owned())
                    .unwrap_or_default();
                (name.to_owned(), about)
            })
            .collect();
        let about = loaded.node().description().to_owned();
        Ok(listing(
            resource,
            format!("{} {module} {resource}", self.config.name),
            &about,
            Level::Action,
            entries,
        ))
    }
}

/// Help text listing the children of one level.
fn listing(
    name: &str,
    bin_name: String,
    about: &str,
    level: Level,
    entries: Vec<(String, String)>,
) -> String {
    let (value_name, heading) = match level {
        Level::Module => ("MODULE", "Modules"),
        Level::Resource => ("RESOURCE", "Resources"),
        Level::Action => ("ACTION", "Actions"),
    };
    let mut cmd = Command::new(name.to_owned())
        .bin_name(bin_name)
        .about(about.to_owned())
        .subcommand_value_name(value_name)
        .subcommand_help_heading(heading)
        .disable_help_subcommand(true);
    for (name, about) in entries {
        cmd = cmd.subcommand(Command::new(name).about(about));
    }
    cmd.render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::discover;
    use reqwest::blocking::Client;
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    /// Answers with a fixed value and records each message.
    #[derive(Clone)]
    struct Scripted {
        answer: bool,
        asked: Rc<RefCell<Vec<String>>>,
    }

    impl Scripted {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Prompter for Scripted {
        fn confirm(&self, message: &str) -> Result<bool, Error> {
            self.asked.borrow_mut().push(message.to_owned());
            Ok(self.answer)
        }
    }

    fn write_docs(dir: &Path, server: &str) {
        let compute = json!({
            "info": {"title": "Compute API", "version": "2.1"},
            "servers": [{"url": server}],
            "paths": {
                "/instances": {
                    "get": {"summary": "List instances", "tags": ["Instances"],
                            "parameters": [{"name": "limit", "in": "query", "schema": {"type": "integer"}}]},
                    "post": {"summary": "Create an instance", "tags": ["Instances"],
                             "requestBody": {"required": true,
                                             "content": {"application/json": {"schema": {"type": "object"}}}}}
                },
                "/instances/{id}": {
                    "parameters": [{"name": "id", "in": "path", "schema": {"type": "string"}}],
                    "get": {"summary": "Show an instance", "tags": ["Instances"]},
                    "delete": {"summary": "Delete an instance", "tags": ["Instances"]}
                },
                "/images": {"get": {"summary": "List images", "tags": ["Images"]}}
            }
        });
        let storage = json!({
            "info": {"title": "Storage API", "version": "1.0"},
            "paths": {"/buckets": {"get": {"tags": ["Buckets"]}}}
        });
        fs::write(dir.join("compute.json"), compute.to_string()).unwrap();
        fs::write(dir.join("storage.json"), storage.to_string()).unwrap();
    }

    fn app(dir: &Path, prompter: Scripted) -> App {
        let registry = Registry::new(discover(dir).unwrap(), Client::new());
        App::new(CliConfig::new("cloud", "Cloud control"), registry).with_prompter(prompter)
    }

    fn unresolved(outcome: Outcome) -> (String, String) {
        match outcome {
            Outcome::Unresolved { message, help } => (message, help),
            other => panic!("expected unresolved outcome, got {other:?}"),
        }
    }

    fn help(outcome: Outcome) -> String {
        match outcome {
            Outcome::Help(text) => text,
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn missing_module_reports_and_shows_root_help() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        let mut app = app(dir.path(), Scripted::new(false));

        let (message, help) = unresolved(app.run(Vec::<String>::new()).unwrap());
        assert_eq!(message, "Invalid or missing module name!");
        assert!(help.contains("compute"), "{help}");
        assert!(help.contains("Storage API"), "{help}");
    }

    #[test]
    fn unknown_names_report_their_level() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        let mut app = app(dir.path(), Scripted::new(false));

        let (message, _) = unresolved(app.run(["network"]).unwrap());
        assert_eq!(message, "Invalid or missing module name!");
        let (message, _) = unresolved(app.run(["compute", "volumes"]).unwrap());
        assert_eq!(message, "Invalid or missing resource name!");
        let (message, _) = unresolved(app.run(["compute", "instances"]).unwrap());
        assert_eq!(message, "Invalid or missing action name!");
        let (message, _) = unresolved(app.run(["compute", "instances", "reboot"]).unwrap());
        assert_eq!(message, "Invalid or missing action name!");
    }

    #[test]
    fn help_lists_each_level() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        let mut app = app(dir.path(), Scripted::new(false));

        let root = help(app.run(["help"]).unwrap());
        assert!(root.contains("Compute API") && root.contains("storage"), "{root}");

        let module = help(app.run(["help", "compute"]).unwrap());
        assert!(module.contains("images") && module.contains("Manage Instances"), "{module}");
        assert!(module.contains("version 2.1"), "{module}");

        let resource = help(app.run(["compute", "instances", "--help"]).unwrap());
        for action in ["get", "post", "get-id", "delete-id"] {
            assert!(resource.contains(action), "{action} missing from {resource}");
        }
        assert!(resource.contains("Show an instance"), "{resource}");

        let action = help(app.run(["help", "compute", "instances", "delete-id"]).unwrap());
        assert!(action.contains("--id") && action.contains("--yes"), "{action}");
    }

    #[test]
    fn action_help_flag_is_handled_by_the_action() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        let mut app = app(dir.path(), Scripted::new(false));

        let text = help(app.run(["compute", "instances", "get", "--help"]).unwrap());
        assert!(text.contains("--limit"), "{text}");
    }

    #[test]
    fn direct_invocation_loads_one_entry_per_level() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/instances")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"i-1"},{"id":"i-2"}]"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), &server.url());
        let mut app = app(dir.path(), Scripted::new(false));

        let outcome = app.run(["compute", "instances", "get", "--limit", "2"]).unwrap();
        assert_eq!(outcome, Outcome::Executed(json!([{"id": "i-1"}, {"id": "i-2"}])));
        mock.assert();

        let stats = app.registry().stats();
        assert_eq!((stats.modules, stats.resources, stats.actions), (1, 1, 1));
    }

    #[test]
    fn body_flags_are_sent_as_json() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/instances")
            .match_body(mockito::Matcher::Json(json!({"name": "web", "size": 2})))
            .with_status(201)
            .with_body(r#"{"id":"i-3"}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), &server.url());
        let mut app = app(dir.path(), Scripted::new(false));

        let outcome = app
            .run(["compute", "instances", "post", "-f", "name=web", "-f", "size=2"])
            .unwrap();
        assert_eq!(outcome, Outcome::Executed(json!({"id": "i-3"})));
        mock.assert();
    }

    #[test]
    fn base_url_flag_overrides_document_server() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/images")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body("[]")
            .create();

        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://127.0.0.1:9");
        let mut app = app(dir.path(), Scripted::new(false));

        let url = server.url();
        let outcome = app
            .run(["compute", "images", "get", "--base-url", url.as_str(), "--api-key", "secret"])
            .unwrap();
        assert_eq!(outcome, Outcome::Executed(json!([])));
        mock.assert();
    }

    #[test]
    fn delete_is_declined_without_confirmation() {
        let mut server = mockito::Server::new();
        let mock = server.mock("DELETE", "/instances/i-1").expect(0).create();

        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), &server.url());
        let prompter = Scripted::new(false);
        let mut app = app(dir.path(), prompter.clone());

        let outcome = app.run(["compute", "instances", "delete-id", "--id", "i-1"]).unwrap();
        assert_eq!(outcome, Outcome::Declined);
        assert_eq!(
            *prompter.asked.borrow(),
            ["Delete instances (id=i-1)? This cannot be undone."]
        );
        mock.assert();
    }

    #[test]
    fn delete_runs_with_yes_flag() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/instances/i-1")
            .with_status(204)
            .create();

        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), &server.url());
        let prompter = Scripted::new(false);
        let mut app = app(dir.path(), prompter.clone());

        let outcome = app
            .run(["compute", "instances", "delete-id", "--id", "i-1", "--yes"])
            .unwrap();
        assert!(matches!(outcome, Outcome::Executed(_)));
        assert!(prompter.asked.borrow().is_empty());
        mock.assert();
    }

    #[test]
    fn missing_required_flag_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        let mut app = app(dir.path(), Scripted::new(true));

        let err = app.run(["compute", "instances", "get-id"]).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)), "{err:?}");
    }

    #[test]
    fn broken_module_is_listed_with_its_error() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path(), "http://unused");
        fs::write(dir.path().join("billing.yaml"), "paths: [unclosed").unwrap();
        let mut app = app(dir.path(), Scripted::new(false));

        let root = help(app.run(["help"]).unwrap());
        assert!(root.contains("billing") && root.contains("failed to load"), "{root}");

        let err = app.run(["billing", "invoices", "get"]).unwrap_err();
        assert!(matches!(err, Error::Build { .. }));
    }
}
