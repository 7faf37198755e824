//! Browse and call HTTP APIs described by OpenAPI documents as a
//! module → resource → action command tree.
//!
//! Each API description document becomes a module, its tags become
//! resources and its operations become actions. Documents that share a
//! module name are combined with [`MergeGroup`]. The command-line front end
//! ([`cli::App`]) loads the tree lazily through a [`loader::Registry`], so
//! invoking one action only parses the documents of its module.
//!
//! # Usage
//!
//! ```no_run
//! use openapi_tree::confirm::{Decline, Execution};
//! use openapi_tree::{source, Catalog, Executor};
//! use reqwest::blocking::Client;
//! use serde_json::json;
//!
//! let sources = source::discover("apis".as_ref()).unwrap();
//! let catalog = Catalog::load("cloud", &sources, &Client::new()).unwrap();
//! let configs = json!({"base_url": "https://api.example.com"});
//!
//! let action = catalog.resolve("compute", "instances", "get-id").unwrap();
//! let instance = action.execute(&json!({"id": "i-1"}), &configs).unwrap();
//! println!("{instance}");
//!
//! // Destructive actions refuse a plain `execute`; run them through a
//! // prompter, or pass `assume_yes` once consent was obtained elsewhere.
//! let path = ["compute", "instances", "delete-id"];
//! match catalog.run(path, &json!({"id": "i-1"}), &configs, &Decline, false).unwrap() {
//!     Execution::Completed(value) => println!("{value}"),
//!     Execution::Declined => println!("not deleted"),
//! }
//! ```

pub mod binding;
pub mod cli;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod naming;
pub mod node;
pub mod settings;
pub mod source;
pub mod spec;
pub mod tree;
pub mod value;

pub use confirm::{ConfirmAction, Prompter};
pub use dispatch::{dispatch, HttpAction};
pub use error::{BuildError, DispatchError, Error, Level};
pub use merge::MergeGroup;
pub use naming::{derive_name, normalize_group, normalize_operation_id};
pub use node::{
    Confirmable, Descriptor, Executor, Grouper, Info, LazyAction, Node, StaticGroup, Traversal,
};
pub use source::SourceRef;
pub use spec::{extract_operations, parse_document, resolve_refs, ApiDocument, ApiOperation, Param};
pub use tree::Catalog;
pub use value::{Field, FieldKind, Schema};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
