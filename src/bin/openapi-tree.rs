use std::error::Error as _;
use std::path::PathBuf;
use std::process;

use openapi_tree::cli::{App, CliConfig, Outcome};
use openapi_tree::loader::Registry;
use openapi_tree::settings::Settings;
use openapi_tree::{logging, source, Error};
use reqwest::blocking::Client;

const CONFIG_ENV: &str = "OPENAPI_TREE_CONFIG";

fn main() {
    let config_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let settings = match Settings::load(config_file.as_deref()) {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };
    if let Err(e) = logging::init(&settings.log_level) {
        eprintln!("Warning: {}", e);
    }

    match run(&settings) {
        Ok(Outcome::Executed(value)) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        },
        Ok(Outcome::Help(text)) => println!("{}", text),
        Ok(Outcome::Declined) => eprintln!("Aborted."),
        Ok(Outcome::Unresolved { message, help }) => {
            eprintln!("{}", message);
            eprintln!("{}", help);
            process::exit(1);
        }
        Err(Error::InvalidArguments(e)) => e.exit(),
        Err(e) => fail(&e),
    }
}

fn run(settings: &Settings) -> Result<Outcome, Error> {
    let sources = source::discover(&settings.input_dir)?;
    let registry = Registry::new(sources, Client::new());
    let config = CliConfig::from_settings(
        env!("CARGO_BIN_NAME"),
        "Browse and call HTTP APIs described by OpenAPI documents",
        settings,
    );
    App::new(config, registry).run(std::env::args().skip(1))
}

fn fail(e: &Error) -> ! {
    eprintln!("Error: {}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    process::exit(1);
}
