// Configuration sources: defaults, optional file, environment
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `ANALYTICS__REDIS__HOST`.
pub const ENV_PREFIX: &str = "ANALYTICS";

/// Nesting separator for environment keys.
pub const ENV_SEPARATOR: &str = "__";

/// Builder with the standard source order: file (if given) then environment.
///
/// Missing files are an error only when a path was given explicitly.
pub fn layered(path: Option<&Path>) -> ConfigBuilder<DefaultState> {
    let mut builder = Config::builder();

    builder = match path {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => builder.add_source(File::with_name("analytics").required(false)),
    };

    builder.add_source(environment())
}

/// Builder reading a single in-memory TOML document. No environment layer.
pub fn from_toml_str(contents: &str) -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(contents, FileFormat::Toml))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
