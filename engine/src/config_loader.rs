use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};

use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::infrastructure_config::Config;

/// Defaults ← `config.toml` ← `config.json` ← `PIXELHAWK_` environment,
/// with a `--nest` command-line override beating all of them.
pub fn load_config(nest_override: Option<PathBuf>) -> AppResult<Config> {
    let default_config = Config::default();
    let mut figment = Figment::from(Serialized::defaults(default_config));

    if Path::new("config.toml").exists() {
        figment = figment.merge(Toml::file("config.toml"));
    }

    if Path::new("config.json").exists() {
        figment = figment.merge(Json::file("config.json"));
    }

    let mut config: Config = figment
        .merge(Env::prefixed("PIXELHAWK_").split("__"))
        .extract()
        .map_err(|e| AppError::Config {
            message: format!("Failed to load configuration: {e}"),
        })?;

    if let Some(root) = nest_override {
        config.nest.root = root;
    }

    config.validate()?;
    Ok(config)
}

/// Pick `--nest <dir>` (or `--nest=<dir>`) out of the command line.
pub fn nest_override_from_args<I>(args: I) -> AppResult<Option<PathBuf>>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--nest" {
            let Some(value) = args.next() else {
                return Err(AppError::Config {
                    message: "--nest requires a directory argument".to_string(),
                });
            };
            return Ok(Some(PathBuf::from(value)));
        }
        if let Some(value) = arg.strip_prefix("--nest=") {
            return Ok(Some(PathBuf::from(value)));
        }
    }
    Ok(None)
}
