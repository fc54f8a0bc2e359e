use clap::Parser;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use torflux::FluxConfig;

pub mod control;
pub mod logging;
pub mod refresh;

/// Long options that older callers spell with a single dash (`-config dns`).
const SINGLE_DASH_LONG: &[&str] = &["config", "action"];

#[derive(Parser, Debug)]
#[command(name = "torflux")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rotate Tor circuits on the local control ports", long_about = None)]
pub struct Cli {
    /// Act on the main or dns Tor instance only (sends SIGNAL HUP unless --action is given)
    #[arg(long, value_name = "TARGET")]
    pub config: Option<String>,

    /// Action for the --config instance: start, stop, hup or newnym
    #[arg(long, value_name = "ACTION")]
    pub action: Option<String>,

    /// Path to a TOML settings file (defaults are used when omitted)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Exit with status 1 if any control endpoint fails
    #[arg(long)]
    pub strict: bool,

    /// Rotate a second time and report whether the circuit listing changed
    #[arg(long)]
    pub verify_change: bool,

    /// Print the default settings file and exit
    #[arg(long)]
    pub print_default_settings: bool,

    /// Debug-level diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse `args`, accepting `-config`/`-action` as well as the double-dash forms.
    pub fn parse_compat<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::parse_from(normalize_args(args))
    }

    /// Fold command-line switches into the loaded configuration.
    fn apply(&self, config: &mut FluxConfig) {
        if self.strict {
            config.refresh.strict = true;
        }
        if self.verify_change {
            config.refresh.verify_change = true;
        }
    }
}

pub async fn execute(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    if cli.print_default_settings {
        io::stdout().write_all(FluxConfig::generate_default_toml().as_bytes())?;
        return Ok(0);
    }

    let mut config = match &cli.settings {
        Some(path) => FluxConfig::load(path)?,
        None => FluxConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.logging.level, cli.verbose);

    if cli.config.is_none() && cli.action.is_none() {
        return refresh::execute(&config).await;
    }
    control::execute(
        &config,
        cli.config.as_deref().unwrap_or_default(),
        cli.action.as_deref(),
    )
    .await
}

/// Rewrite `-config`, `-action`, `-config=x` and `-action=x` to their
/// double-dash forms. Everything else passes through untouched.
fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_LONG.contains(&name) {
                OsString::from(format!("--{rest}"))
            } else {
                arg
            }
        })
        .collect()
}
