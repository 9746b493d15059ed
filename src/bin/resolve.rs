//! Resolve newline-delimited utterances from stdin against a catalog file.
//!
//! ```text
//! nura-resolve [--config <config.toml>] --catalog <catalog.toml> [--locale <tag>]
//! ```
//!
//! Without `--config` the default config path is used when that file exists
//! (see [`ResolverConfig::default_config_path`]).
//!
//! Prints one JSON resolution per input line on stdout. With `trace = true`
//! in the config each line is `{"resolution": ..., "trace": ...}` instead.
//! Logs go to stderr.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use nura::{Catalog, Lexicon, Resolver, ResolverConfig};

struct Args {
    config: Option<PathBuf>,
    catalog: PathBuf,
    locale: Option<String>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut config = None;
    let mut catalog = None;
    let mut locale = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a path")?)),
            "--catalog" => {
                catalog = Some(PathBuf::from(args.next().context("--catalog needs a path")?));
            }
            "--locale" => locale = Some(args.next().context("--locale needs a tag")?),
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => bail!("unknown argument `{other}`"),
        }
    }
    let Some(catalog) = catalog else {
        print_usage();
        bail!("--catalog is required");
    };
    Ok(Some(Args {
        config,
        catalog,
        locale,
    }))
}

fn print_usage() {
    eprintln!("usage: nura-resolve [--config <config.toml>] --catalog <catalog.toml> [--locale <tag>]");
}

fn main() -> anyhow::Result<()> {
    // stdout carries one JSON document per line; logs stay on stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let path = ResolverConfig::default_config_path();
            tracing::debug!(path = %path.display(), "no --config given, trying default path");
            ResolverConfig::load_or_default(&path)
                .with_context(|| format!("loading config {}", path.display()))?
        }
    };
    let catalog = Catalog::from_file(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog.display()))?;

    let lexicon = Arc::new(Lexicon::new());
    nura::seed_lexicon(&lexicon);
    let resolver = Resolver::new(config, lexicon)?;
    resolver.load_catalog(catalog)?;
    tracing::info!(specs = resolver.specs().len(), "nura-resolve ready");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let (resolution, trace) = resolver.resolve_traced(&line, args.locale.as_deref())?;
        let json = match trace {
            Some(trace) => serde_json::json!({
                "resolution": serde_json::to_value(&resolution)?,
                "trace": serde_json::to_value(&trace)?,
            }),
            None => serde_json::to_value(&resolution)?,
        };
        writeln!(stdout, "{json}")?;
    }
    Ok(())
}
