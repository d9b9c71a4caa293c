// ABOUTME: CLI binary for kabigon: loads a URL through a loader chain and prints the extracted text.
// ABOUTME: Supports listing loaders, selecting a custom chain, and chain policy flags.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use kabigon::registry::{build_loaders, default_loaders, parse_loader_names};
use kabigon::{Compose, EnvironmentPolicy, HttpOptions, Loader, LOADER_SPECS};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Loader names validated against the registry at parse time.
#[derive(Debug, Clone)]
struct LoaderNames(Vec<String>);

fn parse_loader_list(raw: &str) -> Result<LoaderNames, kabigon::RegistryError> {
    parse_loader_names(raw).map(LoaderNames)
}

#[derive(Parser, Debug)]
#[command(name = "kabigon")]
#[command(about = "Extract text from a URL by trying loaders until one works")]
struct Args {
    /// URL to load
    #[arg(value_name = "URL", required_unless_present = "list")]
    url: Option<String>,

    /// Comma-separated loader names, tried in the given order
    #[arg(long = "loader", value_name = "NAMES", value_parser = parse_loader_list)]
    loader: Option<LoaderNames>,

    /// List supported loaders
    #[arg(long = "list", conflicts_with_all = ["url", "loader"])]
    list: bool,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Per-request timeout in seconds for HTTP-based loaders
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Overall time budget in seconds for the whole chain
    #[arg(long = "budget", value_name = "SECS")]
    budget: Option<u64>,

    /// Stop at the first missing dependency or configuration error
    #[arg(long = "fail-fast")]
    fail_fast: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Log every loader attempt to stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,kabigon=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_loader_list() {
    for spec in LOADER_SPECS {
        println!("{} - {}", spec.name, spec.description);
    }
}

/// A single selected loader runs on its own unless chain flags were given;
/// anything else becomes a chain.
fn select_loader(
    args: &Args,
    opts: &HttpOptions,
) -> Result<Arc<dyn Loader>, kabigon::RegistryError> {
    let mut loaders = match args.loader {
        Some(LoaderNames(ref names)) => build_loaders(names.as_slice(), opts)?,
        None => default_loaders(opts),
    };
    let chain_flags = args.fail_fast || args.budget.is_some();
    if args.loader.is_some() && loaders.len() == 1 && !chain_flags {
        if let Some(only) = loaders.pop() {
            return Ok(only);
        }
    }

    let policy = if args.fail_fast {
        EnvironmentPolicy::Abort
    } else {
        EnvironmentPolicy::Continue
    };
    let mut builder = Compose::builder().loaders(loaders).policy(policy);
    if let Some(secs) = args.budget {
        builder = builder.budget(Duration::from_secs(secs));
    }
    Ok(Arc::new(builder.build()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.list {
        print_loader_list();
        return ExitCode::SUCCESS;
    }

    let Some(url) = args.url.as_deref() else {
        eprintln!("error: URL is required unless --list is used");
        return ExitCode::from(2);
    };

    let opts = HttpOptions::new()
        .timeout(Duration::from_secs(args.timeout))
        .allow_private_networks(args.allow_private_networks);

    let loader = match select_loader(&args, &opts) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    debug!(url, loader = loader.name(), "loading");
    let start = Instant::now();
    let result = loader.load(url).await;
    let elapsed = start.elapsed();

    let mut had_error = false;
    match result {
        Ok(text) => {
            if let Some(output_path) = &args.output {
                if let Err(e) = fs::write(output_path, &text) {
                    eprintln!("error writing to {:?}: {}", output_path, e);
                    had_error = true;
                }
            } else {
                println!("{}", text);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            had_error = true;
        }
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
