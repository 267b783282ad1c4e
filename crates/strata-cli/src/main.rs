//! strata CLI entry point.
//!
//! Usage:
//!   strata mod get [args...]     # Resolve dependencies in the project
//!   strata mod graph             # Print the module dependency graph
//!   strata mod init [path]       # Initialize a module manifest
//!   strata mod vendor            # Vendor the dependencies below _vendor
//!   strata mod tidy              # Drop unused entries from the manifest
//!
//! Components are always resolved from a _vendor directory first (unless
//! ignore_vendor is set), then the module manager, then the themes
//! directory.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::modules::{decode_config_file, Client, ClientConfig, ModuleConfig};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("mod") => run_mod(&args[2..]),

        Some("--help" | "-h") | None => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("strata {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some(unknown) => {
            eprintln!("Unknown command: {unknown}");
            eprintln!("Run 'strata --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"strata v{}

Usage:
  strata mod get [args...]     Resolve dependencies in the project
  strata mod graph             Print the module dependency graph
  strata mod init [path]       Initialize a module manifest
  strata mod vendor            Vendor the dependencies below _vendor
  strata mod tidy              Drop unused entries from the manifest

Options:
  -h, --help                   Show this help
  -V, --version                Show version
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn run_mod(args: &[String]) -> Result<ExitCode> {
    let Some(sub) = args.first() else {
        print_help();
        return Ok(ExitCode::FAILURE);
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    rt.block_on(async {
        let mut client = new_mod_client().await?;

        match sub.as_str() {
            "get" => client.get(&args[1..]).await?,
            "graph" => {
                let mut stdout = std::io::stdout().lock();
                client.graph(&mut stdout).await?;
                stdout.flush()?;
            }
            "init" => {
                let path = args.get(1).map(String::as_str).unwrap_or_default();
                client.init(path).await?;
            }
            "vendor" => client.vendor().await?,
            "tidy" => client.tidy().await?,
            unknown => {
                eprintln!("Unknown mod command: {unknown}");
                eprintln!("Run 'strata --help' for usage.");
                return Ok(ExitCode::FAILURE);
            }
        }

        Ok(ExitCode::SUCCESS)
    })
}

/// The site configuration keys this command needs.
#[derive(Debug, Default, Deserialize)]
struct SiteConfig {
    #[serde(default)]
    themes_dir: Option<String>,
    #[serde(default)]
    ignore_vendor: bool,
    #[serde(default)]
    mod_proxy: Option<String>,
}

async fn new_mod_client() -> Result<Client> {
    let working_dir = env::current_dir().context("cannot determine working dir")?;

    let (site, module_config) = load_site_config(&working_dir).await?;

    let themes_dir = match site.themes_dir {
        Some(dir) if Path::new(&dir).is_absolute() => PathBuf::from(dir),
        Some(dir) => working_dir.join(dir),
        None => working_dir.join("themes"),
    };

    Ok(Client::new(ClientConfig {
        working_dir,
        themes_dir,
        ignore_vendor: site.ignore_vendor,
        mod_proxy: site.mod_proxy,
        module_config,
    }))
}

/// Read config.{toml,json} from the working dir, if present.
async fn load_site_config(working_dir: &Path) -> Result<(SiteConfig, ModuleConfig)> {
    for ext in ["toml", "json"] {
        let filename = working_dir.join(format!("config.{ext}"));
        let contents = match tokio::fs::read_to_string(&filename).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e).with_context(|| format!("reading {}", filename.display())),
        };

        let site: SiteConfig = match ext {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("parsing {}", filename.display()))?,
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", filename.display()))?,
        };
        let module_config = decode_config_file(&filename, &contents)?;

        return Ok((site, module_config));
    }

    Ok((SiteConfig::default(), ModuleConfig::default()))
}
