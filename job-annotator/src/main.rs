//! Job Annotator - command line entry point
//!
//! Annotates a saved job board page against the running match service and
//! writes the badged HTML back out.
//!
//! # Usage
//!
//! ```bash
//! # Annotate a saved LinkedIn search page
//! job-annotator --url "https://www.linkedin.com/jobs/search/?keywords=rust" --html page.html
//!
//! # Keep scanning for 30 seconds, reading the page from stdin
//! curl -s "$URL" | job-annotator --url "$URL" --duration 30 > annotated.html
//! ```

use job_annotator::{Annotator, Config, Page, SiteRegistry, SocketTransport};
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Command line options
#[derive(Debug, Clone, Default)]
struct CliArgs {
    /// URL the page was served from
    url: Option<String>,
    /// HTML file to annotate (stdin when absent or "-")
    html_path: Option<PathBuf>,
    /// Path to config file
    config_path: Option<PathBuf>,
    /// Match service socket, overrides the config
    socket_path: Option<PathBuf>,
    /// How long to keep scanning
    duration: Option<u64>,
    /// Where to write the annotated page (stdout when absent)
    output_path: Option<PathBuf>,
    /// Write the effective configuration and exit
    write_config: bool,
}

/// Parse command line arguments
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Job Annotator v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--url" | "-u" => {
                i += 1;
                if i < args.len() {
                    cli.url = Some(args[i].clone());
                }
            }
            "--html" => {
                i += 1;
                if i < args.len() && args[i] != "-" {
                    cli.html_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    cli.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--socket" => {
                i += 1;
                if i < args.len() {
                    cli.socket_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--duration" => {
                i += 1;
                if i < args.len() {
                    if let Ok(secs) = args[i].parse() {
                        cli.duration = Some(secs);
                    }
                }
            }
            "--write-config" => {
                cli.write_config = true;
            }
            "--output" | "-o" => {
                i += 1;
                if i < args.len() {
                    cli.output_path = Some(PathBuf::from(&args[i]));
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn print_help() {
    println!(
        r#"Job Annotator - badge job listings that match your résumé

USAGE:
    job-annotator --url <URL> [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    -u, --url <URL>         URL the page was served from (required)
        --html <FILE>       HTML file to annotate (default: stdin)
    -c, --config <FILE>     Path to config file
        --socket <PATH>     Match service socket (default from config)
        --duration <SECS>   Keep scanning for this long (default: one scan)
    -o, --output <FILE>     Write annotated HTML here (default: stdout)
        --write-config      Write the effective config to --config (or the
                            default location) and exit; never overwrites

ENVIRONMENT:
    RUST_LOG                Log filter, overrides general.log_level
"#
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();

    let mut config = Config::load(cli.config_path.as_deref());
    if let Some(socket) = &cli.socket_path {
        config.service.socket_path = socket.clone();
    }

    // Logs go to stderr; stdout carries the page
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.write_config {
        let path = cli
            .config_path
            .clone()
            .unwrap_or_else(Config::default_config_path);
        config.write_new(&path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let Some(raw_url) = cli.url.clone() else {
        eprintln!("Missing --url. Use --help for usage information.");
        std::process::exit(1);
    };
    let url = Url::parse(&raw_url)?;

    let document = match &cli.html_path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();
    let annotated = local.block_on(&runtime, annotate(cli.duration, config, url, document));

    match &cli.output_path {
        Some(path) => {
            std::fs::write(path, annotated)?;
            info!("Wrote annotated page to {:?}", path);
        }
        None => println!("{}", annotated),
    }

    Ok(())
}

/// Run one annotation session and return the resulting HTML
async fn annotate(duration: Option<u64>, config: Config, url: Url, document: String) -> String {
    let page = Page::parse(url, &document).into_shared();
    let transport = Rc::new(SocketTransport::new(
        &config.service.socket_path,
        config.service.request_timeout(),
    ));

    let Some(annotator) = Annotator::attach(page.clone(), &SiteRegistry::new(), transport, &config)
    else {
        warn!("Page not annotated");
        return page.borrow().html();
    };

    annotator.run().await;

    // One scan interval also gives pending submissions time to finish
    let duration = match duration {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => config.timing.scan_interval(),
    };

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, finishing up");
        }
    }

    annotator.shutdown();

    let stats = annotator.matcher().stats();
    info!(
        "{}: {} scans, {} lookups, {} badges",
        annotator.adapter_name(),
        annotator.detector().scan_count(),
        stats.lookups,
        stats.badges
    );

    let html = page.borrow().html();
    html
}
