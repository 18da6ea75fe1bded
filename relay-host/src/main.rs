mod host;
mod relay;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use relay_core::Router;
use relay_webview::{render_bootstrap, BootstrapValues, ContentBundle};
use tokio::io::BufReader;
use tokio::sync::mpsc;

use crate::host::ProcessHost;
use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "webview-relay", version, about = "Bridge an embedded web app to host commands")]
struct Cli {
    /// Settings file (default: <config dir>/webview-relay/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory holding the built web app
    #[arg(long, global = true)]
    bundle: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Relay JSON messages from stdin to host actions, replies to stdout
    Relay,
    /// Print the entry document as it is shown in the webview
    Html {
        /// Root the bundle is served from
        #[arg(long)]
        base_uri: Option<String>,
    },
    /// Print the loader bootstrap script for the bundle
    Bootstrap,
    /// Print the JSON Schemas of inbound and outbound messages
    Schema,
    /// List the commands the embedded app can send
    Commands,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let settings = settings::load(cli.settings.as_deref());
    let bundle = bundle_for(&cli, &settings);

    let outcome = match cli.command {
        Command::Relay => run_relay(&settings),
        Command::Html { base_uri } => {
            let base_uri = base_uri
                .or_else(|| Some(settings.base_uri.clone()).filter(|uri| !uri.is_empty()))
                .or_else(|| bundle.default_base_uri())
                .unwrap_or_else(|| "/".to_string());
            println!("{}", bundle.render_entry(&base_uri));
            Ok(())
        }
        Command::Bootstrap => BootstrapValues::from_bundle(&bundle, &settings.build_config)
            .map(|values| {
                print!(
                    "{}",
                    render_bootstrap(relay_webview::bootstrap::BOOTSTRAP_TEMPLATE, &values)
                )
            })
            .map_err(|e| e.to_string()),
        Command::Schema => serde_json::to_string_pretty(&relay_core::protocol::message_schemas())
            .map(|schema| println!("{}", schema))
            .map_err(|e| e.to_string()),
        Command::Commands => {
            let registry = settings.registry();
            for name in registry.names() {
                let replies = registry
                    .get(name)
                    .map(|spec| spec.produces_result())
                    .unwrap_or(false);
                println!("{}{}", name, if replies { " (replies)" } else { "" });
            }
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("webview-relay: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn bundle_for(cli: &Cli, settings: &Settings) -> ContentBundle {
    let root = cli
        .bundle
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.bundle_dir));
    ContentBundle::new(root).with_entry(settings.entry_document.clone())
}

fn run_relay(settings: &Settings) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    runtime.block_on(async {
        let (outbox, replies) = mpsc::unbounded_channel();
        let registry = settings.registry();
        log::info!("Relaying {} command(s)", registry.len());
        let router = Router::new(registry, Arc::new(ProcessHost::new(settings)), outbox);

        let input = BufReader::new(tokio::io::stdin());
        relay::run(router, replies, input, tokio::io::stdout())
            .await
            .map(|_| ())
    })
}
