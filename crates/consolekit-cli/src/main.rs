mod render;
mod selector;

use clap::{Parser, Subcommand};
use consolekit_client::{
    Console, ConsoleConfig, ConsoleUpdate, EventChannel, HttpTaskService, Phase,
};
use consolekit_core::{ConsoleError, ExecutionMode};
use render::Renderer;
use selector::PathSelector;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consolekit", about = "Terminal console for streaming task sessions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "consolekit.toml")]
    config: PathBuf,

    /// Task service base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Execution mode: agent, do or run (overrides config)
    #[arg(long, global = true)]
    mode: Option<ExecutionMode>,

    /// Project directory handed to the service (overrides config)
    #[arg(long, global = true)]
    project_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console
    Chat,
    /// Run a single prompt and print the transcript until the session completes
    Ask {
        /// The prompt
        prompt: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .json()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Ask { prompt } => {
            let (console, channel) = connect(&config).await?;
            let result = ask(&console, &prompt, channel).await;
            if let Some(id) = console.session_id() {
                info!(session_id = %id, phase = ?console.phase(), "Ask finished");
            }
            result?;
        }
        Commands::Chat => {
            let (console, channel) = connect(&config).await?;
            chat(console, channel).await?;
        }
    }

    Ok(())
}

async fn load_config(cli: &Cli) -> anyhow::Result<ConsoleConfig> {
    let mut config = if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
        ConsoleConfig::load(&cli.config).await?
    } else {
        debug!(path = %cli.config.display(), "No config file, using defaults");
        ConsoleConfig::default()
    };

    if let Some(base_url) = &cli.base_url {
        config.service.base_url.clone_from(base_url);
    }
    if let Some(mode) = cli.mode {
        config.session.execution_mode = mode;
    }
    if let Some(path) = &cli.project_path {
        config.session.project_path = Some(path.clone());
    }
    Ok(config)
}

/// Builds the console and attaches the event channel before anything is sent.
async fn connect(
    config: &ConsoleConfig,
) -> anyhow::Result<(Arc<Console>, JoinHandle<Result<(), ConsoleError>>)> {
    let service = HttpTaskService::from_config(&config.service)?;
    let console = Arc::new(Console::from_config(Arc::new(service), config));
    let ws_url = config.service.ws_url()?;
    let channel = EventChannel::connect(ws_url).await?;
    info!(url = %channel.url(), base_url = %config.service.base_url, "Console ready");
    Ok((console.clone(), channel.spawn(console)))
}

fn render(renderer: &mut Renderer, console: &Console, update: &ConsoleUpdate) -> io::Result<()> {
    renderer.apply(console, update, &mut io::stdout().lock())
}

/// Starts one session and renders until it returns to idle.
async fn ask(
    console: &Console,
    prompt: &str,
    mut channel: JoinHandle<Result<(), ConsoleError>>,
) -> anyhow::Result<()> {
    let mut updates = console.subscribe();
    let mut renderer = Renderer::new();

    let start = console.start(prompt);
    tokio::pin!(start);
    let started = loop {
        tokio::select! {
            result = &mut start => break result,
            update = updates.recv() => match update {
                Ok(update) => render(&mut renderer, console, &update)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer fell behind"),
                Err(RecvError::Closed) => break (&mut start).await,
            },
        }
    };
    if let Err(e) = started {
        drain(&mut renderer, console, &mut updates)?;
        return Err(e.into());
    }

    while console.is_running() {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    render(&mut renderer, console, &update)?;
                    if update == (ConsoleUpdate::PhaseChanged { phase: Phase::Idle }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = console.stop().await {
                    warn!(error = %e, "Stop on interrupt failed");
                }
                break;
            }
            joined = &mut channel => {
                match joined {
                    Ok(Ok(())) => warn!("Event channel closed before the session completed"),
                    Ok(Err(e)) => warn!(error = %e, "Event channel failed"),
                    Err(e) => warn!(error = %e, "Event channel task panicked"),
                }
                break;
            }
        }
    }

    drain(&mut renderer, console, &mut updates)?;
    Ok(())
}

fn drain(
    renderer: &mut Renderer,
    console: &Console,
    updates: &mut tokio::sync::broadcast::Receiver<ConsoleUpdate>,
) -> io::Result<()> {
    while let Ok(update) = updates.try_recv() {
        render(renderer, console, &update)?;
    }
    Ok(())
}

/// Line-oriented interactive console.
async fn chat(
    console: Arc<Console>,
    channel: JoinHandle<Result<(), ConsoleError>>,
) -> anyhow::Result<()> {
    let mut updates = console.subscribe();
    let render_console = console.clone();
    let renderer = tokio::spawn(async move {
        let mut renderer = Renderer::new();
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if let Err(e) = render(&mut renderer, &render_console, &update) {
                        warn!(error = %e, "Failed to write to stdout");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("Commands: /new /stop /mode <agent|do|run> /project [dir] /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        let outcome = match command {
            "/quit" | "/exit" => break,
            "/new" => {
                console.new_session();
                Ok(())
            }
            "/stop" => console.stop().await,
            "/mode" => match arg.parse::<ExecutionMode>() {
                Ok(mode) => console.set_execution_mode(mode),
                Err(e) => Err(e),
            },
            "/project" if arg.is_empty() => console.clear_project_path(),
            "/project" => console
                .select_directory(&PathSelector::new(arg))
                .await
                .map(|selected| {
                    if let Some(path) = selected {
                        println!("Project: {}", path.display());
                    }
                }),
            _ => console.submit(line).await,
        };

        match outcome {
            Ok(()) => {}
            // Already reported through a notice.
            Err(e) if e.is_request_failure() => {}
            Err(ConsoleError::Superseded) => debug!("Response discarded after reset"),
            Err(e) => eprintln!("[error] {e}"),
        }
    }

    channel.abort();
    renderer.abort();
    Ok(())
}
