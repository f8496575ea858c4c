use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use shelf_offline::app::App;
use shelf_offline::config::{self, Config};
use shelf_offline::http::{Method, Request};
use shelf_offline::queue::SubmitOutcome;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shelf-offline")]
#[command(about = "Offline cache, mutation queue and notifications for the shelf library client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shelf-offline/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// GET a path through the cache
  Fetch {
    path: String,
    /// Send as a page navigation (accept: text/html)
    #[arg(long)]
    html: bool,
  },
  /// Send a mutation; queued when offline
  Submit {
    method: String,
    path: String,
    #[arg(short, long)]
    body: Option<String>,
  },
  /// Replay queued mutations now
  Replay,
  /// Prime the static cache generation
  Install,
  /// Delete stale cache generations
  Activate,
  /// Show connectivity, caches and queue length
  Status,
  /// Read or write a preference
  Pref {
    #[command(subcommand)]
    action: PrefAction,
  },
  /// Probe connectivity and react to changes until interrupted
  Watch,
}

#[derive(Subcommand, Debug)]
enum PrefAction {
  Get { key: String },
  /// VALUE is parsed as JSON, falling back to a plain string
  Set { key: String, value: String },
}

/// Log to a file in the data directory. `SHELF_OFFLINE_LOG` overrides the
/// default `info` filter.
fn init_logging() -> Result<WorkerGuard> {
  let dir = config::data_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, "shelf-offline.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env("SHELF_OFFLINE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_logging()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let mut app = App::new(config)?;
  app.start().await?;
  let result = run_command(&mut app, args.command).await;
  app.finish().await?;

  result
}

async fn run_command(app: &mut App, command: Command) -> Result<()> {
  match command {
    Command::Fetch { path, html } => {
      let mut request = Request::get(app.network().resolve(&path)?);
      if html {
        request = request.with_header("accept", "text/html");
      }
      let served = app.lifecycle().fetch(&request).await?;
      println!("{} ({})", served.response.status, served.source.as_str());
      println!("{}", served.response.text());
    }
    Command::Submit { method, path, body } => {
      let method: Method = method.parse()?;
      let mut request = Request::new(method, app.network().resolve(&path)?)
        .with_header("content-type", "application/json");
      if let Some(body) = body {
        request = request.with_body(body);
      }
      match app.lifecycle().submit(request).await? {
        SubmitOutcome::Completed(response) => {
          println!("{}", response.status);
          println!("{}", response.text());
        }
        SubmitOutcome::Queued { position } => println!("queued at position {}", position),
      }
    }
    Command::Replay => {
      if !app.lifecycle().is_online() {
        println!("offline, {} change(s) kept for later", app.lifecycle().queue().len());
        return Ok(());
      }
      let report = app.lifecycle().replay().await;
      println!(
        "replayed {}, dropped {}",
        report.succeeded.len(),
        report.failed.len()
      );
      if let Some(failure) = report.failure {
        println!("{}", failure);
      }
    }
    Command::Install => {
      let report = app.lifecycle().install().await?;
      println!("{}: cached {}", report.generation, report.cached.len());
      for (url, reason) in report.skipped {
        println!("skipped {}: {}", url, reason);
      }
    }
    Command::Activate => {
      let report = app.lifecycle().engine().activate().await?;
      for name in report.deleted {
        println!("deleted {}", name);
      }
    }
    Command::Status => {
      let status = app.status()?;
      println!("online:     {}", status.online);
      println!("persistent: {}", status.persistent);
      println!("queued:     {}", status.queued);
      for name in status.generations {
        let present = if status.caches.contains(&name) { "" } else { " (missing)" };
        println!("generation: {}{}", name, present);
      }
    }
    Command::Pref { action } => match action {
      PrefAction::Get { key } => match app.preferences().get::<serde_json::Value>(&key) {
        Some(value) => println!("{}", value),
        None => println!("(unset)"),
      },
      PrefAction::Set { key, value } => {
        let value = serde_json::from_str::<serde_json::Value>(&value)
          .unwrap_or(serde_json::Value::String(value));
        app.preferences().set(&key, &value)?;
      }
    },
    Command::Watch => app.run().await?,
  }

  Ok(())
}
