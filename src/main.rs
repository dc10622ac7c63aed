use pomodoro::controller::TimerEvent;
use session_log::SessionLog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod autostart;
mod config;
mod daemon;
mod error;
mod messages;
mod native_messaging;
mod notify;
mod pomodoro;
mod session_log;
mod ws;

const TICK_INTERVAL_MS: u64 = 250; // Sub-second so the label never skips a second

const USAGE: &str = "\
Usage: tomato_bar [OPTIONS]

Options:
  --stdio            Talk to the display over stdin/stdout instead of WebSocket
  --port <PORT>      WebSocket port on 127.0.0.1 (default 8765)
  --config <PATH>    Config file (default: <config dir>/tomato_bar/config.json)
  --init-config      Write the current or default config to the config path and exit
  --no-notify        No desktop notification when an interval ends
  -v, --verbose      Debug logging
  -h, --help         Show this help";

#[derive(Debug, PartialEq)]
struct CliOptions {
    stdio: bool,
    port: u16,
    config_path: Option<PathBuf>,
    init_config: bool,
    notifications: bool,
    verbose: bool,
    help: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            stdio: false,
            port: ws::websocket_server::DEFAULT_PORT,
            config_path: None,
            init_config: false,
            notifications: true,
            verbose: false,
            help: false,
        }
    }
}

impl CliOptions {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Self::default();
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--stdio" => options.stdio = true,
                "--init-config" => options.init_config = true,
                "--no-notify" => options.notifications = false,
                "--verbose" | "-v" => options.verbose = true,
                "--help" | "-h" => options.help = true,
                "--port" => {
                    let value = args.next().ok_or("--port needs a value")?;
                    options.port = value
                        .parse()
                        .map_err(|_| format!("invalid port: {}", value))?;
                }
                "--config" => {
                    let value = args.next().ok_or("--config needs a path")?;
                    options.config_path = Some(PathBuf::from(value));
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        Ok(options)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stderr only: stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A panic on any thread or task is fatal: report it, then exit non-zero.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        notify::show_error_box(&format!("Uncaught Exception: {}", info), "The timer has stopped.");
        default_hook(info);
        std::process::exit(1);
    }));
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match CliOptions::parse(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            std::process::exit(2);
        }
    };
    if options.help {
        println!("{}", USAGE);
        return;
    }

    init_logging(options.verbose);
    install_panic_hook();

    if let Err(e) = run(options).await {
        notify::show_error_box(&format!("Uncaught Exception: {}", e), &format!("{:?}", e));
        std::process::exit(1);
    }
}

async fn run(options: CliOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = options
        .config_path
        .unwrap_or_else(config::default_config_path);

    if options.init_config {
        let settings = config::load_or_default(&config_path);
        config::save(&config_path, &settings)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let launcher = match autostart::system_launcher() {
        Ok(launcher) => Some(launcher),
        Err(e) => {
            warn!(error = %e, "launch on startup unavailable");
            None
        }
    };

    let mut daemon = daemon::Daemon::new(config_path.clone(), launcher);
    let settings = daemon.controller().settings().clone();
    info!(
        config = %config_path.display(),
        work_min = config::ConfigFile::from(&settings).work_timer,
        relax_min = config::ConfigFile::from(&settings).relax_timer,
        long_relax_min = config::ConfigFile::from(&settings).long_relax_timer,
        show_timer = settings.show_timer,
        "🍅 Tomato Bar starting"
    );

    let events = messages::create_event_channel();
    let (requests_tx, requests_rx) = messages::create_request_channel();

    let controller = daemon.controller_mut();
    controller.subscribe(messages::broadcast_listener(events.clone()));
    controller.subscribe(|event: &TimerEvent| {
        if let TimerEvent::Title(title) = event {
            debug!(%title, "tray label");
        }
    });
    if options.notifications {
        controller.subscribe(notify::desktop_listener());
    }
    match SessionLog::open(config::session_log_path()) {
        Ok(log) => {
            info!(path = %log.path().display(), "logging sessions");
            controller.subscribe(log);
        }
        Err(e) => warn!(error = %e, "session log disabled"),
    }

    if options.stdio {
        native_messaging::spawn_stdio_bridge(requests_tx, events.subscribe());
    } else {
        let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
        let listener = ws::websocket_server::bind(addr).await?;
        tokio::spawn(ws::websocket_server::start_websocket_server(
            listener,
            requests_tx,
            events.clone(),
        ));
    }

    daemon
        .run(requests_rx, Duration::from_millis(TICK_INTERVAL_MS))
        .await;
    info!("bye");
    Ok(())
}
