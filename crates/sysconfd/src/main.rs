// # sysconfd - System Configuration Daemon
//
// Thin integration layer. All validation, reconciliation and apply logic
// lives in sysconf-core; all system access lives in sysconf-os.
//
// The sysconfd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the service adapters into the change pipeline
// 4. Serving the request channel until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `SYSCONF_LINK_IFINDEX`: Interface index resolver settings apply to (required)
// - `SYSCONF_LOCALTIME_PATH`: Local-time symlink (default `/etc/localtime`)
// - `SYSCONF_ZONEINFO_DIR`: Zone database root (default `/usr/share/zoneinfo`)
// - `SYSCONF_DATASTORE`: Datastore type (file, memory)
// - `SYSCONF_DATASTORE_PATH`: Path to the datastore file (for file)
// - `SYSCONF_CALL_TIMEOUT_MS`: Upper bound per external call
// - `SYSCONF_RECONNECT_ATTEMPTS`: Bus connection attempts
// - `SYSCONF_VERIFY_READBACK`: Re-read live state after a commit (true, false)
// - `SYSCONF_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Request Channel
//
// Requests arrive as JSON lines on stdin; responses are written as JSON
// lines on stdout. Logs go to stderr. See `protocol.rs`.
//
// ## Example
//
// ```bash
// export SYSCONF_LINK_IFINDEX=2
// export SYSCONF_DATASTORE=file
// export SYSCONF_DATASTORE_PATH=/var/lib/sysconf/running.json
//
// echo '{"op":"get-state"}' | sysconfd
// ```

#[cfg(target_os = "linux")]
mod input;
mod protocol;

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use sysconf_core::{DatastoreConfig, SysconfConfig};
use tracing::Level;

#[cfg(target_os = "linux")]
use tracing::{error, info};
#[cfg(target_os = "linux")]
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SysconfExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SysconfExitCode> for ExitCode {
    fn from(code: SysconfExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings read from the environment
#[derive(Debug)]
struct EnvConfig {
    config: SysconfConfig,
    log_level: Level,
}

impl EnvConfig {
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a variable lookup
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = SysconfConfig::default();

        let ifindex = get("SYSCONF_LINK_IFINDEX").context(
            "SYSCONF_LINK_IFINDEX is required. Find it with `ip link` and set it via: \
             export SYSCONF_LINK_IFINDEX=2",
        )?;
        config.link.ifindex = parse_var("SYSCONF_LINK_IFINDEX", &ifindex)?;

        if let Some(path) = get("SYSCONF_LOCALTIME_PATH") {
            config.localtime.path = path;
        }
        if let Some(dir) = get("SYSCONF_ZONEINFO_DIR") {
            config.localtime.zoneinfo_dir = dir;
        }

        let datastore = get("SYSCONF_DATASTORE").unwrap_or_else(|| "memory".to_string());
        config.datastore = match datastore.as_str() {
            "memory" => DatastoreConfig::Memory,
            "file" => DatastoreConfig::File {
                path: get("SYSCONF_DATASTORE_PATH").context(
                    "SYSCONF_DATASTORE_PATH is required when SYSCONF_DATASTORE=file. \
                     Set it via: export SYSCONF_DATASTORE_PATH=/var/lib/sysconf/running.json",
                )?,
            },
            other => anyhow::bail!(
                "SYSCONF_DATASTORE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        if let Some(ms) = get("SYSCONF_CALL_TIMEOUT_MS") {
            config.pipeline.call_timeout_ms = parse_var("SYSCONF_CALL_TIMEOUT_MS", &ms)?;
        }
        if let Some(attempts) = get("SYSCONF_RECONNECT_ATTEMPTS") {
            config.bus.reconnect_attempts = parse_var("SYSCONF_RECONNECT_ATTEMPTS", &attempts)?;
        }
        if let Some(verify) = get("SYSCONF_VERIFY_READBACK") {
            config.pipeline.verify_readback = parse_var("SYSCONF_VERIFY_READBACK", &verify)?;
        }

        let level = get("SYSCONF_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_level = match level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "SYSCONF_LOG_LEVEL '{}' is not valid. \
                 Valid levels: trace, debug, info, warn, error",
                level
            ),
        };

        config.validate()?;

        Ok(Self { config, log_level })
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, value, e))
}

#[cfg(not(target_os = "linux"))]
fn main() -> ExitCode {
    eprintln!("sysconfd manages systemd services and only runs on Linux");
    SysconfExitCode::ConfigError.into()
}

#[cfg(target_os = "linux")]
fn main() -> ExitCode {
    let env_config = match EnvConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SysconfExitCode::ConfigError.into();
        }
    };

    // stdout carries responses, so logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(env_config.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SysconfExitCode::ConfigError.into();
    }

    info!(
        "Starting sysconfd (link {}, datastore {:?})",
        env_config.config.link.ifindex, env_config.config.datastore
    );

    // One batch runs at a time, so a single thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SysconfExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match daemon::run(env_config.config).await {
            Ok(()) => SysconfExitCode::CleanShutdown,
            Err(daemon::Failure::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                SysconfExitCode::ConfigError
            }
            Err(daemon::Failure::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                SysconfExitCode::RuntimeError
            }
        }
    });

    result.into()
}

#[cfg(target_os = "linux")]
mod daemon {
    use crate::input::spawn_line_reader;
    use crate::protocol::{Request, Response};
    use std::io::BufReader;
    use std::sync::Arc;
    use sysconf_core::{
        ChangeBatch, ChangePipeline, ClockApplier, Datastore, DnsResolverApplier, HostnameApplier,
        PipelineEvent, StateReader, SubtreeApplier, SysconfConfig, datastore,
    };
    use sysconf_os::SystemServices;
    use tokio::io::AsyncWriteExt;
    use tokio::signal::unix::{SignalKind, signal};
    use tokio::sync::mpsc;
    use tokio_stream::StreamExt;
    use tracing::{debug, error, info, warn};

    /// Why the daemon stopped early
    pub enum Failure {
        /// Could not get to the point of serving requests
        Startup(anyhow::Error),
        /// Failed while serving
        Runtime(anyhow::Error),
    }

    /// Everything a request needs
    struct Daemon {
        pipeline: ChangePipeline,
        datastore: Arc<dyn Datastore>,
        reader: StateReader,
    }

    impl Daemon {
        async fn handle(&self, request: Request) -> Response {
            debug!("Handling {} request", request.name());
            match request {
                Request::Commit { edits } => {
                    match self.pipeline.commit(&ChangeBatch::from(edits)).await {
                        Ok(outcome) => Response::committed(&outcome),
                        Err(e) => Response::error(&e),
                    }
                }
                Request::GetConfig => match self.datastore.running().await {
                    Ok(config) => Response::config(&config),
                    Err(e) => Response::error(&e),
                },
                Request::GetState => match self.reader.read().await {
                    Ok(state) => Response::state(&state),
                    Err(e) => {
                        warn!("Failed to read operational state: {}", e);
                        Response::error(&e)
                    }
                },
            }
        }
    }

    /// Run the daemon until end of input or a shutdown signal
    pub async fn run(config: SysconfConfig) -> Result<(), Failure> {
        let services = SystemServices::new(&config);
        let link = config.link.ifindex;

        let appliers: Vec<Box<dyn SubtreeApplier>> = vec![
            Box::new(HostnameApplier::new(services.hostname.clone())),
            Box::new(ClockApplier::new(
                services.localtime.clone(),
                services.zones.clone(),
            )),
            Box::new(DnsResolverApplier::new(services.resolver.clone(), link)),
        ];

        let datastore = datastore::open(&config.datastore)
            .await
            .map_err(|e| Failure::Startup(e.into()))?;

        let (pipeline, events) = ChangePipeline::new(appliers, datastore.clone(), &config.pipeline)
            .map_err(|e| Failure::Startup(e.into()))?;

        let reader = StateReader::new(
            services.hostname.clone(),
            services.localtime.clone(),
            services.platform.clone(),
            services.resolver.clone(),
            link,
        );

        let daemon = Daemon {
            pipeline,
            datastore: datastore.clone(),
            reader,
        };

        info!("Daemon initialized, serving requests on stdin");
        let served = serve(&daemon, events).await;

        info!("Shutting down daemon");
        if let Err(e) = datastore.flush().await {
            error!("Failed to flush datastore: {}", e);
        }
        if let Err(e) = services.bus.close().await {
            warn!("Failed to close system bus connection: {}", e);
        }

        served.map_err(Failure::Runtime)
    }

    async fn serve(
        daemon: &Daemon,
        mut events: mpsc::Receiver<PipelineEvent>,
    ) -> anyhow::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

        // a signal must not wait on a pending stdin read
        let mut lines = spawn_line_reader(BufReader::new(std::io::stdin()))
            .map_err(|e| anyhow::anyhow!("Failed to start input reader: {}", e))?;
        let mut stdout = tokio::io::stdout();
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received shutdown signal: SIGTERM");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received shutdown signal: SIGINT");
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => log_event(&event),
                    None => events_open = false,
                },
                line = lines.next() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => return Err(anyhow::anyhow!("Failed to read request: {}", e)),
                        None => {
                            info!("End of input");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let response = match Request::parse(&line) {
                        Ok(request) => daemon.handle(request).await,
                        Err(e) => {
                            warn!("Malformed request: {}", e);
                            Response::error(&e)
                        }
                    };

                    if !response.is_ok() {
                        debug!("Request answered with an error");
                    }
                    let mut out = response.to_line();
                    out.push('\n');
                    stdout.write_all(out.as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            log_event(&event);
        }

        Ok(())
    }

    fn log_event(event: &PipelineEvent) {
        match event {
            PipelineEvent::StateChanged { from, to } => {
                debug!("Pipeline state: {:?} -> {:?}", from, to)
            }
            PipelineEvent::BatchReceived { edits } => debug!("Batch received: {} edit(s)", edits),
            PipelineEvent::Rejected { error } => info!("Batch rejected: {}", error),
            PipelineEvent::SubtreeApplied { subtree } => debug!("Applied {}", subtree),
            PipelineEvent::ApplyFailed {
                subtree,
                applied,
                error,
            } => error!(
                "Applying {} failed after {:?} were changed: {}",
                subtree, applied, error
            ),
            PipelineEvent::Committed { subtrees } => info!("Committed {:?}", subtrees),
            PipelineEvent::ReadbackMismatch { subtree, detail } => {
                warn!("Live {} differs from committed value: {}", subtree, detail)
            }
        }
    }
}
