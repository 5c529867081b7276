//! emberd - a single-threaded, cooperative-scheduling IRC daemon core.

mod channel;
mod commands;
mod config;
mod dispatch;
mod error;
mod events;
mod files;
mod mode;
mod net;
mod reply;
mod server;
mod store;
mod user;

use anyhow::Context;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ConfigErrorList, StartupError};
use crate::server::{Server, ShutdownKind};

/// Parsed command-line surface. Flags may appear in any order; a bare
/// path is accepted as the config path for `-c`-less invocations.
#[derive(Debug, Default)]
struct CliOptions {
    config_path: Option<String>,
    nofork: bool,
    debug: bool,
    nolog: bool,
    runasroot: bool,
    version: bool,
    testsuite: bool,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<CliOptions, String> {
        let mut opts = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| format!("missing path after {arg}"))?;
                    opts.config_path = Some(path);
                }
                "--nofork" => opts.nofork = true,
                "--debug" => opts.debug = true,
                "--nolog" => opts.nolog = true,
                "--runasroot" => opts.runasroot = true,
                "--version" => opts.version = true,
                "--testsuite" => opts.testsuite = true,
                other if !other.starts_with('-') && opts.config_path.is_none() => {
                    opts.config_path = Some(other.to_string());
                }
                other => return Err(format!("unknown option: {other}")),
            }
        }
        Ok(opts)
    }
}

/// Resolve the config path, canonicalizing so REHASH doesn't depend on
/// the working directory staying put.
fn resolve_config_path(opts: &CliOptions) -> String {
    let raw = opts
        .config_path
        .clone()
        .unwrap_or_else(|| "emberd.toml".to_string());
    match std::fs::canonicalize(&raw) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw,
    }
}

fn init_tracing(config: &Config, opts: &CliOptions) {
    if opts.nolog {
        // No subscriber at all: events are dropped before formatting.
        return;
    }
    let default_directive = if opts.debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    match config.server.log_format {
        config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        config::LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }
}

/// Effective UID of this process, read from the procfs node owner.
#[cfg(unix)]
fn process_uid() -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self").ok().map(|m| m.uid())
}

#[cfg(not(unix))]
fn process_uid() -> Option<u32> {
    None
}

fn main() -> anyhow::Result<()> {
    let opts = CliOptions::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("emberd: {e}");
        eprintln!(
            "usage: emberd [--config <path>] [--nofork] [--debug] [--nolog] \
             [--runasroot] [--version] [--testsuite]"
        );
        anyhow::anyhow!("invalid arguments")
    })?;

    if opts.version {
        println!("emberd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = resolve_config_path(&opts);
    let config = Config::load(&config_path)
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("failed to load config from {config_path}"))?;

    init_tracing(&config, &opts);

    if let Err(errors) = config::validate(&config) {
        for err in &errors {
            error!(error = %err, "configuration validation failed");
        }
        return Err(StartupError::Config(ConfigErrorList(errors)).into());
    }

    if opts.testsuite {
        return run_testsuite(config);
    }

    if process_uid() == Some(0) && !opts.runasroot {
        return Err(StartupError::RefusedRoot.into());
    }
    if !opts.nofork {
        // Daemonization is left to the supervisor; the flag is accepted
        // so init scripts written for forking ircds keep working.
        info!("running in the foreground (supervise or pass --nofork explicitly)");
    }

    if let Some(pid_path) = &config.files.pid_path {
        files::write_pid_file(pid_path);
    }

    info!(
        server = %config.server.name,
        network = %config.server.network,
        sid = %config.server.sid,
        "starting emberd"
    );

    let listen_addr = config.server.listen.clone();
    let mut server = Server::new(config).with_config_path(config_path);
    server.reload_text_files();
    let registry = commands::build_registry();

    // One thread owns the event loop and every piece of core state.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let outcome = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&listen_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: listen_addr.clone(),
                source,
            })?;
        info!(addr = %listen_addr, "listening");
        net::run(server, registry, listener).await
    })?;

    // Let writer tasks flush close notices before the process goes away.
    runtime.block_on(tokio::time::sleep(std::time::Duration::from_millis(250)));
    drop(runtime);

    match outcome {
        Some(ShutdownKind::Restart) => restart(),
        _ => {
            info!("clean shutdown");
            Ok(())
        }
    }
}

/// Replace this process with a fresh copy of itself, preserving the
/// original arguments. Only returns on failure, which is fatal (nonzero
/// exit per the CLI contract).
#[cfg(unix)]
fn restart() -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;
    let exe = std::env::current_exe().context("could not resolve own executable for restart")?;
    info!(exe = %exe.display(), "restarting");
    let err = std::process::Command::new(exe)
        .args(std::env::args().skip(1))
        .exec();
    Err(anyhow::Error::from(err).context("exec failed during restart"))
}

#[cfg(not(unix))]
fn restart() -> anyhow::Result<()> {
    Err(anyhow::anyhow!("restart is only supported on unix"))
}

/// `--testsuite`: config has already validated; run a no-socket smoke
/// pass through registration and a channel join, checking the store
/// invariants, then exit.
fn run_testsuite(config: Config) -> anyhow::Result<()> {
    let mut server = Server::new(config);
    let registry = commands::build_registry();

    let uid = server.uid_gen.next();
    let test_addr: std::net::SocketAddr = "127.0.0.1:1".parse()?;
    server
        .store
        .insert_user(user::User::new(uid.clone(), test_addr, "localhost".into()))
        .map_err(|e| anyhow::anyhow!("user insert failed: {e:?}"))?;

    dispatch::process_line(&mut server, &registry, &uid, "NICK selftest\r\n");
    let replies = dispatch::process_line(&mut server, &registry, &uid, "USER t 0 * :Self Test\r\n");
    anyhow::ensure!(
        replies.iter().any(|m| m.command == "001"),
        "registration burst missing 001"
    );

    let replies = dispatch::process_line(&mut server, &registry, &uid, "JOIN #selftest\r\n");
    anyhow::ensure!(
        replies.iter().any(|m| m.command == "JOIN"),
        "JOIN echo missing"
    );
    let channel = server
        .store
        .find_channel("#selftest")
        .ok_or_else(|| anyhow::anyhow!("channel missing after JOIN"))?;
    anyhow::ensure!(channel.has_member(&uid), "membership missing after JOIN");
    let user = server
        .store
        .find_user_by_uid(&uid)
        .ok_or_else(|| anyhow::anyhow!("user missing after JOIN"))?;
    anyhow::ensure!(
        user.channels.contains("#selftest"),
        "membership back-pointer missing"
    );

    println!("testsuite passed");
    Ok(())
}
