//! CLI commands for meshrelay using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::{default_home_dir, resolve_settings, MeshPaths, SettingsOverrides};
use crate::receiver::Receiver;
use crate::web::{run_server, WebServerConfig};

/// meshrelay - MESH protocol receiver for inter-agent messaging.
#[derive(Parser, Debug)]
#[command(name = "meshrelay")]
#[command(version)]
#[command(about = "Receive MESH envelopes over HTTP, audit them and route replies", long_about = None)]
pub struct Commands {
    /// MESH home directory (default: ~/.mesh)
    #[arg(long, global = true, env = "MESH_HOME")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the receiver
    Serve {
        /// Port number
        #[arg(long, env = "MESH_PORT")]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Local agent identifier
        #[arg(long, env = "MESH_AGENT")]
        agent: Option<String>,

        /// Handler executable or http(s) URL (omit for inbox mode)
        #[arg(long, env = "MESH_HANDLER")]
        handler: Option<String>,
    },

    /// Print audit/state statistics as JSON
    Stats {
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Print shared context for a conversation follow-up
    Context {
        /// Conversation JSON file
        file: Option<PathBuf>,
    },
}

impl Commands {
    /// Resolve the MESH home directory.
    pub fn paths(&self) -> Result<MeshPaths> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => default_home_dir()?,
        };
        Ok(MeshPaths::new(home))
    }

    /// The receiver logs to `<home>/logs`; read-side commands log to
    /// stderr only.
    pub fn init_logging(&self, paths: &MeshPaths) -> Result<Option<WorkerGuard>> {
        match self.command {
            Command::Serve { .. } => {
                let (guard, _) = crate::logging::init(&paths.log_dir())?;
                Ok(Some(guard))
            }
            _ => {
                crate::logging::init_console()?;
                Ok(None)
            }
        }
    }

    pub async fn run(self, paths: MeshPaths) -> Result<()> {
        match self.command {
            Command::Serve {
                port,
                host,
                agent,
                handler,
            } => {
                let overrides = SettingsOverrides {
                    agent,
                    handler,
                    host,
                    port,
                };
                cmd_serve(paths, overrides).await
            }
            Command::Stats { pretty } => cmd_stats(&paths, pretty),
            Command::Context { file } => cmd_context(file),
        }
    }
}

// Command implementations

async fn cmd_serve(paths: MeshPaths, overrides: SettingsOverrides) -> Result<()> {
    let settings = resolve_settings(&paths, overrides)?;
    let receiver = Arc::new(Receiver::from_settings(&settings, &paths));

    println!("🐝 MESH receiver");
    println!("   Agent:   {}", settings.agent);
    println!("   Port:    {}", settings.port);
    println!(
        "   Handler: {}",
        receiver
            .dispatcher()
            .handler_name()
            .unwrap_or("(none - inbox mode)")
    );
    println!("   Audit:   {}", paths.audit_log().display());
    println!("   Inbox:   GET http://{}:{}/inbox", settings.host, settings.port);
    println!("   Health:  GET http://{}:{}/health", settings.host, settings.port);
    println!();

    let config = WebServerConfig {
        port: settings.port,
        host: settings.host.clone(),
        max_body_bytes: settings.max_body_bytes,
    };

    run_server(config, receiver).await?;
    Ok(())
}

fn cmd_stats(paths: &MeshPaths, pretty: bool) -> Result<()> {
    let snapshot = crate::dashboard::collect(paths);
    let out = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", out);
    Ok(())
}

fn cmd_context(file: Option<PathBuf>) -> Result<()> {
    let Some(file) = file else {
        return Ok(());
    };

    // Context is optional input for the caller: failures print nothing.
    match crate::context::load_conversation(&file) {
        Ok(Some(conv)) => {
            if let Some(text) = crate::context::format_conversation(&conv) {
                println!("{}", text);
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("[context error: {}]", e),
    }
    Ok(())
}
