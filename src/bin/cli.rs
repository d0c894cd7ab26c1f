//! CLI for node operations against a coordination ensemble

use clap::{Parser, Subcommand};
use coordkv::{ChildEvent, Config, CoordinationClient, NodeEvent};

#[derive(Parser)]
#[command(name = "coordkv")]
#[command(about = "coordination-service node client")]
#[command(version)]
struct Cli {
    /// Ensemble host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Ensemble client port
    #[arg(long, default_value = "2379")]
    port: u16,

    /// Session timeout in milliseconds
    #[arg(long, default_value = "30000")]
    session_timeout: u64,

    /// Connection timeout in milliseconds
    #[arg(long, default_value = "15000")]
    connection_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a node exists
    Exists {
        /// Node path
        path: String,
    },

    /// Create a node (fails if it already exists)
    Create {
        /// Node path
        path: String,

        /// Payload
        value: String,
    },

    /// Update a node conditioned on its current version
    Set {
        /// Node path
        path: String,

        /// Expected current version
        #[arg(long)]
        version: i64,

        /// Payload
        value: String,
    },

    /// Create or overwrite a node
    Put {
        /// Node path
        path: String,

        /// Payload
        value: String,
    },

    /// Read a node's payload
    Get {
        /// Node path
        path: String,

        /// Also print node metadata as JSON
        #[arg(long)]
        stat: bool,
    },

    /// List a node's immediate children
    Ls {
        /// Node path
        path: String,
    },

    /// Delete a node and its subtree
    Rm {
        /// Node path
        path: String,
    },

    /// Stream change notifications until interrupted
    Watch {
        /// Node path
        path: String,

        /// Watch the node's children instead of the node itself
        #[arg(long)]
        children: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // CLI flags take priority; file/env config fills in anything left at
    // its default (same merge the other direction as the config loader).
    let mut config = Config::new(
        cli.host.clone(),
        cli.port,
        cli.session_timeout,
        cli.connection_timeout,
    );
    if let Ok(file_config) = Config::load() {
        if cli.host == "localhost" {
            config.host = file_config.host;
        }
        if cli.port == 2379 {
            config.port = file_config.port;
        }
        if cli.session_timeout == 30_000 {
            config.session_timeout_ms = file_config.session_timeout_ms;
        }
        if cli.connection_timeout == 15_000 {
            config.connection_timeout_ms = file_config.connection_timeout_ms;
        }
        config.root = file_config.root;
    }

    let client = CoordinationClient::connect(config).await?;

    match cli.command {
        Commands::Exists { path } => {
            println!("{}", client.exists(&path).await?);
        }

        Commands::Create { path, value } => {
            client.create(&path, value.as_bytes()).await?;
            println!("created {}", path);
        }

        Commands::Set {
            path,
            version,
            value,
        } => {
            client.update(&path, version, value.as_bytes()).await?;
            println!("updated {}", path);
        }

        Commands::Put { path, value } => {
            client.create_or_update(&path, value.as_bytes()).await?;
            println!("wrote {}", path);
        }

        Commands::Get { path, stat } => {
            let (payload, node_stat) = client.get_data(&path).await?;
            println!("{}", String::from_utf8_lossy(&payload));
            if stat {
                println!("{}", serde_json::to_string_pretty(&node_stat)?);
            }
        }

        Commands::Ls { path } => {
            for child in client.get_children(&path).await? {
                println!("{}", child);
            }
        }

        Commands::Rm { path } => {
            client.remove(&path).await?;
            println!("removed {}", path);
        }

        Commands::Watch { path, children } => {
            if children {
                let watcher = client
                    .watch_children(
                        &path,
                        Some(Box::new(|event: ChildEvent| match event {
                            ChildEvent::Added { child, payload } => {
                                println!("added {} ({} bytes)", child, payload.len())
                            }
                            ChildEvent::Updated { child, payload } => {
                                println!("updated {} ({} bytes)", child, payload.len())
                            }
                            ChildEvent::Removed { child } => println!("removed {}", child),
                        })),
                    )
                    .await?
                    .expect("callback was provided");

                println!("watching children of {} (ctrl-c to stop)", path);
                tokio::signal::ctrl_c().await?;
                watcher.close().await?;
            } else {
                let watcher = client
                    .watch_node(
                        &path,
                        Some(Box::new(|event: NodeEvent| match event {
                            NodeEvent::Created { path, payload, .. } => {
                                println!("created {} ({} bytes)", path, payload.len())
                            }
                            NodeEvent::Updated { path, stat, .. } => {
                                println!("updated {} (version {})", path, stat.version)
                            }
                            NodeEvent::Deleted { path } => println!("deleted {}", path),
                        })),
                    )
                    .await?
                    .expect("callback was provided");

                println!("watching {} (ctrl-c to stop)", path);
                tokio::signal::ctrl_c().await?;
                watcher.close().await?;
            }
        }
    }

    Ok(())
}
