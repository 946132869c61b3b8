//! NovellaHub CLI
//!
//! Command-line front-end over the local store:
//! - Sign up, sign in and out
//! - Publish and browse posts
//! - Create, join and chat in rooms
//! - Customize the theme and language
//! - Watch the store for changes

use anyhow::Context;
use clap::{Parser, Subcommand};
use novellahub::config::{generate_default_config, Config, LoggingConfig};
use novellahub::storage::{LocalStore, Post, PostKind, StoreEvent, StoreWatcher, Theme};
use novellahub::theme::{CssVariables, ThemeTarget};
use novellahub::{Community, Language, Sender};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "novellahub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish novels, poems & songs - discuss in rooms")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/novellahub/config.toml or ./novellahub.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in
    Register {
        username: String,
        #[arg(short, long, env = "NOVELLAHUB_PASSWORD", hide_env_values = true)]
        password: String,
        /// Display name (default: the username)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Sign in
    Login {
        username: String,
        #[arg(short, long, env = "NOVELLAHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami,

    /// Change your display name
    Rename { name: String },

    /// Publish a post (as guest when signed out)
    Publish {
        title: String,
        /// Body text
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read the body from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// novel, poem or song
        #[arg(short = 't', long = "type", default_value = "novel")]
        kind: PostKind,
    },

    /// List posts, most recent first
    Posts {
        /// Only posts by this username ("guest" for anonymous)
        #[arg(short, long)]
        author: Option<String>,
        /// Show at most this many
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List rooms
    Rooms,

    /// Work with a single room
    Room {
        #[command(subcommand)]
        command: RoomCommand,
    },

    /// Show or save your theme
    Theme {
        #[command(subcommand)]
        command: ThemeCommand,
    },

    /// Show or set the interface language (en, bn, zh)
    Lang { language: Option<Language> },

    /// Show store statistics
    Status,

    /// Print changes to the store as they happen
    Watch,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RoomCommand {
    /// Create a room
    Create { title: String },
    /// Join a room
    Join { id: String },
    /// Show a room's members and messages
    Show { id: String },
    /// Send a message
    Send {
        id: String,
        text: String,
        /// Comment as guest
        #[arg(long)]
        guest: bool,
    },
    /// Report a message
    Report { id: String, message_id: String },
}

#[derive(Subcommand)]
pub enum ThemeCommand {
    /// Print the active theme as CSS variables
    Show,
    /// Save accent and background colors for the signed-in user
    Set { accent: String, background: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().to_string();
    }

    init_logging(&config.logging);

    let json = cli.format == "json";
    match cli.command {
        // Needs no store; don't create a data directory for it
        Commands::Config { output } => write_config(output.as_deref()),
        command => run(command, &config, json).await,
    }
}

fn write_config(output: Option<&Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("writing config to {:?}", path))?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn run(command: Commands, config: &Config, json: bool) -> anyhow::Result<()> {
    let data_dir = config.storage.data_path();
    tracing::debug!("Data directory: {:?}", data_dir);
    let store = Arc::new(
        LocalStore::open(&data_dir, config.storage.store_config())
            .with_context(|| format!("opening store in {:?}", data_dir))?,
    );

    let mut hub = Community::new(Arc::clone(&store), Box::new(CssVariables::new()))
        .with_credentials(config.auth.credentials()?);
    hub.restore_session()?;

    match command {
        Commands::Register {
            username,
            password,
            name,
        } => {
            let session = hub.register(&username, &password, name.as_deref())?;
            emit(json, &session, || {
                println!("Registered and signed in as {} ({})", session.name, session.username)
            })?;
        }

        Commands::Login { username, password } => {
            let session = hub.login(&username, &password)?;
            emit(json, &session, || println!("Signed in as {}", session.name))?;
        }

        Commands::Logout => {
            hub.logout()?;
            println!("Signed out");
        }

        Commands::Whoami => {
            let user = hub.current_user().cloned();
            emit(json, &user, || match &user {
                Some(s) => println!("{} ({})", s.name, s.username),
                None => println!("Not signed in"),
            })?;
        }

        Commands::Rename { name } => {
            let session = hub.rename(&name)?;
            emit(json, &session, || println!("Display name is now {}", session.name))?;
        }

        Commands::Publish {
            title,
            content,
            file,
            kind,
        } => {
            let content = match (content, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {:?}", path))?,
                (None, None) => String::new(),
            };
            let post = hub.publish(&title, &content, kind)?;
            emit(json, &post, || {
                println!("Published {} \"{}\" by {} ({})", post.kind, post.title, post.author_name, post.id)
            })?;
        }

        Commands::Posts { author, limit } => {
            let posts = match author {
                Some(a) => hub.posts_by(&a)?,
                None => hub.posts()?,
            };
            let posts: Vec<Post> = posts.into_iter().take(limit).collect();
            emit(json, &posts, || print_posts(&posts))?;
        }

        Commands::Rooms => {
            let rooms = hub.rooms()?;
            emit(json, &rooms, || {
                println!("{:<16} {:<24} {:>9} {:>8}", "ID", "Title", "Messages", "Members");
                println!("{}", "-".repeat(60));
                for room in &rooms {
                    println!(
                        "{:<16} {:<24} {:>9} {:>8}",
                        room.id,
                        room.title,
                        room.messages.len(),
                        room.members.len()
                    );
                }
            })?;
        }

        Commands::Room { command } => run_room(&hub, command, json)?,

        Commands::Theme { command } => match command {
            ThemeCommand::Show => {
                let theme = hub.theme().current();
                emit(json, &theme, || {
                    let mut vars = CssVariables::new();
                    vars.apply(&theme);
                    println!("{}", vars.to_css());
                })?;
            }
            ThemeCommand::Set { accent, background } => {
                hub.save_theme(Theme::new(accent, background))?;
                println!("Theme saved");
            }
        },

        Commands::Lang { language } => match language {
            Some(lang) => {
                hub.set_language(lang)?;
                println!("Language set to {} ({})", lang.native_name(), lang);
            }
            None => {
                let lang = hub.language()?;
                emit(json, &lang, || println!("{} ({})", lang.native_name(), lang))?;
            }
        },

        Commands::Status => {
            let stats = store.stats()?;
            emit(json, &stats, || {
                println!("NovellaHub v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Data directory: {}", data_dir.display());
                println!("{}", stats);
            })?;
        }

        Commands::Watch => watch(store, config.watch.poll_interval_ms).await?,

        Commands::Config { output } => write_config(output.as_deref())?,
    }

    Ok(())
}

fn run_room(hub: &Community, command: RoomCommand, json: bool) -> anyhow::Result<()> {
    match command {
        RoomCommand::Create { title } => {
            let room = hub.create_room(&title)?;
            emit(json, &room, || println!("Created room {} ({})", room.title, room.id))?;
        }
        RoomCommand::Join { id } => {
            if hub.join_room(&id)? {
                println!("Joined {}", id);
            } else {
                println!("Already a member of {}", id);
            }
        }
        RoomCommand::Show { id } => {
            let room = hub.room(&id)?;
            emit(json, &room, || {
                println!("{} ({})", room.title, room.id);
                let members: Vec<&str> = room.members.iter().map(String::as_str).collect();
                println!("Members: {}", if members.is_empty() { "-".to_string() } else { members.join(", ") });
                println!();
                if room.messages.is_empty() {
                    println!("No messages yet - start the conversation.");
                }
                for m in &room.messages {
                    let flag = if m.reported { " [reported]" } else { "" };
                    println!("[{}] {} • {}{}", m.id, m.author_name, m.created_at, flag);
                    println!("    {}", m.text);
                }
            })?;
        }
        RoomCommand::Send { id, text, guest } => {
            let sender = if guest { Sender::Guest } else { Sender::Member };
            let message = hub.send_message(&id, &text, sender)?;
            emit(json, &message, || println!("Sent as {} ({})", message.author_name, message.id))?;
        }
        RoomCommand::Report { id, message_id } => {
            hub.report_message(&id, &message_id)?;
            println!("Reported message {}", message_id);
        }
    }
    Ok(())
}

async fn watch(store: Arc<LocalStore>, poll_interval_ms: u64) -> anyhow::Result<()> {
    let mut events = store.subscribe();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = StoreWatcher::new(Arc::clone(&store))
        .spawn(Duration::from_millis(poll_interval_ms), shutdown_rx);

    tracing::info!("Watching for changes, Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event)?,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

fn print_event(event: &StoreEvent) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("No posts yet - be the first to publish.");
        return;
    }
    for post in posts {
        println!("{}", post.title);
        println!("  {} • by {} • {}", post.kind, post.author_name, post.created_at);
        println!("  {}", post.excerpt(400).replace('\n', "\n  "));
        println!();
    }
}

/// Print `value` as JSON, or run the table printer
fn emit<T: Serialize>(json: bool, value: &T, table: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        table();
    }
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("novellahub={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
