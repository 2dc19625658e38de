use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tierkv::config::LoggingConfig;
use tierkv::{DirStore, JsonItem, KvConfig, LruCache, RawItem, Store, StoreExt};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "tierkv-cli")]
#[command(about = "tierkv CLI - inspect and edit a tierkv store", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store root directory, overrides the configuration file
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Cache capacity in entries, overrides the configuration file
    #[arg(long)]
    cache: Option<usize>,

    /// Talk to the directory store directly
    #[arg(long)]
    no_cache: bool,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct Session {
    store: Arc<dyn Store>,
    cache: Option<Arc<LruCache>>,
    dir: DirStore,
}

impl Session {
    fn open(config: &KvConfig) -> Result<Self> {
        let dir = DirStore::open(config.store.clone()).context("failed to open store")?;

        if !config.cache.enabled {
            return Ok(Self {
                store: Arc::new(dir.clone()),
                cache: None,
                dir,
            });
        }

        let cache = Arc::new(LruCache::with_backend(
            config.cache.capacity,
            Arc::new(dir.clone()),
        )?);
        Ok(Self {
            store: cache.clone(),
            cache: Some(cache),
            dir,
        })
    }

    async fn execute_command(&self, command: &str, args: &[String]) -> Result<String> {
        let start = Instant::now();

        let response = match command.to_uppercase().as_str() {
            "GET" => self.cmd_get(args)?,
            "SET" => self.cmd_set(args).await?,
            "GETJSON" => self.cmd_get_json(args)?,
            "SETJSON" => self.cmd_set_json(args).await?,
            "DEL" | "DELETE" => self.cmd_del(args).await?,
            "KEYS" => self.cmd_keys(args),
            "FLUSH" => self.cmd_flush().await?,
            "INFO" | "STATS" => self.cmd_stats()?,
            "HELP" => help_text(),
            _ => return Err(anyhow::anyhow!("Unknown command: {}", command)),
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    fn cmd_get(&self, args: &[String]) -> Result<String> {
        let [key] = args else {
            return Err(anyhow::anyhow!("Usage: GET key"));
        };

        match self.store.get(key, RawItem::default()) {
            Some(item) => Ok(format!("\"{}\"", String::from_utf8_lossy(&item.value))),
            None => Ok("(nil)".dimmed().to_string()),
        }
    }

    async fn cmd_set(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!("Usage: SET key value"));
        }

        let value = args[1..].join(" ");
        self.store.put(&args[0], RawItem::new(value)).await?;
        Ok("OK".green().to_string())
    }

    fn cmd_get_json(&self, args: &[String]) -> Result<String> {
        let [key] = args else {
            return Err(anyhow::anyhow!("Usage: GETJSON key"));
        };

        match self.store.get(key, JsonItem::<serde_json::Value>::default()) {
            Some(item) => Ok(serde_json::to_string_pretty(&item.value)?),
            None => Ok("(nil)".dimmed().to_string()),
        }
    }

    async fn cmd_set_json(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!("Usage: SETJSON key json"));
        }

        let value: serde_json::Value =
            serde_json::from_str(&args[1..].join(" ")).context("value is not valid JSON")?;
        self.store.put(&args[0], JsonItem::new(value)).await?;
        Ok("OK".green().to_string())
    }

    async fn cmd_del(&self, args: &[String]) -> Result<String> {
        let [key] = args else {
            return Err(anyhow::anyhow!("Usage: DEL key"));
        };

        match &self.cache {
            // The cache forwards deletes of resident entries to the directory
            Some(cache) if cache.contains(key) => cache.delete(key).await?,
            // Evicted or uncached keys live only on disk; a missing file is an error
            _ => self.dir.delete(key).await?,
        }
        Ok("OK".green().to_string())
    }

    fn cmd_keys(&self, args: &[String]) -> String {
        let prefix = args.first().map(String::as_str).unwrap_or("");

        // Resident keys plus everything already persisted
        let mut keys = self.dir.list(prefix);
        if self.cache.is_some() {
            keys.extend(self.store.list(prefix));
        }
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            return "(empty list)".dimmed().to_string();
        }
        keys.iter()
            .enumerate()
            .map(|(i, k)| format!("{}) \"{}\"", i + 1, k))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn cmd_flush(&self) -> Result<String> {
        self.store.flush().await?;
        Ok("OK".green().to_string())
    }

    fn cmd_stats(&self) -> Result<String> {
        let mut info = serde_json::json!({
            "root": self.dir.root().display().to_string(),
            "pending_writes": self.dir.pending_writes(),
        });

        if let Some(cache) = &self.cache {
            let stats = cache.stats();
            info["cache"] = serde_json::json!({
                "entries": cache.len(),
                "capacity": cache.capacity(),
                "hit_rate": stats.hit_rate(),
                "stats": stats,
            });
        }

        Ok(serde_json::to_string_pretty(&info)?)
    }

    /// Write back everything still pending before the process exits
    async fn close(&self) {
        if let Err(e) = self.store.flush().await {
            warn!("Final flush failed: {}", e);
        }
    }
}

fn help_text() -> String {
    let commands = [
        ("GET key", "Read a value as text"),
        ("SET key value", "Store a text value"),
        ("GETJSON key", "Read a JSON value and pretty-print it"),
        ("SETJSON key json", "Validate and store a JSON value"),
        ("DEL key", "Remove a key"),
        ("KEYS [prefix]", "List keys starting with prefix"),
        ("FLUSH", "Write back the cache and sync to disk"),
        ("STATS", "Show store and cache statistics"),
        ("QUIT", "Exit"),
    ];

    let mut out = format!("{}\n", "Available commands:".bold());
    for (usage, description) in commands {
        out.push_str(&format!("  {:<20} {}\n", usage.cyan(), description));
    }
    out
}

fn load_config(args: &Args) -> Result<KvConfig> {
    let mut config = match &args.config {
        Some(path) => KvConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => KvConfig::default(),
    };

    if let Some(root) = &args.root {
        config.store.root = root.clone();
    }
    if let Some(capacity) = args.cache {
        config.cache.enabled = true;
        config.cache.capacity = capacity;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.logging);

    let session = Session::open(&config)?;

    // Check if running in command mode or interactive mode
    if !args.command.is_empty() {
        let cmd = &args.command[0];
        let cmd_args: Vec<String> = args.command[1..].to_vec();

        let result = session.execute_command(cmd, &cmd_args).await;
        session.close().await;

        match result {
            Ok(output) => {
                info!("{}", output);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "{}", format!("Error: {}", e).red());
                std::process::exit(1);
            }
        }
    } else {
        let result = run_interactive(&session, &config).await;
        session.close().await;
        result
    }
}

async fn run_interactive(session: &Session, config: &KvConfig) -> Result<()> {
    info!(
        "{}",
        format!("tierkv CLI v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    info!("Store root: {}", config.store.root.display());
    match &session.cache {
        Some(cache) => info!("Cache: {} entries", cache.capacity()),
        None => info!("Cache: disabled"),
    }
    info!("Type {} for available commands\n", "HELP".bold());

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&format!("{}> ", "tierkv".green()));

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                rl.add_history_entry(&line)?;

                let parts: Vec<String> = line.split_whitespace().map(String::from).collect();
                let cmd = &parts[0];
                let args = &parts[1..];

                if cmd.eq_ignore_ascii_case("QUIT") || cmd.eq_ignore_ascii_case("EXIT") {
                    info!("Goodbye!");
                    break;
                }

                match session.execute_command(cmd, args).await {
                    Ok(output) => info!("{}", output),
                    Err(e) => {
                        error!(error = %e, "{}", format!("Error: {}", e).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                info!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                info!("Goodbye!");
                break;
            }
            Err(err) => {
                error!(error = ?err, "Readline error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
