use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use notetar::api::{CmdMessage, ConfigAction, MessageLevel, NotetarApi};
use notetar::config::NotetarConfig;
use notetar::error::{NotetarError, Result};
use notetar::store::fs::FileStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod args;
use args::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

struct AppContext {
    api: NotetarApi<FileStore>,
    cwd: PathBuf,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = init_context(&cli)?;

    match cli.command {
        Commands::Export {
            branch,
            format,
            output,
            gzip,
        } => handle_export(&ctx, branch, format, output, gzip),
        Commands::Manifest { branch, format } => handle_manifest(&ctx, branch, format),
        Commands::Config { key, value } => handle_config(&ctx, key, value),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "notetar=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let store_dir = match &cli.store {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("com", "notetar", "notetar")
            .ok_or_else(|| NotetarError::Api("Could not determine data dir".to_string()))?
            .data_dir()
            .to_path_buf(),
    };

    let store = FileStore::new(store_dir.clone());
    let api = NotetarApi::new(store, store_dir);
    Ok(AppContext { api, cwd })
}

fn handle_export(
    ctx: &AppContext,
    branch: String,
    format: Option<String>,
    output: Option<PathBuf>,
    gzip: bool,
) -> Result<()> {
    let result = ctx.api.export(
        &branch,
        format.as_deref(),
        gzip,
        output.as_deref(),
        &ctx.cwd,
    )?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_manifest(ctx: &AppContext, branch: String, format: Option<String>) -> Result<()> {
    let result = ctx.api.manifest(&branch, format.as_deref())?;
    if let Some(json) = &result.manifest_json {
        println!("{}", json);
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_config(ctx: &AppContext, key: Option<String>, value: Option<String>) -> Result<()> {
    let action = match (key, value) {
        (None, _) => ConfigAction::ShowAll,
        (Some(key), None) => ConfigAction::ShowKey(key),
        (Some(key), Some(value)) => ConfigAction::Set(key, value),
    };

    let result = ctx.api.config(action)?;
    if result.messages.is_empty() {
        if let Some(config) = &result.config {
            print_config(config);
        }
    }
    print_messages(&result.messages);
    Ok(())
}

fn print_config(config: &NotetarConfig) {
    for key in NotetarConfig::keys() {
        if let Some(value) = config.get(key) {
            println!("{} = {}", key, value);
        }
    }
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}
