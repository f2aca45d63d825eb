mod poll;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cashback_ai::OpenAiVision;
use cashback_chat::TelegramClient;
use cashback_host::{Config, Dispatcher, Pipeline, Router};
use cashback_store::{Gateway, NotionStore};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cashback", version, about = "Reads cashback offers off banking-app screenshots.")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "CASHBACK_CONFIG", default_value = "configs/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat bot (default).
    Run,
    /// Print the category vocabulary from the database.
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Categories => categories(config).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("cashback v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.bot.images_path)
        .with_context(|| format!("creating {}", config.bot.images_path.display()))?;

    let gateway: Arc<dyn Gateway> = Arc::new(NotionStore::new(
        config.db.api_key.clone(),
        config.db.db_id.clone(),
    ));
    let model = Arc::new(OpenAiVision::new(
        config.vlm.base_url.clone(),
        config.vlm.api_token.clone(),
        config.vlm.model_name.clone(),
    ));
    let telegram = Arc::new(TelegramClient::new(config.bot.token.clone()));

    let bot_name = telegram.get_me().await.context("checking bot token")?;
    tracing::info!(bot = %bot_name, users = config.bot.users.len(), "connected");

    let pipeline = Pipeline::new(
        gateway.clone(),
        model,
        config.vlm.prompt_template,
        config.vlm.sampling_params,
        config.vlm.image_size,
    );
    let idle = Duration::from_secs(config.bot.lane_idle_secs);
    let dispatcher = Dispatcher::new(config.bot, pipeline, gateway, telegram.clone());
    let router = Router::new(Arc::new(dispatcher), idle);

    poll::run(&telegram, &router).await;
    Ok(())
}

async fn categories(config: Config) -> anyhow::Result<()> {
    let store = NotionStore::new(config.db.api_key, config.db.db_id);
    let categories = store
        .list_categories()
        .await
        .context("fetching categories")?;
    for name in &categories {
        println!("{name}");
    }
    eprintln!("{} categories", categories.len());
    Ok(())
}
