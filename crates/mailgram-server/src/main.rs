//! Mailgram server binary.
//!
//! Start with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx OPENAI_API_KEY=xxx PUBSUB_TOPIC=projects/p/topics/t \
//!     cargo run -p mailgram-server
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailgram_classifier::{ChatTransport, Classifier, ClassifierConfig, HttpTransport};
use mailgram_persistence::{AccountStore, HistoryLedger, KvStore};
use mailgram_pipeline::Pipeline;
use mailgram_server::{serve, AppState, GmailGateway, ServerConfig};
use mailgram_telegram::TelegramChannel;

/// Mailgram - Gmail to Telegram mail triage service
#[derive(Parser, Debug)]
#[command(name = "mailgram-server")]
#[command(about = "Watches Gmail inboxes and forwards classified mail to Telegram")]
struct Args {
    /// Port to bind (overrides MAILGRAM_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _ = dotenvy::dotenv();

    let filter = match args.verbose {
        0 => "mailgram_server=info,mailgram_pipeline=info",
        1 => "mailgram_server=debug,mailgram_pipeline=debug,mailgram_classifier=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let ledger = Arc::new(HistoryLedger::new(&config.state_dir));
    let kv = Arc::new(KvStore::open(&config.state_dir)?);
    let accounts = Arc::new(AccountStore::new(&config.state_dir));

    let transport: Arc<dyn ChatTransport> = Arc::new(HttpTransport::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
    ));
    let classifier = Arc::new(Classifier::with_transport(
        Arc::clone(&transport),
        ClassifierConfig {
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            base_model: config.base_model.clone(),
            trial_model: config.trial_model.clone(),
        },
    ));

    let gateway = Arc::new(GmailGateway::new(config.pubsub_topic.clone()));
    let channel = Arc::new(TelegramChannel::from_token(config.bot_token.clone()));

    let pipeline = Pipeline::new(
        ledger,
        kv,
        accounts,
        gateway,
        channel,
        classifier,
        Arc::clone(&transport),
        config.base_model.clone(),
    );

    tracing::info!(
        state_dir = %config.state_dir.display(),
        "Mailgram server starting"
    );

    serve(AppState::new(config, pipeline)).await?;

    Ok(())
}
