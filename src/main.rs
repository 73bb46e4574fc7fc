use dotenvy::dotenv;
use oxide_music::acquisition::{
    AcquisitionPipeline, YtDlpDownloader, DELIVERY_STRATEGIES, PLAYBACK_STRATEGIES,
};
use oxide_music::bot::{handlers, views, Command, TelegramDelivery};
use oxide_music::config::{Settings, QUEUE_PRUNE_INTERVAL_SECS};
use oxide_music::delivery::Delivery;
use oxide_music::playback::{BridgeTransport, Scheduler, TransportEvent};
use oxide_music::queue::ChatQueueRegistry;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Capacity of the transport event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    cookies_env: Regex,
    cookies_arg: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            cookies_env: Regex::new(r"YOUTUBE_COOKIES=[^\s&]+")?,
            cookies_arg: Regex::new(r"(--cookies[ =])[^\s]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .cookies_env
            .replace_all(&output, "YOUTUBE_COOKIES=[MASKED]")
            .to_string();
        output = self
            .cookies_arg
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Redaction must be ready before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Oxide Music bot...");

    let settings = init_settings();
    init_download_dir(&settings).await;

    let bot = Bot::new(settings.telegram_token.clone());
    let cancel = CancellationToken::new();

    let downloader = Arc::new(YtDlpDownloader::new(
        settings.ytdlp_binary.clone(),
        settings.download_directory.clone(),
    ));
    let pipeline = Arc::new(AcquisitionPipeline::new(
        downloader.clone(),
        PLAYBACK_STRATEGIES,
        settings.acquisition(),
    ));
    let delivery = Arc::new(Delivery::new(
        AcquisitionPipeline::new(downloader, DELIVERY_STRATEGIES, settings.acquisition()),
        Arc::new(TelegramDelivery::new(bot.clone())),
        settings.max_duration_seconds,
    ));
    info!(
        strategies = pipeline.active_strategies().len(),
        cookies = settings.youtube_cookies.is_some(),
        "Acquisition pipeline initialized."
    );

    let registry = Arc::new(ChatQueueRegistry::new());
    let transport = BridgeTransport::new(settings.voice_bridge_url.clone()).map_err(|e| {
        error!("Failed to build voice bridge client: {e}");
        e
    })?;
    let scheduler = Arc::new(Scheduler::new(
        registry.clone(),
        Arc::new(transport.clone()),
    ));

    let (events_tx, events_rx) = mpsc::channel::<TransportEvent>(EVENT_CHANNEL_CAPACITY);
    let listener = tokio::spawn(transport.forward_events(
        events_tx,
        settings.bridge_poll_interval(),
        cancel.clone(),
    ));
    tokio::spawn(scheduler.clone().run_events(events_rx));
    tokio::spawn(prune_idle_queues(registry, cancel.clone()));
    info!(bridge = %settings.voice_bridge_url, "Playback scheduler initialized.");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![pipeline, scheduler, delivery])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    if let Err(e) = listener.await {
        error!("Bridge listener task failed: {e}");
    }
    info!("Shutdown complete.");

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_download_dir(settings: &Settings) {
    if let Err(e) = tokio::fs::create_dir_all(&settings.download_directory).await {
        error!(
            "Failed to create download directory {}: {}",
            settings.download_directory.display(),
            e
        );
        std::process::exit(1);
    }
}

async fn prune_idle_queues(registry: Arc<ChatQueueRegistry>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(QUEUE_PRUNE_INTERVAL_SECS));
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let removed = registry.prune_idle().await;
        if removed > 0 {
            debug!(removed, "Pruned idle conversation queues");
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message().branch(
        dptree::entry()
            .filter_command::<Command>()
            .endpoint(handle_command),
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    pipeline: Arc<AcquisitionPipeline>,
    scheduler: Arc<Scheduler>,
    delivery: Arc<Delivery>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::static_text(bot, msg, views::WELCOME).await,
        Command::Help => handlers::static_text(bot, msg, views::HELP).await,
        Command::About => handlers::static_text(bot, msg, views::ABOUT).await,
        // Resolving takes seconds to minutes; keep the chat responsive meanwhile
        Command::Play(query) => {
            tokio::spawn(async move {
                if let Err(e) = handlers::play(bot, msg, query, pipeline, scheduler).await {
                    error!("Play command error: {}", e);
                }
            });
            Ok(())
        }
        Command::Download(query) => {
            tokio::spawn(async move {
                if let Err(e) = handlers::download(bot, msg, query, delivery).await {
                    error!("Download command error: {}", e);
                }
            });
            Ok(())
        }
        Command::Pause => handlers::pause(bot, msg, scheduler).await,
        Command::Resume => handlers::resume(bot, msg, scheduler).await,
        Command::Skip => handlers::skip(bot, msg, scheduler).await,
        Command::Stop => handlers::stop(bot, msg, scheduler).await,
        Command::Queue => handlers::queue(bot, msg, scheduler).await,
        Command::Current => handlers::current(bot, msg, scheduler).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}
