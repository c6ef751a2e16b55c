use serene_player::audio::{AlsaPlatform, PcmDecoder, PlaybackController};
use serene_player::config::Settings;
use serene_player::i18n::Translations;
use serene_player::init_app_dirs;
use serene_player::player::{Player, COMMAND_BUFFER_SIZE, STATE_UPDATE_CAPACITY};
use serene_player::synthesis::{FilePayloadSource, PayloadSource};
use serene_player::ui::{self, Cli, LogFormat};
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TARGET: &str = "serene_player::main";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "serene_player=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse command-line arguments and initialize CLI
    let cli = Cli::new();
    init_tracing(cli.args.log_format);

    // Initialize application directories
    init_app_dirs()?;

    // Load configuration from file or create default
    let config_path = cli.config_path();
    let mut settings = Settings::load(&config_path)?;
    settings.validate()?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;
    info!(target: LOG_TARGET, "Using ALSA device '{}', language '{}'.", settings.alsa_device, settings.language);

    let catalog = Translations::load_or_builtin(settings.locales_dir.as_deref(), settings.language);

    let payload = FilePayloadSource::new(&cli.args.payload).fetch_payload().await?;

    let controller = PlaybackController::with_decoder(
        AlsaPlatform::new(&settings.alsa_device),
        PcmDecoder,
        settings.sample_rate,
    )
    .with_default_rate(settings.default_playback_rate);
    let (mut player, handle) = Player::new(controller, STATE_UPDATE_CAPACITY, COMMAND_BUFFER_SIZE);
    let player_task = tokio::spawn(async move { player.run().await });

    let session = handle.load(payload).await?;
    let result = ui::run_session(&session, &settings, &catalog, cli.args.autoplay).await;

    // Tear the session down before reporting anything.
    if handle.shutdown().await.is_err() {
        error!(target: LOG_TARGET, "Player task already exited.");
    }
    if let Err(e) = player_task.await {
        error!(target: LOG_TARGET, "Player task panicked: {}", e);
    }

    if let Err(e) = &result {
        cli.display_error(e.as_ref());
    }
    result
}
