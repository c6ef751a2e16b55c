//! Command-line interface implementation

use clap::{Parser, ValueEnum};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

use crate::audio::{PlayerSnapshot, TransportState};
use crate::config::Settings;
use crate::i18n::{Language, MessageCatalog};

/// Command-line arguments for serene-player
#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal player for synthesized meditation audio", long_about = None)]
pub struct Args {
    /// File holding the base64 PCM payload, or `-` for stdin
    #[arg(default_value = "-")]
    pub payload: PathBuf,

    /// ALSA device to use
    #[arg(short = 'd', long, env = "SERENE_ALSA_DEVICE")]
    pub alsa_device: Option<String>,

    /// Initial playback rate
    #[arg(short, long)]
    pub rate: Option<f32>,

    /// Interface language (en, fr, es)
    #[arg(short, long, env = "SERENE_LANGUAGE")]
    pub language: Option<Language>,

    /// Directory holding `<lang>.json` message files
    #[arg(long, env = "SERENE_LOCALES_DIR")]
    pub locales_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, env = "SERENE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Start playing as soon as the payload is decoded
    #[arg(long)]
    pub autoplay: bool,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// CLI user interface for interacting with the application
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli {
            args: Args::parse(),
        }
    }

    pub fn from_args(args: Args) -> Self {
        Cli { args }
    }

    /// Config file to use: the flag, otherwise the per-user default.
    pub fn config_path(&self) -> PathBuf {
        self.args
            .config
            .clone()
            .unwrap_or_else(Settings::default_path)
    }

    /// Applies command-line overrides on top of loaded settings.
    /// The requested rate is clamped into the configured range.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(device) = &self.args.alsa_device {
            settings.alsa_device = device.clone();
        }
        if let Some(language) = self.args.language {
            settings.language = language;
        }
        if let Some(dir) = &self.args.locales_dir {
            settings.locales_dir = Some(dir.clone());
        }
        if let Some(rate) = self.args.rate {
            if rate.is_finite() {
                settings.default_playback_rate = settings.clamp_rate(rate);
            }
        }
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn std::error::Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePlayPause,
    SpeedUp,
    SpeedDown,
    Quit,
}

/// Maps a key to an action. Transport keys only work while the session's
/// controls are enabled; quitting always works.
pub fn map_key(key: KeyEvent, controls_enabled: bool) -> Option<KeyAction> {
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Enter => KeyAction::TogglePlayPause,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right | KeyCode::Up => KeyAction::SpeedUp,
        KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Left | KeyCode::Down => KeyAction::SpeedDown,
        _ => return None,
    };
    if action != KeyAction::Quit && !controls_enabled {
        return None;
    }
    Some(action)
}

/// Status message key for a snapshot.
pub fn status_key(snapshot: &PlayerSnapshot) -> &'static str {
    if snapshot.error.is_some() {
        return "player.status.playbackUnavailable";
    }
    match snapshot.state {
        TransportState::Idle | TransportState::Loading => "player.status.preparingAudio",
        TransportState::Playing => "player.status.playing",
        TransportState::Finished => "player.status.finished",
        TransportState::Ready | TransportState::Errored => "player.status.paused",
    }
}

/// One-line status for the terminal.
pub fn render_status(snapshot: &PlayerSnapshot, catalog: &dyn MessageCatalog) -> String {
    let status = catalog.translate(status_key(snapshot));

    if let Some(code) = snapshot.error {
        return format!(
            "{}: {} | {}",
            catalog.translate("player.audioErrorTitle"),
            catalog.translate(code.key()),
            status
        );
    }
    if snapshot.is_finished {
        return format!("{} | {}", status, catalog.translate("player.finishedHint"));
    }
    format!(
        "{} | {}: {:.2}x | {}",
        status,
        catalog.translate("player.speedLabel"),
        snapshot.playback_rate,
        catalog.translate("player.controlsHint")
    )
}
