//! Interactive terminal session: raw-mode keys in, status line out.

use super::cli::{map_key, render_status, KeyAction};
use crate::audio::PlayerSnapshot;
use crate::config::Settings;
use crate::i18n::MessageCatalog;
use crate::player::{PlayerStateUpdate, SessionControls};
use crossterm::{
    cursor,
    event::{self, Event, KeyEvent, KeyEventKind},
    execute,
    style::Print,
    terminal::{self, ClearType},
};
use std::error::Error;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "serene_player::ui::terminal";

/// How often the key reader checks whether it should exit.
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode for as long as the guard lives.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(target: LOG_TARGET, "Failed to restore terminal mode: {}", e);
        }
        let _ = execute!(io::stdout(), Print("\r\n"));
    }
}

/// Reads key presses on a dedicated thread; crossterm's reads block.
/// The thread exits shortly after the receiver is dropped.
fn spawn_key_reader() -> io::Result<mpsc::Receiver<KeyEvent>> {
    let (tx, rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("key-reader".to_string())
        .spawn(move || {
            while !tx.is_closed() {
                match event::poll(KEY_POLL_INTERVAL) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            if tx.blocking_send(key).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(target: LOG_TARGET, "Key reader stopped: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        warn!(target: LOG_TARGET, "Key reader stopped: {}", e);
                        break;
                    }
                }
            }
            debug!(target: LOG_TARGET, "Key reader exiting.");
        })?;
    Ok(rx)
}

fn draw(snapshot: &PlayerSnapshot, catalog: &dyn MessageCatalog) -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(render_status(snapshot, catalog))
    )?;
    stdout.flush()
}

/// Runs the interactive controls for one session until the user quits or
/// the player stops.
pub async fn run_session(
    controls: &SessionControls,
    settings: &Settings,
    catalog: &dyn MessageCatalog,
    autoplay: bool,
) -> Result<(), Box<dyn Error>> {
    let mut updates = controls.subscribe();
    if autoplay {
        controls.play().await?;
    }

    let _guard = TerminalGuard::new()?;
    let mut keys = spawn_key_reader()?;
    let mut current = controls.snapshot().await?;
    draw(&current, catalog)?;

    loop {
        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else {
                    break;
                };
                match map_key(key, current.controls_enabled()) {
                    Some(KeyAction::Quit) => {
                        info!(target: LOG_TARGET, "Quit requested.");
                        break;
                    }
                    Some(KeyAction::TogglePlayPause) => controls.toggle_play_pause().await?,
                    Some(KeyAction::SpeedUp) => {
                        controls.set_playback_rate(settings.step_rate(current.playback_rate, true)).await?
                    }
                    Some(KeyAction::SpeedDown) => {
                        controls.set_playback_rate(settings.step_rate(current.playback_rate, false)).await?
                    }
                    None => {}
                }
            }

            update = updates.recv() => match update {
                Ok(PlayerStateUpdate::StateChanged(snapshot)) if snapshot.session == Some(controls.session()) => {
                    current = snapshot;
                    draw(&current, catalog)?;
                }
                Ok(PlayerStateUpdate::Stopped) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(target: LOG_TARGET, "Missed {} state updates; refreshing.", skipped);
                    current = controls.snapshot().await?;
                    draw(&current, catalog)?;
                }
            },
        }
    }
    Ok(())
}
