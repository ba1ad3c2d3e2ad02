use super::{SimControls, SimRadio};
use crate::hardware::{InputEvents, InputSource};
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Terminals report no key releases, so the shutter counts as held while
/// auto-repeat keeps delivering presses within this window
const HOLD_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct KeyState {
    pending: InputEvents,
    last_shutter: Option<Instant>,
}

/// Keyboard stand-in for the camera buttons.
///
/// Arrows navigate, Enter is OK, Tab is Select, Space is the shutter and
/// `f` a long shutter press (focus). `i`/`r` insert and remove the card,
/// `w` toggles the access point, `e` toggles an encoder fault, `q`/Esc quit.
pub struct KeyboardInput {
    state: Arc<Mutex<KeyState>>,
    controls: Arc<SimControls>,
    radio: Arc<SimRadio>,
    cancellation_token: CancellationToken,
}

impl KeyboardInput {
    pub fn new(
        controls: Arc<SimControls>,
        radio: Arc<SimRadio>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(KeyState::default())),
            controls,
            radio,
            cancellation_token,
        }
    }

    /// Put the terminal in raw mode and read keys on the blocking pool
    pub fn start(self: &Arc<Self>) {
        info!("Keyboard controls: arrows, Enter=ok, Tab=select, Space=shutter, f=focus, i/r=card, w=wifi, e=encoder fault, q=quit");
        let input = Arc::clone(self);

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !input.cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if key_event.kind == KeyEventKind::Press {
                                input.handle_key(key_event.code);
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });
    }

    /// Make sure the terminal is usable again even if the reader never ran
    pub fn stop(&self) {
        self.cancellation_token.cancel();
        let _ = disable_raw_mode();
    }

    fn handle_key(&self, code: KeyCode) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let events = &mut state.pending;
        match code {
            KeyCode::Up => events.up = true,
            KeyCode::Down => events.down = true,
            KeyCode::Left => events.left = true,
            KeyCode::Right => events.right = true,
            KeyCode::Enter => events.ok = true,
            KeyCode::Tab => events.select = true,
            KeyCode::Char(' ') => {
                events.shutter_short = true;
                state.last_shutter = Some(Instant::now());
            }
            KeyCode::Char('f') => events.shutter_long = true,
            KeyCode::Char('i') => {
                if !self.controls.card_present() {
                    info!("Card inserted");
                    self.controls.set_card_present(true);
                    events.card_inserted = true;
                }
            }
            KeyCode::Char('r') => {
                if self.controls.card_present() {
                    info!("Card pulled");
                    self.controls.set_card_present(false);
                    events.card_removed = true;
                }
            }
            KeyCode::Char('w') => {
                self.radio.toggle_access_point();
            }
            KeyCode::Char('e') => {
                let faulty = self.controls.toggle_encoder_fault();
                info!("Encoder fault {}", if faulty { "on" } else { "off" });
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                info!("Quit key pressed - requesting shutdown");
                self.cancellation_token.cancel();
            }
            other => debug!("Key pressed: {:?}", other),
        }
    }
}

#[async_trait]
impl InputSource for KeyboardInput {
    async fn poll(&self) -> InputEvents {
        std::mem::take(&mut self.state.lock().pending)
    }

    async fn shutter_held(&self) -> bool {
        self.state
            .lock()
            .last_shutter
            .map_or(false, |at| at.elapsed() < HOLD_WINDOW)
    }
}
