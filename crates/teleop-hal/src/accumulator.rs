//! [`InputStateAccumulator`] – the keyboard-driven control state.
//!
//! A background listener thread blocks on a [`KeySource`] and folds each
//! key-down into the shared [`ControlState`]; a publisher polls
//! [`InputStateAccumulator::snapshot`] on its own timer.  Both sides go
//! through one mutex that guards the state *and* the run flag, so a snapshot
//! never sees a half-applied update and no delta lands after `stop()`.
//!
//! # Example
//!
//! ```
//! use teleop_hal::{Flow, InputStateAccumulator};
//! use teleop_types::{Key, KeyEvent};
//!
//! let acc = InputStateAccumulator::default();
//! acc.handle_event(KeyEvent::press('w'));
//! acc.handle_event(KeyEvent::press('a'));
//! assert_eq!(acc.handle_event(KeyEvent::down(Key::Escape)), Flow::Break);
//!
//! let state = acc.snapshot();
//! assert!((state.speed - 0.1).abs() < 1e-9);
//! assert_eq!(state.steering_angle, 1.0);
//! assert!(!acc.is_running());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use teleop_types::{ControlState, Key, KeyEvent, TeleopError};
use tracing::{debug, error, info};

use crate::keyboard::KeySource;
use crate::keymap::{ControlDeltas, KeyAction};

/// Name given to the background listener thread.
pub const LISTENER_THREAD_NAME: &str = "keyboard-listener";

/// What the listener loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Break,
}

struct Inner {
    control: ControlState,
    running: bool,
}

/// Shared keyboard state. Construct once, wrap in an [`Arc`], and hand clones
/// to the listener and the publisher.
pub struct InputStateAccumulator {
    inner: Mutex<Inner>,
    deltas: ControlDeltas,
}

impl Default for InputStateAccumulator {
    fn default() -> Self {
        Self::new(ControlDeltas::default())
    }
}

impl InputStateAccumulator {
    pub fn new(deltas: ControlDeltas) -> Self {
        Self {
            inner: Mutex::new(Inner {
                control: ControlState::default(),
                running: true,
            }),
            deltas,
        }
    }

    pub fn deltas(&self) -> ControlDeltas {
        self.deltas
    }

    /// Spawn the listener thread consuming `source`.
    ///
    /// The thread exits on Escape/Ctrl-C, after [`stop`](Self::stop) once its
    /// current blocking read returns, or when `source` fails.  A source
    /// failure clears the run flag before it is returned through the handle.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::InputSource`] if the OS refuses to spawn the
    /// thread.
    pub fn start<S>(
        self: &Arc<Self>,
        source: S,
    ) -> Result<JoinHandle<Result<(), TeleopError>>, TeleopError>
    where
        S: KeySource + 'static,
    {
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_string())
            .spawn(move || this.listen(source))
            .map_err(|e| TeleopError::InputSource(format!("failed to spawn listener: {e}")))?;
        info!("Keyboard control started, press Esc to exit.");
        Ok(handle)
    }

    /// Clear the run flag. Safe to call more than once.
    pub fn stop(&self) {
        let was_running = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.running, false)
        };
        if was_running {
            info!("Keyboard control stopped.");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Copy of the current control state.
    pub fn snapshot(&self) -> ControlState {
        self.lock().control
    }

    /// Apply one key event.
    ///
    /// Key-ups and unbound keys are ignored.  Escape and Ctrl-C stop the
    /// accumulator and return [`Flow::Break`].  Deltas are dropped once the
    /// accumulator has been stopped.
    pub fn handle_event(&self, event: KeyEvent) -> Flow {
        if !event.is_down() {
            return Flow::Continue;
        }
        match event.key {
            Key::Escape | Key::Interrupt => {
                debug!(key = %event.key, "exit key pressed");
                self.stop();
                Flow::Break
            }
            ref key => {
                if let Some(action) = KeyAction::for_key(key) {
                    self.apply(action);
                }
                Flow::Continue
            }
        }
    }

    fn apply(&self, action: KeyAction) {
        let updated = {
            let mut inner = self.lock();
            if !inner.running {
                return;
            }
            inner.control = action.apply(inner.control, &self.deltas);
            inner.control
        };
        match action {
            KeyAction::Forward => info!(speed = updated.speed, "Forward: speed increased"),
            KeyAction::Backward => info!(speed = updated.speed, "Backward: speed decreased"),
            KeyAction::TurnLeft => info!(
                steering_angle = updated.steering_angle,
                "Turn left: steering angle increased"
            ),
            KeyAction::TurnRight => info!(
                steering_angle = updated.steering_angle,
                "Turn right: steering angle decreased"
            ),
        }
    }

    fn listen<S: KeySource>(&self, mut source: S) -> Result<(), TeleopError> {
        while self.is_running() {
            let event = match source.next_event() {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "keyboard source failed");
                    self.stop();
                    return Err(e);
                }
            };
            if self.handle_event(event) == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    // A panic while holding the lock cannot leave the two f64s half-written,
    // so a poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::ChannelKeySource;
    use std::time::Duration;

    const EPS: f64 = 1e-9;

    fn press_all(acc: &InputStateAccumulator, keys: &str) {
        for c in keys.chars() {
            acc.handle_event(KeyEvent::press(c));
        }
    }

    #[test]
    fn fresh_accumulator_is_zeroed_and_running() {
        let acc = InputStateAccumulator::default();
        assert_eq!(acc.snapshot(), ControlState::default());
        assert!(acc.is_running());
    }

    #[test]
    fn w_presses_accumulate_speed() {
        for n in [1usize, 3, 10, 57] {
            let acc = InputStateAccumulator::default();
            press_all(&acc, &"w".repeat(n));
            let expected = n as f64 * 0.1;
            assert!((acc.snapshot().speed - expected).abs() < EPS, "n = {n}");
            assert_eq!(acc.snapshot().steering_angle, 0.0);
        }
    }

    #[test]
    fn s_presses_go_negative() {
        for n in [1usize, 4, 25] {
            let acc = InputStateAccumulator::default();
            press_all(&acc, &"s".repeat(n));
            let expected = -(n as f64) * 0.1;
            assert!((acc.snapshot().speed - expected).abs() < EPS, "n = {n}");
        }
    }

    #[test]
    fn steering_is_unbounded() {
        let acc = InputStateAccumulator::default();
        press_all(&acc, &"a".repeat(400));
        assert_eq!(acc.snapshot().steering_angle, 400.0);
        press_all(&acc, &"d".repeat(1000));
        assert_eq!(acc.snapshot().steering_angle, -600.0);
    }

    #[test]
    fn mixed_sequence_scenario() {
        let acc = InputStateAccumulator::default();
        press_all(&acc, "wwas");
        let state = acc.snapshot();
        assert!((state.speed - 0.1).abs() < EPS);
        assert_eq!(state.steering_angle, 1.0);
    }

    #[test]
    fn escape_first_leaves_state_untouched() {
        let acc = InputStateAccumulator::default();
        assert_eq!(acc.handle_event(KeyEvent::down(Key::Escape)), Flow::Break);
        assert_eq!(acc.snapshot(), ControlState::default());
        assert!(!acc.is_running());
    }

    #[test]
    fn keys_after_escape_do_not_alter_state() {
        let acc = InputStateAccumulator::default();
        press_all(&acc, "wa");
        acc.handle_event(KeyEvent::down(Key::Escape));
        let frozen = acc.snapshot();
        press_all(&acc, "wwwwaaaassdd");
        assert_eq!(acc.snapshot(), frozen);
    }

    #[test]
    fn ctrl_c_key_behaves_like_escape() {
        let acc = InputStateAccumulator::default();
        assert_eq!(acc.handle_event(KeyEvent::down(Key::Interrupt)), Flow::Break);
        assert!(!acc.is_running());
    }

    #[test]
    fn key_up_and_unbound_keys_are_ignored() {
        let acc = InputStateAccumulator::default();
        assert_eq!(acc.handle_event(KeyEvent::up(Key::Char('w'))), Flow::Continue);
        assert_eq!(acc.handle_event(KeyEvent::up(Key::Escape)), Flow::Continue);
        press_all(&acc, "qxzW");
        acc.handle_event(KeyEvent::down(Key::Other("Up".to_string())));
        assert_eq!(acc.snapshot(), ControlState::default());
        assert!(acc.is_running());
    }

    #[test]
    fn stop_is_idempotent() {
        let acc = InputStateAccumulator::default();
        acc.stop();
        acc.stop();
        assert!(!acc.is_running());
    }

    #[test]
    fn custom_deltas_flow_through() {
        let acc = InputStateAccumulator::new(ControlDeltas {
            speed: 0.5,
            steering_angle: 3.0,
        });
        press_all(&acc, "wwd");
        assert_eq!(acc.snapshot(), ControlState::new(1.0, -3.0));
        assert_eq!(acc.deltas().speed, 0.5);
    }

    #[test]
    fn listener_thread_applies_events_until_escape() -> Result<(), Box<dyn std::error::Error>> {
        let acc = Arc::new(InputStateAccumulator::default());
        let (tx, source) = ChannelKeySource::pair();
        let handle = acc.start(source)?;

        for c in "wwas".chars() {
            tx.send(KeyEvent::press(c))?;
        }
        tx.send(KeyEvent::down(Key::Escape))?;
        // Sent after Escape: must never be consumed.
        tx.send(KeyEvent::press('w'))?;

        let outcome = handle.join().map_err(|_| "listener panicked")?;
        assert!(outcome.is_ok());
        assert!(!acc.is_running());
        let state = acc.snapshot();
        assert!((state.speed - 0.1).abs() < EPS);
        assert_eq!(state.steering_angle, 1.0);
        Ok(())
    }

    #[test]
    fn listener_thread_is_named() -> Result<(), Box<dyn std::error::Error>> {
        let acc = Arc::new(InputStateAccumulator::default());
        let (tx, source) = ChannelKeySource::pair();
        let handle = acc.start(source)?;
        assert_eq!(handle.thread().name(), Some(LISTENER_THREAD_NAME));
        tx.send(KeyEvent::down(Key::Escape))?;
        handle.join().map_err(|_| "listener panicked")??;
        Ok(())
    }

    #[test]
    fn source_failure_is_returned_and_clears_run_flag() -> Result<(), Box<dyn std::error::Error>> {
        let acc = Arc::new(InputStateAccumulator::default());
        let (tx, source) = ChannelKeySource::pair();
        let handle = acc.start(source)?;
        tx.send(KeyEvent::press('w'))?;
        drop(tx);

        let outcome = handle.join().map_err(|_| "listener panicked")?;
        assert!(matches!(outcome, Err(TeleopError::InputClosed)));
        assert!(!acc.is_running());
        assert!((acc.snapshot().speed - 0.1).abs() < EPS);
        Ok(())
    }

    #[test]
    fn stop_is_observed_after_the_pending_read() -> Result<(), Box<dyn std::error::Error>> {
        let acc = Arc::new(InputStateAccumulator::default());
        let (tx, source) = ChannelKeySource::pair();
        let handle = acc.start(source)?;

        acc.stop();
        // The listener is still parked in `recv`; it wakes, drops the delta,
        // and exits on the next loop check. It may also have exited before its
        // first read, in which case the send fails.
        let _ = tx.send(KeyEvent::press('w'));
        handle.join().map_err(|_| "listener panicked")??;
        assert_eq!(acc.snapshot(), ControlState::default());
        Ok(())
    }

    #[test]
    fn concurrent_snapshots_are_never_torn() {
        const PAIRS: usize = 2_000;
        let acc = Arc::new(InputStateAccumulator::new(ControlDeltas {
            speed: 1.0,
            steering_angle: 1.0,
        }));

        let writer = {
            let acc = Arc::clone(&acc);
            thread::spawn(move || {
                for _ in 0..PAIRS {
                    acc.handle_event(KeyEvent::press('w'));
                    acc.handle_event(KeyEvent::press('a'));
                }
            })
        };

        let reader = {
            let acc = Arc::clone(&acc);
            thread::spawn(move || {
                let mut seen = 0usize;
                while seen < 50_000 {
                    let s = acc.snapshot();
                    // `w` always lands before its paired `a`.
                    let lead = s.speed - s.steering_angle;
                    assert!(lead == 0.0 || lead == 1.0, "torn snapshot: {s:?}");
                    seen += 1;
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(acc.snapshot(), ControlState::new(PAIRS as f64, PAIRS as f64));
    }

    #[test]
    fn blocked_listener_does_not_block_snapshots() -> Result<(), Box<dyn std::error::Error>> {
        let acc = Arc::new(InputStateAccumulator::default());
        let (tx, source) = ChannelKeySource::pair();
        let handle = acc.start(source)?;

        thread::sleep(Duration::from_millis(20));
        assert_eq!(acc.snapshot(), ControlState::default());

        tx.send(KeyEvent::down(Key::Escape))?;
        handle.join().map_err(|_| "listener panicked")??;
        Ok(())
    }
}
