// SPDX-License-Identifier: GPL-3.0-only

//! Live event listener
//!
//! One background thread per open device handle keeps the control model
//! synchronized with the device. Generic controls push change events, which
//! are decoded and written into the shared registry before the change
//! callback fires. The format controls never notify, so every tick that
//! times out without an event re-polls them; at most one reopen signal is
//! synthesized per tick (first in iteration order wins) because a single
//! reopen refreshes all of them anyway.
//!
//! Lifecycle: `Idle -> Listening <-> polling ticks -> Stopped`, where
//! `Stopped` is reached by [`ControlListener::stop`] or by the transport
//! dying; the latter is reported once through the error callback.

use crate::device::ControlIo;
use crate::registry::CameraCtrls;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controls::Control;

/// What the listener observed on the device
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// A control's value or enabled state changed; the registry cache is
    /// already updated.
    Changed(Control),
    /// A reopen-required control changed; the named control's cached value
    /// is updated and the caller must reopen the handle.
    ReopenRequired(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    Stopped,
}

const STATE_IDLE: u8 = 0;
const STATE_LISTENING: u8 = 1;
const STATE_STOPPED: u8 = 2;

pub struct ControlListener {
    thread: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl ControlListener {
    /// Start listening on an open handle. `on_event` receives every decoded
    /// change, `on_error` fires exactly once if the transport dies.
    pub fn start<E, F>(
        io: Arc<dyn ControlIo>,
        ctrls: Arc<Mutex<CameraCtrls>>,
        poll_timeout: Duration,
        on_event: E,
        on_error: F,
    ) -> Self
    where
        E: Fn(ControlEvent) + Send + 'static,
        F: Fn(String) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(STATE_IDLE));

        let stop_flag = Arc::clone(&stop);
        let state_flag = Arc::clone(&state);
        let device = io.path().to_string();

        info!(device = %device, "Starting control listener");
        let thread = std::thread::spawn(move || {
            run(io, ctrls, poll_timeout, on_event, on_error, stop_flag, &state_flag);
            state_flag.store(STATE_STOPPED, Ordering::SeqCst);
            debug!(device = %device, "Control listener stopped");
        });

        Self {
            thread: Some(thread),
            stop,
            state,
        }
    }

    pub fn state(&self) -> ListenerState {
        match self.state.load(Ordering::SeqCst) {
            STATE_IDLE => ListenerState::Idle,
            STATE_LISTENING => ListenerState::Listening,
            _ => ListenerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() != ListenerState::Stopped
    }

    /// Cooperative stop: the thread notices within one poll timeout.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && let Err(err) = thread.join()
        {
            warn!("Listener thread panicked: {:?}", err);
        }
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

fn run<E, F>(
    io: Arc<dyn ControlIo>,
    ctrls: Arc<Mutex<CameraCtrls>>,
    poll_timeout: Duration,
    on_event: E,
    on_error: F,
    stop: Arc<AtomicBool>,
    state: &AtomicU8,
) where
    E: Fn(ControlEvent),
    F: Fn(String),
{
    // Subscribe once per generic control; a driver refusing a subscription
    // only loses notifications for that control, the tick still polls.
    let cids = match ctrls.lock() {
        Ok(ctrls) => ctrls.event_cids(),
        Err(_) => return,
    };
    for cid in cids {
        if let Err(err) = io.subscribe_ctrl_events(cid) {
            debug!(cid, %err, "Control event subscription refused");
        }
    }
    state.store(STATE_LISTENING, Ordering::SeqCst);

    let timeout_ms = poll_timeout.as_millis() as i32;
    while !stop.load(Ordering::SeqCst) {
        match io.next_event(timeout_ms) {
            Ok(Some(change)) => {
                let Ok(mut ctrls) = ctrls.lock() else {
                    break;
                };
                let Some(ctrl) = ctrls.handle_event(&change) else {
                    debug!(cid = change.cid, "Event for unknown control");
                    continue;
                };
                drop(ctrls);
                if ctrl.requires_reopen {
                    on_event(ControlEvent::ReopenRequired(ctrl.id));
                } else {
                    on_event(ControlEvent::Changed(ctrl));
                }
            }
            Ok(None) => {
                // quiet tick: the notification-less controls get a poll
                let Ok(mut ctrls) = ctrls.lock() else {
                    break;
                };
                let changed = ctrls.poll_reopen();
                drop(ctrls);
                if let Some(id) = changed {
                    on_event(ControlEvent::ReopenRequired(id));
                }
            }
            Err(err) => {
                warn!(%err, "Listener transport failed");
                on_error(format!("device is gone: {}", err));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CtrlChange;
    use crate::testio::FakeIo;
    use crate::v4l2::*;
    use std::sync::mpsc;

    fn shared_registry(io: &Arc<FakeIo>) -> Arc<Mutex<CameraCtrls>> {
        Arc::new(Mutex::new(CameraCtrls::new(io.clone() as Arc<dyn ControlIo>)))
    }

    #[test]
    fn event_updates_cache_before_callback() {
        let io = Arc::new(
            FakeIo::new().with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 255, 1, 128, 128),
        );
        let ctrls = shared_registry(&io);
        let (tx, rx) = mpsc::channel();

        let mut listener = ControlListener::start(
            io.clone(),
            ctrls.clone(),
            Duration::from_millis(20),
            move |event| {
                let _ = tx.send(event);
            },
            |_| {},
        );

        // the listener subscribed to every generic control before listening
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while listener.state() == ListenerState::Idle && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(io.subscriptions().contains(&V4L2_CID_BRIGHTNESS));

        io.push_event(CtrlChange {
            cid: V4L2_CID_BRIGHTNESS,
            changes: V4L2_EVENT_CTRL_CH_VALUE,
            value: 42,
            inactive: false,
        });

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            ControlEvent::Changed(ctrl) => {
                assert_eq!(ctrl.id, "brightness");
                assert_eq!(
                    ctrl.value,
                    Some(crate::controls::ControlValue::Int(42))
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            ctrls.lock().unwrap().control("brightness").unwrap().value,
            Some(crate::controls::ControlValue::Int(42))
        );

        listener.stop();
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[test]
    fn quiet_tick_polls_format_and_signals_reopen_once() {
        let io = Arc::new(
            FakeIo::new()
                .with_formats(&[b"YUYV", b"MJPG"])
                .with_current_format(b"YUYV", 640, 480, 8),
        );
        let ctrls = shared_registry(&io);
        let (tx, rx) = mpsc::channel();

        let _listener = ControlListener::start(
            io.clone(),
            ctrls,
            Duration::from_millis(10),
            move |event| {
                let _ = tx.send(event);
            },
            |_| {},
        );

        // another process grabbed the device and switched the format
        io.set_device_format(b"MJPG", 640, 480, 8);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            ControlEvent::ReopenRequired(id) => assert_eq!(id, "pixelformat"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn dead_transport_reports_error_and_stops() {
        let io = Arc::new(FakeIo::new());
        let ctrls = shared_registry(&io);
        let (tx, rx) = mpsc::channel();

        let listener = ControlListener::start(
            io.clone(),
            ctrls,
            Duration::from_millis(10),
            |_| {},
            move |msg| {
                let _ = tx.send(msg);
            },
        );

        io.kill_events();
        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(msg.contains("gone"));

        // the thread winds down by itself after the error
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while listener.is_running() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(listener.state(), ListenerState::Stopped);
    }
}
