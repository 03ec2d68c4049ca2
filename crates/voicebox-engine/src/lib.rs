//! Real-time voice changer engine: capture -> effect -> render.
//!
//! One worker thread per engine runs the processing loop; the blocking
//! device read and write are its only pacing. Lifecycle and effect swaps
//! arrive from the control side, the swap itself travels over a command
//! channel so a chunk is only ever processed by exactly one effect.

pub mod devices;
pub mod dsp;
pub mod error;
pub mod monitor;
pub mod presets;
mod ring;

pub use devices::{AudioBackend, AudioSink, AudioSource, CpalBackend};
pub use dsp::VoiceEffect;
pub use error::{DeviceError, EngineError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use parking_lot::Mutex;

use crate::monitor::{AmplitudeMonitor, AmplitudeTap};

/// Device routing flavor. Local monitors through the default media path;
/// Communication requests the low-latency voice-call path. The DSP is
/// identical in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Local,
    Communication,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Nominal samples per processed chunk.
    pub chunk_size: usize,
    pub mode: Mode,
    pub input_name: Option<String>, // match by substring (case-insensitive)
    pub output_name: Option<String>,
    pub input_index: Option<usize>, // explicit index from device list
    pub output_index: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_size: 2048,
            mode: Mode::Local,
            input_name: None,
            output_name: None,
            input_index: None,
            output_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

enum Command {
    SetEffect(Option<Box<dyn VoiceEffect>>),
}

/// Consecutive empty/failed reads tolerated before the loop gives up.
/// Each empty read already waited out the source's own timeout, so this
/// bounds a dead capture device to roughly a dozen seconds, not forever.
const MAX_STALLED_READS: u32 = 50;

pub struct Engine<B: AudioBackend = CpalBackend> {
    cfg: EngineConfig,
    state: Arc<Mutex<EngineState>>,
    running: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<EngineError>>>,
    monitor: Mutex<AmplitudeMonitor>,
    control: Mutex<Control<B>>,
}

/// Control-plane fields, serialized under one lock so start/stop/release
/// and effect swaps from different threads cannot interleave.
struct Control<B> {
    backend: B,
    worker: Option<JoinHandle<Option<Box<dyn VoiceEffect>>>>,
    cmd_tx: Option<Sender<Command>>,
    /// Effect held while no worker is running; handed over on start.
    parked_effect: Option<Box<dyn VoiceEffect>>,
    released: bool,
}

impl Engine<CpalBackend> {
    pub fn new(cfg: EngineConfig) -> Self {
        Self::with_backend(cfg, CpalBackend::new())
    }
}

impl<B: AudioBackend> Engine<B> {
    pub fn with_backend(cfg: EngineConfig, backend: B) -> Self {
        Self {
            cfg,
            state: Arc::new(Mutex::new(EngineState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
            monitor: Mutex::new(AmplitudeMonitor::new()),
            control: Mutex::new(Control {
                backend,
                worker: None,
                cmd_tx: None,
                parked_effect: None,
                released: false,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// The error that made the last `start()` fail or the loop abort.
    pub fn last_error(&self) -> Option<EngineError> {
        self.last_error.lock().clone()
    }

    /// Latest normalized peak amplitude, in [0, 1].
    pub fn amplitude(&self) -> f32 {
        self.monitor.lock().value()
    }

    /// Register the amplitude observer. Delivery is lossy: a slow callback
    /// only ever sees the most recent value.
    pub fn on_amplitude<F>(&self, callback: F)
    where
        F: Fn(f32) + Send + 'static,
    {
        self.monitor.lock().subscribe(callback);
    }

    /// Acquire devices and start the processing loop. Returns false when
    /// capture permission or a device is unavailable, with everything
    /// already acquired rolled back. Idempotent once Running.
    pub fn start(&self) -> bool {
        let mut ctl = self.control.lock();
        if ctl.released {
            *self.last_error.lock() = Some(EngineError::Released);
            log::warn!("start() called on a released engine");
            return false;
        }
        self.reap_finished_worker(&mut ctl);
        {
            let mut st = self.state.lock();
            if *st != EngineState::Stopped {
                return true;
            }
            *st = EngineState::Starting;
        }

        match self.spawn_worker(&mut ctl) {
            Ok(()) => {
                *self.state.lock() = EngineState::Running;
                log::info!("engine running ({:?} mode)", self.cfg.mode);
                true
            }
            Err(e) => {
                ctl.backend.close();
                self.running.store(false, Ordering::SeqCst);
                *self.state.lock() = EngineState::Stopped;
                log::error!("engine start failed: {e}");
                *self.last_error.lock() = Some(e);
                false
            }
        }
    }

    fn spawn_worker(&self, ctl: &mut Control<B>) -> Result<(), EngineError> {
        let (source, sink) = ctl.backend.open(&self.cfg)?;
        let (tx, rx) = unbounded();
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            source,
            sink,
            effect: ctl.parked_effect.take(),
            commands: rx,
            running: self.running.clone(),
            state: self.state.clone(),
            last_error: self.last_error.clone(),
            tap: self.monitor.lock().tap(),
            sample_rate: self.cfg.sample_rate,
            chunk_size: self.cfg.chunk_size,
        };
        let handle = std::thread::Builder::new()
            .name("voicebox-audio".into())
            .spawn(move || worker.run())
            .map_err(|e| DeviceError::Init(format!("could not spawn audio worker: {e}")))?;

        ctl.cmd_tx = Some(tx);
        ctl.worker = Some(handle);
        Ok(())
    }

    /// Stop the loop and release the devices. Safe to call at any time,
    /// from any state, as often as you like. The in-flight chunk always
    /// finishes; only the next iteration is prevented.
    pub fn stop(&self) {
        let mut ctl = self.control.lock();
        self.stop_locked(&mut ctl);
    }

    fn stop_locked(&self, ctl: &mut Control<B>) {
        {
            let mut st = self.state.lock();
            if *st == EngineState::Stopped && ctl.worker.is_none() {
                return;
            }
            *st = EngineState::Stopping;
        }
        self.running.store(false, Ordering::SeqCst);
        ctl.cmd_tx = None;
        if let Some(handle) = ctl.worker.take() {
            match handle.join() {
                // Parked effects start the next session from a clean state.
                Ok(mut effect) => {
                    if let Some(fx) = effect.as_mut() {
                        fx.reset();
                    }
                    ctl.parked_effect = effect;
                }
                Err(_) => log::error!("audio worker panicked"),
            }
        }
        ctl.backend.close();
        *self.state.lock() = EngineState::Stopped;
        log::info!("engine stopped");
    }

    /// A loop that aborted on its own (stall, dead output) leaves a finished
    /// worker behind; collect it so the effect and devices are recovered.
    fn reap_finished_worker(&self, ctl: &mut Control<B>) {
        if ctl.worker.is_some() && *self.state.lock() == EngineState::Stopped {
            ctl.cmd_tx = None;
            if let Some(handle) = ctl.worker.take() {
                match handle.join() {
                    Ok(mut effect) => {
                        if let Some(fx) = effect.as_mut() {
                            fx.reset();
                        }
                        ctl.parked_effect = effect;
                    }
                    Err(_) => log::error!("audio worker panicked"),
                }
            }
            ctl.backend.close();
        }
    }

    /// Install `effect` (or pass-through for `None`). The outgoing effect is
    /// reset. While Running the swap is handed to the worker atomically; no
    /// chunk ever sees two effects.
    pub fn set_effect(&self, effect: Option<Box<dyn VoiceEffect>>) {
        let mut ctl = self.control.lock();
        if ctl.released {
            return;
        }
        let effect = match &ctl.cmd_tx {
            Some(tx) => match tx.send(Command::SetEffect(effect)) {
                Ok(()) => return,
                // Worker already gone; fall back to parking it.
                Err(SendError(Command::SetEffect(effect))) => effect,
            },
            None => effect,
        };
        if let Some(mut old) = ctl.parked_effect.take() {
            old.reset();
        }
        ctl.parked_effect = effect;
    }

    /// Terminal teardown. Stops, releases devices, and drops the worker
    /// context; the engine cannot be started again.
    pub fn release(&self) {
        let mut ctl = self.control.lock();
        if ctl.released {
            return;
        }
        self.stop_locked(&mut ctl);
        ctl.parked_effect = None;
        ctl.released = true;
        drop(ctl);
        self.monitor.lock().shutdown();
        log::info!("engine released");
    }
}

impl<B: AudioBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.release();
    }
}

/* ---------- processing loop ---------- */

struct Worker<S, K> {
    source: S,
    sink: K,
    effect: Option<Box<dyn VoiceEffect>>,
    commands: Receiver<Command>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<EngineState>>,
    last_error: Arc<Mutex<Option<EngineError>>>,
    tap: Option<AmplitudeTap>,
    sample_rate: u32,
    chunk_size: usize,
}

impl<S: AudioSource, K: AudioSink> Worker<S, K> {
    /// Returns the installed effect so the engine can re-use it after a
    /// stop/start cycle.
    fn run(mut self) -> Option<Box<dyn VoiceEffect>> {
        let mut buf = vec![0i16; self.chunk_size];
        let mut stalled: u32 = 0;

        while self.running.load(Ordering::SeqCst) {
            self.drain_commands();

            let n = match self.source.read(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("device read failed: {e}");
                    0
                }
            };
            if n == 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_READS {
                    self.abort(DeviceError::Stalled(stalled));
                    break;
                }
                continue;
            }
            stalled = 0;

            let chunk = &buf[..n];
            if let Some(tap) = &self.tap {
                let peak = chunk
                    .iter()
                    .map(|&s| (s as i32).unsigned_abs())
                    .max()
                    .unwrap_or(0);
                tap.publish((peak as f32 / i16::MAX as f32).min(1.0));
            }

            let written = match self.effect.as_mut() {
                Some(fx) => {
                    let out = fx.process(chunk, self.sample_rate);
                    self.sink.write(&out)
                }
                None => self.sink.write(chunk),
            };
            if let Err(e) = written {
                match e {
                    DeviceError::WriteTimeout => {
                        self.abort(e);
                        break;
                    }
                    other => log::warn!("device write failed: {other}"),
                }
            }
        }

        // A swap that raced the shutdown still wins; it must survive into
        // the parked slot.
        self.drain_commands();
        self.effect
    }

    fn drain_commands(&mut self) {
        while let Ok(Command::SetEffect(next)) = self.commands.try_recv() {
            if let Some(mut old) = self.effect.take() {
                old.reset();
            }
            log::debug!(
                "effect -> {}",
                next.as_ref().map(|e| e.name()).unwrap_or("pass-through")
            );
            self.effect = next;
        }
    }

    fn abort(&self, err: DeviceError) {
        log::error!("audio loop aborting: {err}");
        *self.last_error.lock() = Some(EngineError::Device(err));
        self.running.store(false, Ordering::SeqCst);
        *self.state.lock() = EngineState::Stopped;
    }
}
