//! Lossy amplitude reporting from the processing loop to an observer.
//!
//! The loop publishes the normalized peak of each raw chunk into an atomic
//! cell and fires a non-blocking notification. The observer thread wakes
//! per notification and reads the cell, so a slow observer only misses
//! intermediate values; the latest one always wins.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use atomic_float::AtomicF32;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Worker-side handle: publish and forget.
#[derive(Clone)]
pub(crate) struct AmplitudeTap {
    latest: Arc<AtomicF32>,
    notify: Sender<()>,
}

impl AmplitudeTap {
    pub(crate) fn publish(&self, amplitude: f32) {
        self.latest.store(amplitude, Ordering::Relaxed);
        // A full notification slot means the observer is already behind;
        // it will pick up the newest value when it wakes.
        let _ = self.notify.try_send(());
    }
}

pub struct AmplitudeMonitor {
    latest: Arc<AtomicF32>,
    notify_tx: Option<Sender<()>>,
    notify_rx: Option<Receiver<()>>,
    observer: Option<JoinHandle<()>>,
}

impl AmplitudeMonitor {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            latest: Arc::new(AtomicF32::new(0.0)),
            notify_tx: Some(tx),
            notify_rx: Some(rx),
            observer: None,
        }
    }

    /// Latest normalized peak amplitude, in [0, 1].
    pub fn value(&self) -> f32 {
        self.latest.load(Ordering::Relaxed)
    }

    pub(crate) fn tap(&self) -> Option<AmplitudeTap> {
        self.notify_tx.as_ref().map(|tx| AmplitudeTap {
            latest: self.latest.clone(),
            notify: tx.clone(),
        })
    }

    /// Attach the observer callback. At most one; subsequent calls replace
    /// nothing and are ignored.
    pub(crate) fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(f32) + Send + 'static,
    {
        let Some(rx) = self.notify_rx.take() else {
            log::warn!("amplitude observer already attached, ignoring");
            return;
        };
        let latest = self.latest.clone();
        let spawned = std::thread::Builder::new()
            .name("voicebox-amplitude".into())
            .spawn(move || {
                while rx.recv().is_ok() {
                    callback(latest.load(Ordering::Relaxed));
                }
            });
        match spawned {
            Ok(handle) => self.observer = Some(handle),
            Err(e) => log::error!("could not spawn amplitude observer: {e}"),
        }
    }

    /// Disconnect and join the observer thread. Requires every tap to be
    /// dropped first or the channel stays open.
    pub(crate) fn shutdown(&mut self) {
        self.notify_tx = None;
        self.notify_rx = None;
        if let Some(handle) = self.observer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AmplitudeMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn observer_sees_published_value() {
        let (probe_tx, probe_rx) = crossbeam_channel::unbounded();
        let mut monitor = AmplitudeMonitor::new();
        let tap = monitor.tap().unwrap();
        monitor.subscribe(move |v| {
            let _ = probe_tx.send(v);
        });

        tap.publish(0.75);
        let got = probe_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!((got - 0.75).abs() < f32::EPSILON);
        assert_eq!(monitor.value(), 0.75);

        drop(tap);
        monitor.shutdown();
    }

    #[test]
    fn publish_never_blocks_without_observer() {
        let monitor = AmplitudeMonitor::new();
        let tap = monitor.tap().unwrap();
        for i in 0..1000 {
            tap.publish(i as f32 / 1000.0);
        }
        assert!((monitor.value() - 0.999).abs() < 1e-6);
    }
}
