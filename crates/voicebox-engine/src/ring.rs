//! Bounded PCM ring shared between the real-time device callbacks and the
//! processing worker.
//!
//! The device side never blocks: a full capture ring overwrites its oldest
//! samples, an empty render ring leaves the callback to emit silence. The
//! worker side blocks, which is what paces the processing loop to real time.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct RingInner {
    buf: Box<[i16]>,
    mask: usize,
    write: usize,
    read: usize,
}

impl RingInner {
    fn len(&self) -> usize {
        self.write.wrapping_sub(self.read)
    }

    fn free(&self) -> usize {
        self.buf.len() - self.len()
    }

    fn push(&mut self, data: &[i16]) {
        for &v in data {
            self.buf[self.write & self.mask] = v;
            self.write = self.write.wrapping_add(1);
        }
    }

    fn pop(&mut self, out: &mut [i16]) {
        for o in out.iter_mut() {
            *o = self.buf[self.read & self.mask];
            self.read = self.read.wrapping_add(1);
        }
    }
}

pub struct PcmRing {
    inner: Mutex<RingInner>,
    readable: Condvar,
    writable: Condvar,
}

fn next_pow2(mut x: usize) -> usize {
    if x <= 1 {
        return 1;
    }
    x -= 1;
    x |= x >> 1;
    x |= x >> 2;
    x |= x >> 4;
    x |= x >> 8;
    x |= x >> 16;
    #[cfg(target_pointer_width = "64")]
    {
        x |= x >> 32;
    }
    x + 1
}

impl PcmRing {
    pub fn with_capacity(cap: usize) -> Self {
        let cap_pow2 = next_pow2(cap.max(2));
        Self {
            inner: Mutex::new(RingInner {
                buf: vec![0i16; cap_pow2].into_boxed_slice(),
                mask: cap_pow2 - 1,
                write: 0,
                read: 0,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().buf.len()
    }

    /// Device capture side: never blocks. If the worker has fallen behind,
    /// the oldest samples are dropped to make room for the new ones.
    pub fn push_lossy(&self, data: &[i16]) {
        let mut inner = self.inner.lock();
        if data.len() >= inner.buf.len() {
            // Chunk larger than the whole ring: keep only the tail.
            let tail = &data[data.len() - inner.buf.len()..];
            inner.read = inner.write;
            inner.push(tail);
        } else {
            let short = data.len().saturating_sub(inner.free());
            inner.read = inner.read.wrapping_add(short);
            inner.push(data);
        }
        drop(inner);
        self.readable.notify_one();
    }

    /// Device render side: never blocks. Returns false when a full `out`
    /// cannot be served, leaving `out` untouched (the callback fills silence).
    pub fn try_pop(&self, out: &mut [i16]) -> bool {
        let mut inner = self.inner.lock();
        if inner.len() < out.len() {
            return false;
        }
        inner.pop(out);
        drop(inner);
        self.writable.notify_one();
        true
    }

    /// Worker side: block until a full `out` worth of samples is available
    /// or `timeout` elapses. On timeout whatever is buffered is returned,
    /// which may be zero samples.
    pub fn pop_blocking(&self, out: &mut [i16], timeout: Duration) -> usize {
        let mut inner = self.inner.lock();
        if inner.len() < out.len() {
            // On timeout we fall through and hand back whatever is buffered.
            let _ = self
                .readable
                .wait_while_for(&mut inner, |inner| inner.len() < out.len(), timeout);
        }
        let n = inner.len().min(out.len());
        inner.pop(&mut out[..n]);
        drop(inner);
        if n > 0 {
            self.writable.notify_one();
        }
        n
    }

    /// Worker side: block until all of `data` has been accepted. Writes in
    /// segments as the device drains; a single wait exceeding `timeout`
    /// means the render side has stopped consuming.
    pub fn push_blocking(&self, data: &[i16], timeout: Duration) -> bool {
        let mut remaining = data;
        let mut inner = self.inner.lock();
        while !remaining.is_empty() {
            if inner.free() == 0 {
                let timed_out = self
                    .writable
                    .wait_while_for(&mut inner, |inner| inner.free() == 0, timeout)
                    .timed_out();
                if timed_out {
                    return false;
                }
            }
            let n = inner.free().min(remaining.len());
            inner.push(&remaining[..n]);
            remaining = &remaining[n..];
            self.readable.notify_one();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_what_was_pushed() {
        let ring = PcmRing::with_capacity(8);
        ring.push_lossy(&[1, 2, 3, 4]);
        let mut out = [0i16; 4];
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn try_pop_fails_when_short() {
        let ring = PcmRing::with_capacity(8);
        ring.push_lossy(&[1, 2]);
        let mut out = [0i16; 4];
        assert!(!ring.try_pop(&mut out));
    }

    #[test]
    fn lossy_push_drops_oldest() {
        let ring = PcmRing::with_capacity(4);
        assert_eq!(ring.capacity(), 4);
        ring.push_lossy(&[1, 2, 3, 4]);
        ring.push_lossy(&[5, 6]);
        let mut out = [0i16; 4];
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn pop_blocking_times_out_empty() {
        let ring = PcmRing::with_capacity(8);
        let mut out = [0i16; 4];
        let n = ring.pop_blocking(&mut out, Duration::from_millis(10));
        assert_eq!(n, 0);
    }

    #[test]
    fn pop_blocking_returns_partial_on_timeout() {
        let ring = PcmRing::with_capacity(8);
        ring.push_lossy(&[7, 8]);
        let mut out = [0i16; 4];
        let n = ring.pop_blocking(&mut out, Duration::from_millis(10));
        assert_eq!(n, 2);
        assert_eq!(&out[..2], &[7, 8]);
    }

    #[test]
    fn push_blocking_wakes_on_drain() {
        use std::sync::Arc;

        let ring = Arc::new(PcmRing::with_capacity(4));
        ring.push_lossy(&[0; 4]);

        let drainer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                let mut out = [0i16; 4];
                assert!(ring.try_pop(&mut out));
            })
        };

        assert!(ring.push_blocking(&[1, 2, 3, 4], Duration::from_secs(1)));
        drainer.join().unwrap();

        let mut out = [0i16; 4];
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, [1, 2, 3, 4]);
    }
}
