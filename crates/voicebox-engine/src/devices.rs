//! Capture/render endpoints. Thin I/O only; no DSP happens here.
//!
//! cpal drives both directions from its own callback threads, so the
//! blocking `AudioSource`/`AudioSink` contract the processing loop needs is
//! bridged through a pair of [`PcmRing`]s: callbacks stay lock-light and
//! lossy, the worker side blocks and is thereby paced by the device clock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::DeviceError;
use crate::ring::PcmRing;
use crate::{EngineConfig, Mode};

/// How long a worker read may wait before it is reported as an empty read.
const READ_TIMEOUT: Duration = Duration::from_millis(250);
/// A render ring that stays full this long means the output device died.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Blocking capture endpoint. `read` returns the number of samples written
/// into `buf`; zero is a skippable timeout, not an error.
pub trait AudioSource: Send {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, DeviceError>;
}

/// Blocking render endpoint.
pub trait AudioSink: Send {
    fn write(&mut self, samples: &[i16]) -> Result<(), DeviceError>;
}

/// Opens and closes the device pair for an engine. The cpal implementation
/// keeps the streams on the control thread (cpal streams are not `Send`)
/// and hands the worker ring-backed handles.
pub trait AudioBackend {
    type Source: AudioSource + 'static;
    type Sink: AudioSink + 'static;

    fn open(&mut self, cfg: &EngineConfig) -> Result<(Self::Source, Self::Sink), DeviceError>;
    fn close(&mut self);
}

/* ---------- device listing (CLI support) ---------- */

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub has_input: bool,
    pub has_output: bool,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();

    let default_in = host.default_input_device().map(|d| d.name().unwrap_or_default());
    let default_out = host.default_output_device().map(|d| d.name().unwrap_or_default());

    let mut out = Vec::new();
    if let Ok(devices) = host.devices() {
        for dev in devices {
            let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
            out.push(DeviceInfo {
                has_input: dev.supported_input_configs().is_ok(),
                has_output: dev.supported_output_configs().is_ok(),
                is_default_input: default_in.as_deref() == Some(name.as_str()),
                is_default_output: default_out.as_deref() == Some(name.as_str()),
                name,
            });
        }
    }
    Ok(out)
}

pub fn print_devices() -> Result<()> {
    let list = list_devices()?;
    if list.is_empty() {
        println!("(no devices found)");
        return Ok(());
    }
    for (i, d) in list.iter().enumerate() {
        let mut marks = String::new();
        if d.is_default_input {
            marks.push_str("*I");
        }
        if d.is_default_output {
            if !marks.is_empty() {
                marks.push(' ');
            }
            marks.push_str("*O");
        }
        if !marks.is_empty() {
            print!("[{marks}] ");
        }
        println!("{:>2}  {}", i, d.name);
    }
    Ok(())
}

/* ---------- device picking (by index, name substring, or default) ---------- */

fn pick_device(
    host: &cpal::Host,
    want_input: bool,
    name_substr: Option<&str>,
    index: Option<usize>,
) -> Result<Option<cpal::Device>, DeviceError> {
    let capable = |dev: &cpal::Device| {
        if want_input {
            dev.supported_input_configs().is_ok()
        } else {
            dev.supported_output_configs().is_ok()
        }
    };
    let devices =
        |host: &cpal::Host| host.devices().map_err(|e| DeviceError::Init(e.to_string()));

    if let Some(idx) = index {
        let mut i = 0usize;
        for dev in devices(host)? {
            if capable(&dev) {
                if i == idx {
                    return Ok(Some(dev));
                }
                i += 1;
            }
        }
        // Index out of range falls through to name/default.
    }

    if let Some(q) = name_substr {
        let qn = q.to_lowercase();
        for dev in devices(host)? {
            let name = dev.name().unwrap_or_default();
            if name.to_lowercase().contains(&qn) && capable(&dev) {
                return Ok(Some(dev));
            }
        }
    }

    Ok(if want_input {
        host.default_input_device()
    } else {
        host.default_output_device()
    })
}

/* ---------- cpal-backed endpoints ---------- */

pub struct CpalSource {
    ring: Arc<PcmRing>,
}

impl AudioSource for CpalSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, DeviceError> {
        Ok(self.ring.pop_blocking(buf, READ_TIMEOUT))
    }
}

pub struct CpalSink {
    ring: Arc<PcmRing>,
}

impl AudioSink for CpalSink {
    fn write(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        if self.ring.push_blocking(samples, WRITE_TIMEOUT) {
            Ok(())
        } else {
            Err(DeviceError::WriteTimeout)
        }
    }
}

#[derive(Default)]
pub struct CpalBackend {
    input_stream: Option<cpal::Stream>,
    output_stream: Option<cpal::Stream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[inline]
fn f32_to_i16(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioBackend for CpalBackend {
    type Source = CpalSource;
    type Sink = CpalSink;

    fn open(&mut self, cfg: &EngineConfig) -> Result<(CpalSource, CpalSink), DeviceError> {
        let host = cpal::default_host();

        let in_dev = pick_device(&host, true, cfg.input_name.as_deref(), cfg.input_index)?
            .ok_or(DeviceError::NoInputDevice)?;
        let out_dev = pick_device(&host, false, cfg.output_name.as_deref(), cfg.output_index)?
            .ok_or(DeviceError::NoOutputDevice)?;

        let in_cfg_any = in_dev.default_input_config().map_err(|e| match e {
            // The usual shape of a denied microphone permission.
            cpal::DefaultStreamConfigError::DeviceNotAvailable => DeviceError::PermissionDenied,
            other => DeviceError::Init(other.to_string()),
        })?;
        let out_cfg_any = out_dev
            .default_output_config()
            .map_err(|e| DeviceError::Init(e.to_string()))?;

        let mut in_cfg = in_cfg_any.config();
        let mut out_cfg = out_cfg_any.config();
        in_cfg.sample_rate = cpal::SampleRate(cfg.sample_rate);
        out_cfg.sample_rate = cpal::SampleRate(cfg.sample_rate);

        // Communication mode asks for small fixed device buffers; the
        // voice-call path needs latency more than it needs resilience.
        let buffer_size = match cfg.mode {
            Mode::Communication => cpal::BufferSize::Fixed(cfg.chunk_size as u32),
            Mode::Local => cpal::BufferSize::Default,
        };
        in_cfg.buffer_size = buffer_size;
        out_cfg.buffer_size = buffer_size;

        log::info!(
            "opening devices ({:?} mode): in '{}' / out '{}' @ {} Hz",
            cfg.mode,
            in_dev.name().unwrap_or_default(),
            out_dev.name().unwrap_or_default(),
            cfg.sample_rate,
        );

        let capture_ring = Arc::new(PcmRing::with_capacity(cfg.chunk_size * 8));
        let render_ring = Arc::new(PcmRing::with_capacity(cfg.chunk_size * 8));

        let input_stream = build_input_stream(
            &in_dev,
            &in_cfg,
            in_cfg_any.sample_format(),
            capture_ring.clone(),
        )?;
        // An output failure from here on drops the input stream on the way
        // out; nothing partially acquired survives an error return.
        let output_stream = build_output_stream(
            &out_dev,
            &out_cfg,
            out_cfg_any.sample_format(),
            render_ring.clone(),
        )?;

        input_stream
            .play()
            .map_err(|e| DeviceError::Init(format!("failed to start capture: {e}")))?;
        output_stream
            .play()
            .map_err(|e| DeviceError::Init(format!("failed to start playback: {e}")))?;

        self.input_stream = Some(input_stream);
        self.output_stream = Some(output_stream);

        Ok((CpalSource { ring: capture_ring }, CpalSink { ring: render_ring }))
    }

    fn close(&mut self) {
        self.input_stream = None;
        self.output_stream = None;
    }
}

/// Downmixes interleaved device frames to mono i16 and feeds the capture
/// ring. Lossy: if the worker lags, the oldest samples are dropped.
fn build_input_stream(
    dev: &cpal::Device,
    config: &cpal::StreamConfig,
    format: cpal::SampleFormat,
    ring: Arc<PcmRing>,
) -> Result<cpal::Stream, DeviceError> {
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("input stream error: {err}");
    let mut scratch = Vec::<i16>::new();

    let map_err = |e: cpal::BuildStreamError| match e {
        cpal::BuildStreamError::DeviceNotAvailable => DeviceError::PermissionDenied,
        other => DeviceError::Init(other.to_string()),
    };

    let stream = match format {
        cpal::SampleFormat::F32 => dev
            .build_input_stream::<f32, _, _>(
                config,
                move |data, _| {
                    scratch.clear();
                    for frame in data.chunks_exact(channels) {
                        let sum: f32 = frame.iter().copied().sum();
                        scratch.push(f32_to_i16(sum / channels as f32));
                    }
                    ring.push_lossy(&scratch);
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        cpal::SampleFormat::I16 => dev
            .build_input_stream::<i16, _, _>(
                config,
                move |data, _| {
                    scratch.clear();
                    for frame in data.chunks_exact(channels) {
                        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                        scratch.push((sum / channels as i32) as i16);
                    }
                    ring.push_lossy(&scratch);
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        cpal::SampleFormat::U16 => dev
            .build_input_stream::<u16, _, _>(
                config,
                move |data, _| {
                    scratch.clear();
                    for frame in data.chunks_exact(channels) {
                        let sum: i32 = frame.iter().map(|&s| s as i32 - 32_768).sum();
                        scratch.push((sum / channels as i32) as i16);
                    }
                    ring.push_lossy(&scratch);
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        other => {
            return Err(DeviceError::Init(format!(
                "unsupported input format: {other:?}"
            )))
        }
    };
    Ok(stream)
}

/// Drains mono i16 from the render ring and fans it out across the device's
/// channels. Underruns render silence.
fn build_output_stream(
    dev: &cpal::Device,
    config: &cpal::StreamConfig,
    format: cpal::SampleFormat,
    ring: Arc<PcmRing>,
) -> Result<cpal::Stream, DeviceError> {
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("output stream error: {err}");
    let mut mono = Vec::<i16>::new();

    let map_err = |e: cpal::BuildStreamError| DeviceError::Init(e.to_string());

    let stream = match format {
        cpal::SampleFormat::F32 => dev
            .build_output_stream::<f32, _, _>(
                config,
                move |out, _| {
                    let frames = out.len() / channels;
                    mono.resize(frames, 0);
                    if ring.try_pop(&mut mono) {
                        for (frame, &m) in out.chunks_exact_mut(channels).zip(&mono) {
                            frame.fill(m as f32 / 32_768.0);
                        }
                    } else {
                        out.fill(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        cpal::SampleFormat::I16 => dev
            .build_output_stream::<i16, _, _>(
                config,
                move |out, _| {
                    let frames = out.len() / channels;
                    mono.resize(frames, 0);
                    if ring.try_pop(&mut mono) {
                        for (frame, &m) in out.chunks_exact_mut(channels).zip(&mono) {
                            frame.fill(m);
                        }
                    } else {
                        out.fill(0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        cpal::SampleFormat::U16 => dev
            .build_output_stream::<u16, _, _>(
                config,
                move |out, _| {
                    let frames = out.len() / channels;
                    mono.resize(frames, 0);
                    if ring.try_pop(&mut mono) {
                        for (frame, &m) in out.chunks_exact_mut(channels).zip(&mono) {
                            frame.fill((m as i32 + 32_768) as u16);
                        }
                    } else {
                        out.fill(32_768);
                    }
                },
                err_fn,
                None,
            )
            .map_err(map_err)?,
        other => {
            return Err(DeviceError::Init(format!(
                "unsupported output format: {other:?}"
            )))
        }
    };
    Ok(stream)
}
