//! Audio device enumeration, microphone capture, and speaker playback
//!
//! Built on cpal for cross-platform audio I/O. Call audio is 16-bit
//! mono PCM at 16 kHz, so samples stay i16 end to end; devices that
//! only open in another format or in stereo are converted at the
//! callback boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, Sample, SampleFormat, Stream, StreamConfig};

use lancall_common::frame::{SAMPLE_RATE, SAMPLES_PER_FRAME};

/// System default device display name
pub const SYSTEM_DEFAULT_DEVICE_NAME: &str = "System Default";

/// Maximum capture buffer size in frames (prevents unbounded growth if sending stalls)
const MAX_CAPTURE_BUFFER_FRAMES: usize = 10;

/// Maximum playback buffer size in frames (prevents latency buildup)
const MAX_PLAYBACK_BUFFER_FRAMES: usize = 20;

/// An audio device entry (input or output)
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Device name for display
    pub name: String,
    /// Whether this represents the system default device
    pub is_default: bool,
}

impl AudioDevice {
    pub fn new(name: String, is_default: bool) -> Self {
        Self { name, is_default }
    }

    pub fn system_default() -> Self {
        Self {
            name: SYSTEM_DEFAULT_DEVICE_NAME.to_string(),
            is_default: true,
        }
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl PartialEq for AudioDevice {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AudioDevice {}

fn get_host() -> Host {
    cpal::default_host()
}

/// List available audio input devices, "System Default" first
pub fn list_input_devices() -> Vec<AudioDevice> {
    let mut devices = vec![AudioDevice::system_default()];
    let host = get_host();

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(desc) = device.description() {
                let name = desc.name().to_string();
                if !devices.iter().any(|d| d.name == name) {
                    devices.push(AudioDevice::new(name, false));
                }
            }
        }
    }

    devices
}

/// List available audio output devices, "System Default" first
pub fn list_output_devices() -> Vec<AudioDevice> {
    let mut devices = vec![AudioDevice::system_default()];
    let host = get_host();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(desc) = device.description() {
                let name = desc.name().to_string();
                if !devices.iter().any(|d| d.name == name) {
                    devices.push(AudioDevice::new(name, false));
                }
            }
        }
    }

    devices
}

/// Find an input device by name, or return the default
fn find_input_device(name: &str) -> Option<Device> {
    let host = get_host();

    if name.is_empty() || name == SYSTEM_DEFAULT_DEVICE_NAME {
        return host.default_input_device();
    }

    host.input_devices()
        .ok()?
        .find(|d| d.description().is_ok_and(|desc| desc.name() == name))
        .or_else(|| host.default_input_device())
}

/// Find an output device by name, or return the default
fn find_output_device(name: &str) -> Option<Device> {
    let host = get_host();

    if name.is_empty() || name == SYSTEM_DEFAULT_DEVICE_NAME {
        return host.default_output_device();
    }

    host.output_devices()
        .ok()?
        .find(|d| d.description().is_ok_and(|desc| desc.name() == name))
        .or_else(|| host.default_output_device())
}

/// Pick channel count and sample format for a device at the call rate
///
/// Mono is preferred; stereo is accepted and converted in the
/// callbacks. Returns a descriptive error naming the rates the device
/// does support when 16 kHz is not among them.
fn select_config<I>(configs: I, direction: &str) -> Result<(u16, SampleFormat), String>
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange> + Clone,
{
    let supported_formats = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];
    let at_call_rate = |c: &cpal::SupportedStreamConfigRange| {
        c.min_sample_rate() <= SAMPLE_RATE
            && c.max_sample_rate() >= SAMPLE_RATE
            && supported_formats.contains(&c.sample_format())
    };

    if let Some(cfg) = configs.clone().find(|c| c.channels() == 1 && at_call_rate(c)) {
        return Ok((1, cfg.sample_format()));
    }
    if let Some(cfg) = configs.clone().find(|c| c.channels() == 2 && at_call_rate(c)) {
        return Ok((2, cfg.sample_format()));
    }

    let supported_rates: Vec<String> = configs
        .map(|c| {
            if c.min_sample_rate() == c.max_sample_rate() {
                format!("{}Hz", c.min_sample_rate())
            } else {
                format!("{}-{}Hz", c.min_sample_rate(), c.max_sample_rate())
            }
        })
        .collect();
    let rates_str = if supported_rates.is_empty() {
        "unknown".to_string()
    } else {
        supported_rates.join(", ")
    };
    Err(format!(
        "{} device doesn't support {}Hz (required for calls). Device supports: {}",
        direction, SAMPLE_RATE, rates_str
    ))
}

/// Audio capture from microphone
///
/// Captures 16 kHz mono i16 samples into a shared buffer the sender
/// drains one frame at a time.
pub struct AudioCapture {
    /// The cpal input stream
    _stream: Stream,
    /// Captured samples waiting to be framed
    buffer: Arc<Mutex<Vec<i16>>>,
    /// Flag indicating if capture is active
    active: Arc<AtomicBool>,
    /// Receiver for audio stream errors
    error_rx: std_mpsc::Receiver<String>,
}

impl AudioCapture {
    /// Open a capture stream on the named device ("" for default)
    pub fn new(device_name: &str) -> Result<Self, String> {
        let device =
            find_input_device(device_name).ok_or_else(|| "Input device not found".to_string())?;

        let buffer = Arc::new(Mutex::new(Vec::with_capacity(SAMPLES_PER_FRAME * 4)));
        let buffer_clone = buffer.clone();
        let active = Arc::new(AtomicBool::new(false));
        let active_clone = active.clone();
        let (error_tx, error_rx) = std_mpsc::channel();

        let configs = device
            .supported_input_configs()
            .map_err(|e| format!("Failed to get supported configs: {}", e))?
            .collect::<Vec<_>>();
        let (channels, sample_format) = select_config(configs.into_iter(), "Input")?;

        let config = StreamConfig {
            channels,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match (sample_format, channels) {
            (SampleFormat::I16, 1) => {
                build_input_stream_mono::<i16>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            (SampleFormat::F32, 1) => {
                build_input_stream_mono::<f32>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            (SampleFormat::U16, 1) => {
                build_input_stream_mono::<u16>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            (SampleFormat::I16, 2) => {
                build_input_stream_stereo::<i16>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            (SampleFormat::F32, 2) => {
                build_input_stream_stereo::<f32>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            (SampleFormat::U16, 2) => {
                build_input_stream_stereo::<u16>(&device, &config, buffer_clone, active_clone, error_tx)
            }
            _ => return Err(format!("Unsupported sample format: {:?}", sample_format)),
        }?;

        Ok(Self {
            _stream: stream,
            buffer,
            active,
            error_rx,
        })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<(), String> {
        self.active.store(true, Ordering::SeqCst);
        self._stream
            .play()
            .map_err(|e| format!("Failed to start capture: {}", e))
    }

    /// Stop capturing and drop any buffered samples
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Take one frame of samples, or None if not enough captured yet
    pub fn take_frame(&self) -> Option<Vec<i16>> {
        let mut buffer = self.buffer.lock().ok()?;
        if buffer.len() >= SAMPLES_PER_FRAME {
            Some(buffer.drain(..SAMPLES_PER_FRAME).collect())
        } else {
            None
        }
    }

    /// Check for audio stream errors (non-blocking)
    pub fn check_error(&self) -> Option<String> {
        self.error_rx.try_recv().ok()
    }
}

fn build_input_stream_mono<T>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<Vec<i16>>>,
    active: Arc<AtomicBool>,
    error_tx: std_mpsc::Sender<String>,
) -> Result<Stream, String>
where
    T: Sample + cpal::SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if active.load(Ordering::SeqCst)
                    && let Ok(mut buf) = buffer.lock()
                {
                    for sample in data {
                        buf.push(i16::from_sample(*sample));
                    }
                    let max_size = SAMPLES_PER_FRAME * MAX_CAPTURE_BUFFER_FRAMES;
                    if buf.len() > max_size {
                        let drain_count = buf.len() - max_size;
                        buf.drain(..drain_count);
                    }
                }
            },
            {
                let error_tx = error_tx.clone();
                move |err| {
                    let _ = error_tx.send(format!("Audio capture error: {}", err));
                }
            },
            None,
        )
        .map_err(|e| format!("Failed to build input stream: {}", e))
}

fn build_input_stream_stereo<T>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<Vec<i16>>>,
    active: Arc<AtomicBool>,
    error_tx: std_mpsc::Sender<String>,
) -> Result<Stream, String>
where
    T: Sample + cpal::SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if active.load(Ordering::SeqCst)
                    && let Ok(mut buf) = buffer.lock()
                {
                    // Downmix stereo to mono by averaging L+R channels
                    for chunk in data.chunks_exact(2) {
                        let left = i16::from_sample(chunk[0]) as i32;
                        let right = i16::from_sample(chunk[1]) as i32;
                        buf.push(((left + right) / 2) as i16);
                    }
                    let max_size = SAMPLES_PER_FRAME * MAX_CAPTURE_BUFFER_FRAMES;
                    if buf.len() > max_size {
                        let drain_count = buf.len() - max_size;
                        buf.drain(..drain_count);
                    }
                }
            },
            {
                let error_tx = error_tx.clone();
                move |err| {
                    let _ = error_tx.send(format!("Audio capture error: {}", err));
                }
            },
            None,
        )
        .map_err(|e| format!("Failed to build stereo input stream: {}", e))
}

/// Speaker playback for the single remote stream
///
/// Queued samples play in order; the callback outputs silence when the
/// queue runs dry, so network hiccups produce gaps rather than stale
/// audio.
pub struct AudioPlayback {
    /// The cpal output stream
    _stream: Stream,
    /// Samples queued for playback
    queue: Arc<Mutex<Vec<i16>>>,
    /// Flag indicating if playback is active
    active: Arc<AtomicBool>,
    /// Receiver for audio stream errors
    error_rx: std_mpsc::Receiver<String>,
}

impl AudioPlayback {
    /// Open a playback stream on the named device ("" for default)
    pub fn new(device_name: &str) -> Result<Self, String> {
        let device =
            find_output_device(device_name).ok_or_else(|| "Output device not found".to_string())?;

        let queue = Arc::new(Mutex::new(Vec::with_capacity(
            SAMPLES_PER_FRAME * MAX_PLAYBACK_BUFFER_FRAMES,
        )));
        let queue_clone = queue.clone();
        let active = Arc::new(AtomicBool::new(false));
        let active_clone = active.clone();
        let (error_tx, error_rx) = std_mpsc::channel();

        let configs = device
            .supported_output_configs()
            .map_err(|e| format!("Failed to get supported configs: {}", e))?
            .collect::<Vec<_>>();
        let (channels, sample_format) = select_config(configs.into_iter(), "Output")?;

        let config = StreamConfig {
            channels,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match (sample_format, channels) {
            (SampleFormat::I16, 1) => {
                build_output_stream_mono::<i16>(&device, &config, queue_clone, active_clone, error_tx)
            }
            (SampleFormat::F32, 1) => {
                build_output_stream_mono::<f32>(&device, &config, queue_clone, active_clone, error_tx)
            }
            (SampleFormat::U16, 1) => {
                build_output_stream_mono::<u16>(&device, &config, queue_clone, active_clone, error_tx)
            }
            (SampleFormat::I16, 2) => {
                build_output_stream_stereo::<i16>(&device, &config, queue_clone, active_clone, error_tx)
            }
            (SampleFormat::F32, 2) => {
                build_output_stream_stereo::<f32>(&device, &config, queue_clone, active_clone, error_tx)
            }
            (SampleFormat::U16, 2) => {
                build_output_stream_stereo::<u16>(&device, &config, queue_clone, active_clone, error_tx)
            }
            _ => return Err(format!("Unsupported sample format: {:?}", sample_format)),
        }?;

        Ok(Self {
            _stream: stream,
            queue,
            active,
            error_rx,
        })
    }

    /// Start playback
    pub fn start(&self) -> Result<(), String> {
        self.active.store(true, Ordering::SeqCst);
        self._stream
            .play()
            .map_err(|e| format!("Failed to start playback: {}", e))
    }

    /// Stop playback and drop queued samples
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        let _ = self._stream.pause();
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }

    /// Queue samples for playback, dropping the oldest on overflow
    pub fn queue_samples(&self, samples: &[i16]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend_from_slice(samples);
            let max_size = SAMPLES_PER_FRAME * MAX_PLAYBACK_BUFFER_FRAMES;
            if queue.len() > max_size {
                let drain_count = queue.len() - max_size;
                queue.drain(..drain_count);
            }
        }
    }

    /// Check for audio stream errors (non-blocking)
    pub fn check_error(&self) -> Option<String> {
        self.error_rx.try_recv().ok()
    }
}

fn build_output_stream_mono<T>(
    device: &Device,
    config: &StreamConfig,
    queue: Arc<Mutex<Vec<i16>>>,
    active: Arc<AtomicBool>,
    error_tx: std_mpsc::Sender<String>,
) -> Result<Stream, String>
where
    T: Sample + cpal::SizedSample + FromSample<i16>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if active.load(Ordering::SeqCst)
                    && let Ok(mut queue) = queue.lock()
                {
                    let available = queue.len().min(data.len());
                    for (dst, src) in data.iter_mut().zip(queue.iter()) {
                        *dst = T::from_sample(*src);
                    }
                    // Underrun fills the rest with silence
                    for dst in data.iter_mut().skip(available) {
                        *dst = T::from_sample(0i16);
                    }
                    queue.drain(..available);
                } else {
                    for dst in data.iter_mut() {
                        *dst = T::from_sample(0i16);
                    }
                }
            },
            {
                let error_tx = error_tx.clone();
                move |err| {
                    let _ = error_tx.send(format!("Audio playback error: {}", err));
                }
            },
            None,
        )
        .map_err(|e| format!("Failed to build output stream: {}", e))
}

fn build_output_stream_stereo<T>(
    device: &Device,
    config: &StreamConfig,
    queue: Arc<Mutex<Vec<i16>>>,
    active: Arc<AtomicBool>,
    error_tx: std_mpsc::Sender<String>,
) -> Result<Stream, String>
where
    T: Sample + cpal::SizedSample + FromSample<i16>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if active.load(Ordering::SeqCst)
                    && let Ok(mut queue) = queue.lock()
                {
                    let samples_needed = data.len() / 2;
                    let available = queue.len().min(samples_needed);
                    // Upmix mono to stereo by duplicating each sample
                    for (chunk, src) in data.chunks_exact_mut(2).zip(queue.iter()) {
                        let sample = T::from_sample(*src);
                        chunk[0] = sample;
                        chunk[1] = sample;
                    }
                    for chunk in data.chunks_exact_mut(2).skip(available) {
                        let silence = T::from_sample(0i16);
                        chunk[0] = silence;
                        chunk[1] = silence;
                    }
                    queue.drain(..available);
                } else {
                    for dst in data.iter_mut() {
                        *dst = T::from_sample(0i16);
                    }
                }
            },
            {
                let error_tx = error_tx.clone();
                move |err| {
                    let _ = error_tx.send(format!("Audio playback error: {}", err));
                }
            },
            None,
        )
        .map_err(|e| format!("Failed to build stereo output stream: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_device_system_default() {
        let device = AudioDevice::system_default();
        assert_eq!(device.name, SYSTEM_DEFAULT_DEVICE_NAME);
        assert!(device.is_default);
    }

    #[test]
    fn test_audio_device_equality_is_by_name() {
        let device1 = AudioDevice::new("Test".to_string(), false);
        let device2 = AudioDevice::new("Test".to_string(), true);
        let device3 = AudioDevice::new("Other".to_string(), false);

        assert_eq!(device1, device2);
        assert_ne!(device1, device3);
    }

    #[test]
    fn test_list_input_devices_includes_default() {
        let devices = list_input_devices();
        assert!(!devices.is_empty());
        assert!(devices[0].is_default);
        assert_eq!(devices[0].name, SYSTEM_DEFAULT_DEVICE_NAME);
    }

    #[test]
    fn test_list_output_devices_includes_default() {
        let devices = list_output_devices();
        assert!(!devices.is_empty());
        assert!(devices[0].is_default);
        assert_eq!(devices[0].name, SYSTEM_DEFAULT_DEVICE_NAME);
    }
}
