//! Upload validation, normalization and WAV/base64 conversion.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Peak level normalized audio is scaled to, in dBFS.
const NORMALIZE_HEADROOM_DB: f32 = -0.1;

/// Errors that can occur while validating or converting audio.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("File size ({size_mb:.2}MB) exceeds maximum allowed ({max_mb}MB)")]
    TooLarge { size_mb: f64, max_mb: u64 },

    #[error("Unsupported audio format: {ext}. Allowed: {allowed}")]
    UnsupportedFormat { ext: String, allowed: String },

    #[error(
        "Audio duration ({duration:.1}s) is too short. Minimum {min:.0} seconds required for voice cloning."
    )]
    TooShort { duration: f64, min: f64 },

    #[error("Audio duration ({duration:.1}s) is too long. Maximum {max:.0} seconds allowed.")]
    TooLong { duration: f64, max: f64 },

    #[error("Invalid audio file: {0}")]
    Decode(String),

    #[error("Failed to normalize audio: {0}")]
    Normalize(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid base64 audio: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits applied to uploaded voice samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioLimits {
    pub max_size_mb: u64,
    pub allowed_formats: Vec<String>,
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
}

impl Default for AudioLimits {
    fn default() -> Self {
        Self {
            max_size_mb: 50,
            allowed_formats: ["wav", "mp3", "flac", "ogg", "m4a"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            min_duration_seconds: 3.0,
            max_duration_seconds: 60.0,
        }
    }
}

/// Properties of a decoded audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Lowercase container extension, e.g. `wav`.
    pub format: String,
}

/// Interleaved PCM decoded from any supported container.
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    fn info(&self, format: &str) -> AudioInfo {
        AudioInfo {
            duration_seconds: self.duration_seconds(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: format.to_string(),
        }
    }
}

/// Lowercase extension of `filename` without the dot.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn decode(content: Vec<u8>, extension: &str) -> Result<DecodedAudio, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(content)), Default::default());

    let mut hint = Hint::new();
    if !extension.is_empty() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = %e, "Skipping undecodable packet");
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        }
    }

    if sample_rate == 0 || samples.is_empty() {
        return Err(AudioError::Decode("no audio samples decoded".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

/// Read an audio file and report its duration, rate and channel count.
pub fn get_audio_info(path: &Path) -> Result<AudioInfo, AudioError> {
    let extension = file_extension(&path.to_string_lossy());
    let content = std::fs::read(path)?;

    decode(content, &extension)
        .map(|decoded| decoded.info(&extension))
        .inspect_err(|e| error!(path = %path.display(), error = %e, "Failed to get audio info"))
}

/// Validate an uploaded voice sample.
///
/// Checks run cheapest first: size, then extension, then a full decode to
/// measure the duration. Nothing is written to disk.
pub fn validate_audio(
    content: &[u8],
    filename: &str,
    limits: &AudioLimits,
) -> Result<AudioInfo, AudioError> {
    let size_mb = content.len() as f64 / (1024.0 * 1024.0);
    if size_mb > limits.max_size_mb as f64 {
        return Err(AudioError::TooLarge {
            size_mb,
            max_mb: limits.max_size_mb,
        });
    }

    let extension = file_extension(filename);
    if !limits.allowed_formats.iter().any(|f| f == &extension) {
        return Err(AudioError::UnsupportedFormat {
            ext: extension,
            allowed: limits.allowed_formats.join(", "),
        });
    }

    let info = decode(content.to_vec(), &extension)
        .inspect_err(|e| warn!(filename, error = %e, "Audio validation failed"))?
        .info(&extension);

    if info.duration_seconds < limits.min_duration_seconds {
        return Err(AudioError::TooShort {
            duration: info.duration_seconds,
            min: limits.min_duration_seconds,
        });
    }

    if info.duration_seconds > limits.max_duration_seconds {
        return Err(AudioError::TooLong {
            duration: info.duration_seconds,
            max: limits.max_duration_seconds,
        });
    }

    Ok(info)
}

/// Average interleaved channels down to one.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio with windowed sinc interpolation.
///
/// Falls back to linear interpolation if the sinc resampler cannot be built.
pub fn resample(samples: &[f32], src_rate: u32, target_rate: u32) -> Vec<f32> {
    if src_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / src_rate as f64;

    let mut resampler = match SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Sinc resampler unavailable, using linear interpolation");
            return resample_linear(samples, src_rate, target_rate);
        }
    };

    match resampler.process(&[samples.to_vec()], None) {
        Ok(mut output) if !output.is_empty() => output.swap_remove(0),
        Ok(_) => resample_linear(samples, src_rate, target_rate),
        Err(e) => {
            warn!(error = %e, "Sinc resampling failed, using linear interpolation");
            resample_linear(samples, src_rate, target_rate)
        }
    }
}

fn resample_linear(samples: &[f32], src_rate: u32, target_rate: u32) -> Vec<f32> {
    if src_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = src_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            samples[lo] * (1.0 - frac) + samples[hi] * frac
        })
        .collect()
}

/// Scale so the loudest sample sits at the normalization headroom.
fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let gain = 10f32.powf(NORMALIZE_HEADROOM_DB / 20.0) / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_pcm16<W: std::io::Write + std::io::Seek>(
    writer: W,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut wav = hound::WavWriter::new(writer, wav_spec(sample_rate))?;
    for &sample in samples {
        wav.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    wav.finalize()
}

/// Convert an audio file into the canonical reference format.
///
/// The output is a mono 16-bit WAV at `target_sample_rate`, peak-normalized.
/// The output file is left behind on failure; callers own cleanup.
pub fn normalize_audio(
    input_path: &Path,
    output_path: &Path,
    target_sample_rate: u32,
    target_channels: u16,
) -> Result<AudioInfo, AudioError> {
    if target_channels != 1 {
        return Err(AudioError::Normalize(format!(
            "only mono output is supported, got {target_channels} channels"
        )));
    }

    let extension = file_extension(&input_path.to_string_lossy());
    let content = std::fs::read(input_path)?;
    let decoded = decode(content, &extension).map_err(|e| {
        error!(input_path = %input_path.display(), error = %e, "Audio normalization failed");
        AudioError::Normalize(e.to_string())
    })?;

    let mono = downmix(&decoded.samples, decoded.channels);
    let mut samples = resample(&mono, decoded.sample_rate, target_sample_rate);
    peak_normalize(&mut samples);

    write_pcm16(
        std::io::BufWriter::new(std::fs::File::create(output_path)?),
        &samples,
        target_sample_rate,
    )?;

    let info = get_audio_info(output_path)?;

    info!(
        input_path = %input_path.display(),
        output_path = %output_path.display(),
        duration = info.duration_seconds,
        sample_rate = info.sample_rate,
        "Audio normalized successfully"
    );

    Ok(info)
}

/// Encode mono samples as a base64 16-bit WAV.
pub fn audio_to_base64(samples: &[f32], sample_rate: u32) -> Result<String, AudioError> {
    let mut buffer = Vec::new();
    write_pcm16(Cursor::new(&mut buffer), samples, sample_rate)?;
    Ok(STANDARD.encode(buffer))
}

/// Decode a base64 WAV into samples in `[-1, 1]` and its sample rate.
///
/// Multi-channel audio is returned interleaved.
pub fn base64_to_audio(data: &str) -> Result<(Vec<f32>, u32), AudioError> {
    let bytes = STANDARD.decode(data.trim())?;
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, spec.sample_rate))
}
