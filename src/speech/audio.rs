//! Audio container normalization and signal inspection.
//!
//! Uploads arrive in arbitrary containers. Anything that is not already WAV is decoded with
//! `symphonia` and re-encoded as 16-bit PCM WAV with `hound` at the source sample rate and
//! channel layout. The resulting WAV is then opened as an [`AudioSource`] for calibration and
//! recording.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Frames per buffer used while calibrating.
const CALIBRATION_CHUNK_FRAMES: usize = 1024;
/// Starting energy threshold before calibration.
const INITIAL_ENERGY_THRESHOLD: f64 = 300.0;
/// Fraction of the previous threshold retained after one second of audio.
const DYNAMIC_ENERGY_DAMPING: f64 = 0.15;
/// Multiplier applied to the measured ambient energy.
const DYNAMIC_ENERGY_RATIO: f64 = 1.5;

/// Errors raised while decoding or re-encoding audio.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Reading or writing an audio file failed.
    #[error("audio I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The container or codec could not be decoded.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// The WAV file could not be read or written.
    #[error("failed to process WAV audio: {0}")]
    Wav(#[from] hound::Error),
}

/// Decode `input` (any supported container) and write it to `output` as 16-bit PCM WAV.
///
/// `extension` is a probe hint only; detection relies on the file contents.
pub fn convert_to_wav(
    input: &Path,
    output: &Path,
    extension: Option<&str>,
) -> Result<(), AudioError> {
    let source = File::open(input)?;
    let stream = MediaSourceStream::new(Box::new(source), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|error| AudioError::Decode(format!("probe: {error}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".into()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|error| AudioError::Decode(format!("codec: {error}")))?;

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(BufWriter::new(File::create(output)?), spec)?;
    let mut frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref error))
                if error.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(error) => return Err(AudioError::Decode(format!("packet: {error}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(error)) => {
                tracing::warn!(error = %error, "Skipping corrupt audio frame");
                continue;
            }
            Err(error) => return Err(AudioError::Decode(format!("decode: {error}"))),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);
        for sample in samples.samples() {
            writer.write_sample(*sample)?;
        }
        frames += (samples.samples().len() / channels.max(1) as usize) as u64;
    }

    writer.finalize()?;
    tracing::debug!(frames, sample_rate, channels, "Converted audio to WAV");
    Ok(())
}

/// A WAV recording held as its encoded bytes.
///
/// Only the header is parsed up front; samples are decoded on demand for calibration.
#[derive(Debug, Clone)]
pub struct AudioSource {
    bytes: Vec<u8>,
    spec: hound::WavSpec,
    frames: usize,
}

/// The full buffered signal, ready to be submitted to a recognizer.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    /// WAV-encoded signal.
    pub wav: Vec<u8>,
    /// Number of frames (samples per channel).
    pub frames: usize,
    /// Duration of the signal.
    pub duration: Duration,
}

impl AudioSource {
    /// Read a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        Self::from_wav_bytes(std::fs::read(path)?)
    }

    /// Parse the WAV header, keeping the original encoding for submission.
    pub fn from_wav_bytes(bytes: Vec<u8>) -> Result<Self, AudioError> {
        let (spec, frames) = {
            let reader = hound::WavReader::new(Cursor::new(bytes.as_slice()))?;
            (reader.spec(), reader.duration() as usize)
        };
        Ok(Self {
            bytes,
            spec,
            frames,
        })
    }

    /// Samples per second per channel.
    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    /// Number of frames in the recording.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Estimate the ambient energy threshold from the leading `duration` of the signal.
    ///
    /// The threshold starts at 300 and is pulled toward 1.5x the RMS energy of each
    /// 1024-frame buffer, with damping of 0.15 per second of audio. Only the window is
    /// decoded, and [`AudioSource::record`] still returns the whole signal.
    pub fn adjust_for_ambient_noise(&self, duration: Duration) -> Result<f64, AudioError> {
        let mut threshold = INITIAL_ENERGY_THRESHOLD;
        let sample_rate = self.spec.sample_rate;
        if sample_rate == 0 {
            return Ok(threshold);
        }

        let channels = usize::from(self.spec.channels.max(1));
        let seconds_per_buffer = CALIBRATION_CHUNK_FRAMES as f64 / f64::from(sample_rate);
        let damping = DYNAMIC_ENERGY_DAMPING.powf(seconds_per_buffer);
        let window_frames = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;
        let window = self.read_leading_samples(window_frames.min(self.frames) * channels)?;

        for buffer in window.chunks(CALIBRATION_CHUNK_FRAMES * channels) {
            let target = rms(buffer) * DYNAMIC_ENERGY_RATIO;
            threshold = threshold * damping + target * (1.0 - damping);
        }
        Ok(threshold)
    }

    /// Return the full buffered signal.
    pub fn record(self) -> RecordedAudio {
        let duration = if self.spec.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.frames as f64 / f64::from(self.spec.sample_rate))
        };
        RecordedAudio {
            wav: self.bytes,
            frames: self.frames,
            duration,
        }
    }

    /// Decode the first `count` samples, scaled to the 16-bit integer range.
    fn read_leading_samples(&self, count: usize) -> Result<Vec<f64>, hound::Error> {
        let mut reader = hound::WavReader::new(Cursor::new(self.bytes.as_slice()))?;
        match self.spec.sample_format {
            hound::SampleFormat::Int => {
                let scale = 2f64.powi(16 - i32::from(self.spec.bits_per_sample));
                reader
                    .samples::<i32>()
                    .take(count)
                    .map(|sample| sample.map(|s| f64::from(s) * scale))
                    .collect()
            }
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .take(count)
                .map(|sample| sample.map(|s| f64::from(s) * f64::from(i16::MAX)))
                .collect(),
        }
    }
}

fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Encode mono 16-bit samples as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, amplitude: f64) -> Vec<i16> {
        (0..frames)
            .map(|i| ((i as f64 * 0.05).sin() * amplitude) as i16)
            .collect()
    }

    #[test]
    fn record_returns_full_signal() {
        let wav = encode_wav(&tone(16_000, 1000.0), 16_000).unwrap();
        let source = AudioSource::from_wav_bytes(wav.clone()).unwrap();
        assert_eq!(source.frames(), 16_000);
        assert_eq!(source.sample_rate(), 16_000);

        let recorded = source.record();
        assert_eq!(recorded.wav, wav);
        assert_eq!(recorded.frames, 16_000);
        assert_eq!(recorded.duration, Duration::from_secs(1));
    }

    #[test]
    fn silence_lowers_threshold() {
        let wav = encode_wav(&vec![0; 16_000], 16_000).unwrap();
        let source = AudioSource::from_wav_bytes(wav).unwrap();
        let threshold = source
            .adjust_for_ambient_noise(Duration::from_secs(1))
            .unwrap();
        assert!(threshold < INITIAL_ENERGY_THRESHOLD);
    }

    #[test]
    fn loud_noise_raises_threshold() {
        let wav = encode_wav(&tone(16_000, 20_000.0), 16_000).unwrap();
        let source = AudioSource::from_wav_bytes(wav).unwrap();
        let threshold = source
            .adjust_for_ambient_noise(Duration::from_secs(1))
            .unwrap();
        assert!(threshold > INITIAL_ENERGY_THRESHOLD);
    }

    #[test]
    fn empty_recording_keeps_initial_threshold() {
        let wav = encode_wav(&[], 16_000).unwrap();
        let source = AudioSource::from_wav_bytes(wav).unwrap();
        assert_eq!(source.frames(), 0);
        assert_eq!(
            source
                .adjust_for_ambient_noise(Duration::from_secs(1))
                .unwrap(),
            INITIAL_ENERGY_THRESHOLD
        );
    }

    #[test]
    fn calibration_only_reads_the_leading_window() {
        let mut samples = vec![0i16; 16_000];
        samples.extend(tone(48_000, 20_000.0));
        let wav = encode_wav(&samples, 16_000).unwrap();
        let source = AudioSource::from_wav_bytes(wav).unwrap();
        assert_eq!(source.frames(), 64_000);

        let quiet_lead = source
            .adjust_for_ambient_noise(Duration::from_secs(1))
            .unwrap();
        assert!(quiet_lead < INITIAL_ENERGY_THRESHOLD);

        let recorded = source.record();
        assert_eq!(recorded.frames, 64_000);
        assert_eq!(recorded.duration, Duration::from_secs(4));
    }

    #[test]
    fn frames_come_from_the_header_for_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for sample in tone(8_000, 1000.0) {
                writer.write_sample(sample).unwrap();
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }

        let source = AudioSource::from_wav_bytes(cursor.into_inner()).unwrap();
        assert_eq!(source.frames(), 8_000);
        assert_eq!(source.record().duration, Duration::from_secs(1));
    }

    #[test]
    fn invalid_wav_bytes_are_rejected() {
        let error = AudioSource::from_wav_bytes(b"definitely not riff".to_vec()).unwrap_err();
        assert!(matches!(error, AudioError::Wav(_)));
    }

    #[test]
    fn converts_wav_container_through_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.ogg");
        let output = dir.path().join("clip.ogg.wav");
        std::fs::write(&input, encode_wav(&tone(8_000, 3000.0), 8_000).unwrap()).unwrap();

        convert_to_wav(&input, &output, Some("ogg")).unwrap();

        let converted = AudioSource::open(&output).unwrap();
        assert_eq!(converted.sample_rate(), 8_000);
        assert_eq!(converted.frames(), 8_000);
    }

    #[test]
    fn garbage_input_fails_to_convert() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("noise.mp3");
        std::fs::write(&input, vec![7u8; 512]).unwrap();
        let error = convert_to_wav(&input, &dir.path().join("out.wav"), Some("mp3")).unwrap_err();
        assert!(matches!(error, AudioError::Decode(_)));
    }
}
