//! Streaming decode stage.
//!
//! Uses Symphonia to probe a local file, pick its audio track, and decode packets into
//! interleaved `f32` samples pushed into a bounded [`SampleQueue`] from a background thread.
//! Probing and decoder construction happen on the caller's thread so an unplayable file is
//! reported before any thread or device is touched.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{SampleQueue, samples_for_duration};

/// A decoder thread feeding `queue`, plus what was learned while probing.
#[derive(Debug)]
pub struct DecodedStream {
    pub spec: SignalSpec,
    pub queue: Arc<SampleQueue>,
    /// Best-effort total length.
    pub duration_ms: Option<u64>,
    /// Codec label (best-effort), e.g. `FLAC`.
    pub codec: Option<String>,
}

/// Probe `path` and start decoding it on a background thread.
///
/// The queue is closed on EOF, on a fatal decode error, or when a consumer closes it first.
pub fn start_file_decode(path: &Path, buffer_seconds: f32) -> Result<DecodedStream> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {}", path.display()))?;
    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = codec_params
        .sample_rate
        .filter(|r| *r > 0)
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let spec = SignalSpec::new(rate, channels);

    let decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("unsupported codec")?;

    let max_samples = samples_for_duration(rate, channels.count(), buffer_seconds);
    let queue = Arc::new(SampleQueue::new(channels.count(), max_samples));

    let queue_for_thread = queue.clone();
    thread::Builder::new()
        .name("decode".into())
        .spawn(move || {
            if let Err(e) = decode_loop(format, decoder, track_id, &queue_for_thread) {
                tracing::error!("decoder thread error: {e:#}");
            }
            queue_for_thread.close();
        })
        .context("spawn decoder thread")?;

    Ok(DecodedStream {
        spec,
        queue,
        duration_ms: duration_ms_from_codec_params(&codec_params),
        codec: codec_name_from_params(&codec_params),
    })
}

fn decode_loop(
    mut format: Box<dyn FormatReader>,
    mut decoder: Box<dyn Decoder>,
    track_id: u32,
    queue: &SampleQueue,
) -> Result<()> {
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break, // EOF
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);

        if !queue.push_blocking(samples.samples()) {
            // Consumer closed the queue (stop/release).
            break;
        }
    }
    Ok(())
}

fn duration_ms_from_codec_params(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    let rate = u64::from(params.sample_rate?);
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use symphonia::core::codecs::{CODEC_TYPE_FLAC, CODEC_TYPE_PCM_S16LE};

    use crate::queue::PopStrategy;

    /// Write a 16-bit PCM WAV of `frames` silent frames.
    pub(crate) fn write_wav(path: &Path, rate: u32, channels: u16, frames: u32) {
        let block_align = channels * 2;
        let data_len = frames * u32::from(block_align);
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(44 + data_len as usize, 0);
        let mut file = File::create(path).unwrap();
        file.write_all(&out).unwrap();
    }

    #[test]
    fn wav_file_probes_and_decodes_to_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8_000, 1, 4_000);

        let stream = start_file_decode(&path, 1.0).unwrap();
        assert_eq!(stream.spec.rate, 8_000);
        assert_eq!(stream.duration_ms, Some(500));
        assert_eq!(stream.codec.as_deref(), Some("PCM_S16"));

        let mut total = 0;
        while let Some(chunk) = stream.queue.pop(PopStrategy::BlockingUpTo { max_frames: 1024 }) {
            total += chunk.len();
        }
        assert_eq!(total, 4_000);
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(start_file_decode(&path, 1.0).is_err());
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = start_file_decode(&dir.path().join("gone.flac"), 1.0).unwrap_err();
        assert!(format!("{err:#}").contains("open"));
    }

    #[test]
    fn duration_needs_a_nonzero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_ms_from_codec_params(&params).is_none());

        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_ms_from_codec_params(&params), Some(2_000));
    }

    #[test]
    fn codec_names_cover_common_formats() {
        let mut params = CodecParameters::new();
        assert!(codec_name_from_params(&params).is_none());
        params.codec = CODEC_TYPE_FLAC;
        assert_eq!(codec_name_from_params(&params).as_deref(), Some("FLAC"));
        params.codec = CODEC_TYPE_PCM_S16LE;
        assert_eq!(codec_name_from_params(&params).as_deref(), Some("PCM_S16"));
    }
}
