//! Audio track decoding for sync analysis
//!
//! Uses symphonia to pull the first audio track out of a recording (MOV/MP4
//! containers or plain audio files) and folds the interleaved samples into
//! an amplitude envelope without keeping the PCM around.

use anyhow::{bail, Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio_util::sync::CancellationToken;

use crate::models::{Envelope, EnvelopeBuilder};

/// Decode the leading `max_seconds` of the first audio track into an envelope
///
/// # Errors
/// * File I/O errors, unsupported container, no audio track
/// * Cancellation (checked once per packet)
pub fn decode_envelope(
    file_path: &Path,
    window_frames: usize,
    max_seconds: f64,
    cancel: &CancellationToken,
) -> Result<Envelope> {
    tracing::debug!(path = %file_path.display(), "Decoding audio envelope");

    let file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open media file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe media file: {}", file_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .context("No audio track found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate unknown")?;
    let channel_count = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let mut builder = EnvelopeBuilder::new(channel_count, sample_rate, window_frames, max_seconds);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    while !builder.is_full() {
        if cancel.is_cancelled() {
            bail!("Envelope extraction cancelled");
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => bail!("Error reading packet: {}", e),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped, the envelope tolerates gaps
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(
                    path = %file_path.display(),
                    error = %e,
                    "Skipping undecodable packet"
                );
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to decode packet in: {}", file_path.display())
                });
            }
        };

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
        });
        if buf.capacity() < decoded.capacity() * decoded.spec().channels.count() {
            *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        }
        buf.copy_interleaved_ref(decoded);
        builder.push_interleaved(buf.samples());
    }

    let envelope = builder.finish();

    tracing::debug!(
        path = %file_path.display(),
        sample_rate = sample_rate,
        channels = channel_count,
        windows = envelope.len(),
        "Audio envelope complete"
    );

    Ok(envelope)
}
