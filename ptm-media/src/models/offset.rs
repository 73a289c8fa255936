//! Audio envelopes and offset estimates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean absolute amplitude over consecutive fixed windows
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub values: Vec<f32>,
    /// Duration covered by one value
    pub seconds_per_value: f64,
}

impl Envelope {
    pub fn new(values: Vec<f32>, seconds_per_value: f64) -> Self {
        Self {
            values,
            seconds_per_value,
        }
    }

    /// Envelope of an interleaved sample buffer
    pub fn from_interleaved(
        samples: &[f32],
        channels: usize,
        sample_rate: u32,
        window_frames: usize,
        max_seconds: f64,
    ) -> Self {
        let mut builder = EnvelopeBuilder::new(channels, sample_rate, window_frames, max_seconds);
        builder.push_interleaved(samples);
        builder.finish()
    }

    /// Start time of value `index`
    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 * self.seconds_per_value
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Incremental envelope construction over decoded packets
#[derive(Debug)]
pub struct EnvelopeBuilder {
    channels: usize,
    sample_rate: u32,
    window_frames: usize,
    max_frames: usize,
    frames_seen: usize,
    window_sum: f64,
    window_count: usize,
    values: Vec<f32>,
}

impl EnvelopeBuilder {
    pub fn new(channels: usize, sample_rate: u32, window_frames: usize, max_seconds: f64) -> Self {
        let max_frames = (max_seconds.max(0.0) * f64::from(sample_rate)) as usize;
        Self {
            channels: channels.max(1),
            sample_rate,
            window_frames: window_frames.max(1),
            max_frames,
            frames_seen: 0,
            window_sum: 0.0,
            window_count: 0,
            values: Vec::new(),
        }
    }

    /// True once the analysis duration has been consumed
    pub fn is_full(&self) -> bool {
        self.frames_seen >= self.max_frames
    }

    /// Feed interleaved samples; frames past the analysis duration are dropped
    pub fn push_interleaved(&mut self, samples: &[f32]) {
        for frame in samples.chunks_exact(self.channels) {
            if self.is_full() {
                return;
            }

            let magnitude: f64 =
                frame.iter().map(|s| f64::from(s.abs())).sum::<f64>() / self.channels as f64;
            self.window_sum += magnitude;
            self.window_count += 1;
            self.frames_seen += 1;

            if self.window_count == self.window_frames {
                self.flush_window();
            }
        }
    }

    fn flush_window(&mut self) {
        if self.window_count > 0 {
            self.values
                .push((self.window_sum / self.window_count as f64) as f32);
        }
        self.window_sum = 0.0;
        self.window_count = 0;
    }

    pub fn finish(mut self) -> Envelope {
        self.flush_window();
        let seconds_per_value = if self.sample_rate == 0 {
            0.0
        } else {
            self.window_frames as f64 / f64::from(self.sample_rate)
        };
        Envelope::new(self.values, seconds_per_value)
    }
}

/// How an offset estimate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EstimateMethod {
    /// Matched transients in both audio tracks
    AudioTransient,
    /// Difference of file creation times
    CreationTimestamps,
    /// Nothing usable; zero offset
    NoData,
}

impl EstimateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateMethod::AudioTransient => "audioTransient",
            EstimateMethod::CreationTimestamps => "creationTimestamps",
            EstimateMethod::NoData => "noData",
        }
    }
}

/// Suggested offset of the secondary source relative to the primary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetEstimate {
    pub offset_seconds: f64,
    pub confidence: f64,
    pub method: EstimateMethod,
}

/// Creation times used when the audio path cannot produce an estimate
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceTimestamps {
    pub primary: Option<DateTime<Utc>>,
    pub secondary: Option<DateTime<Utc>>,
}
