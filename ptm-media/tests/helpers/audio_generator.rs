//! WAV fixtures with a single clap transient

use std::path::{Path, PathBuf};

/// Configuration for a generated recording
#[derive(Debug, Clone)]
pub struct ClapConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Time of the clap; `None` for background noise only
    pub clap_at: Option<f64>,
    /// Length of the clap burst
    pub clap_seconds: f64,
}

impl Default for ClapConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 6.0,
            sample_rate: 16_000,
            channels: 2,
            clap_at: Some(2.0),
            clap_seconds: 0.03,
        }
    }
}

/// Write a 16-bit WAV: low hum plus a loud decaying burst at `clap_at`
pub fn generate_clap_wav(path: &Path, config: &ClapConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let rate = config.sample_rate as f64;
    let total_frames = (config.duration_seconds * rate) as usize;
    let clap = config.clap_at.map(|at| {
        let start = (at * rate) as usize;
        (start, start + (config.clap_seconds * rate) as usize)
    });

    for i in 0..total_frames {
        let t = i as f64 / rate;
        let hum = 0.01 * (2.0 * std::f64::consts::PI * 120.0 * t).sin();
        let burst = match clap {
            Some((start, end)) if i >= start && i < end => {
                let progress = (i - start) as f64 / (end - start) as f64;
                // Alternating sign keeps the burst broadband
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                0.9 * (1.0 - progress) * sign
            }
            _ => 0.0,
        };
        let sample = ((hum + burst).clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_clap_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clap.wav");
        generate_clap_wav(&path, &ClapConfig::default()).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 96_000);
    }
}
