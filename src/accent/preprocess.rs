//! Waveform conditioning ahead of the speaker-embedding encoder.
//!
//! Order matters and mirrors the classifier's contract: mono mixdown,
//! resample to 16 kHz, peak normalization, pre-emphasis, edge silence
//! trim, then pad/truncate into the 1-10 second window.

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Minimum window: 1 second at 16 kHz, zero-padded below this.
pub const MIN_SAMPLES: usize = 16_000;
/// Maximum window: 10 seconds at 16 kHz, truncated above this.
pub const MAX_SAMPLES: usize = 160_000;

const PREEMPHASIS_COEFF: f32 = 0.97;
/// Edge frames quieter than this (relative to the loudest frame) are
/// trimmed away.
const TRIM_THRESHOLD_DB: f32 = -20.0;
const TRIM_FRAME_LEN: usize = 2048;
const TRIM_HOP_LEN: usize = 512;

/// Run the full conditioning chain over an interleaved waveform.
pub fn preprocess(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<f32> {
    let mono = mixdown(samples, channels);
    let mut audio = resample(&mono, sample_rate, TARGET_SAMPLE_RATE);
    peak_normalize(&mut audio);
    preemphasis(&mut audio);
    let mut audio = trim_silence(&audio, TRIM_THRESHOLD_DB);

    if audio.len() < MIN_SAMPLES {
        audio.resize(MIN_SAMPLES, 0.0);
    } else if audio.len() > MAX_SAMPLES {
        audio.truncate(MAX_SAMPLES);
    }

    audio
}

/// Average interleaved channels down to mono.
pub fn mixdown(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler. Adequate for speech features fed
/// into an embedding model; not a polyphase filter.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}

/// Scale so the loudest sample has magnitude 1.0.
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// First-order high-pass emphasis: y[n] = x[n] - 0.97 * x[n-1].
pub fn preemphasis(samples: &mut [f32]) {
    let mut prev = 0.0f32;
    for s in samples.iter_mut() {
        let current = *s;
        *s = current - PREEMPHASIS_COEFF * prev;
        prev = current;
    }
}

/// Trim leading and trailing frames whose RMS falls below
/// `threshold_db` relative to the loudest frame. All-quiet input
/// trims to empty (the caller pads it back up).
pub fn trim_silence(samples: &[f32], threshold_db: f32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let frames: Vec<(usize, f32)> = (0..samples.len())
        .step_by(TRIM_HOP_LEN)
        .map(|start| {
            let end = (start + TRIM_FRAME_LEN).min(samples.len());
            let frame = &samples[start..end];
            let rms = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
            (start, rms)
        })
        .collect();

    let max_rms = frames.iter().fold(0.0f32, |acc, &(_, rms)| acc.max(rms));
    if max_rms <= 0.0 {
        return Vec::new();
    }

    let threshold = max_rms * 10f32.powf(threshold_db / 20.0);
    let loud: Vec<&(usize, f32)> = frames.iter().filter(|(_, rms)| *rms >= threshold).collect();

    match (loud.first(), loud.last()) {
        (Some(&&(first, _)), Some(&&(last, _))) => {
            let end = (last + TRIM_FRAME_LEN).min(samples.len());
            samples[first..end].to_vec()
        }
        _ => Vec::new(),
    }
}
