use std::borrow::Cow;
use std::path::Path;

use crate::{AsrError, SAMPLE_RATE};

/// Resample audio using linear interpolation.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(samples);
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    Cow::Owned(output)
}

/// Read a WAV file and return mono f32 samples at the engine rate.
///
/// Multi-channel input is mixed down by averaging; other sample rates are
/// resampled with linear interpolation.
pub fn load_wav_mono_16k(path: &Path) -> crate::Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| AsrError::AudioFile(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AsrError::AudioFile(format!(
            "expected 16-bit integer PCM, got {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let channels = spec.channels.max(1) as usize;
    let sample_rate = spec.sample_rate;

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .map(|s| s.map_err(|e| AsrError::AudioFile(e.to_string())))
        .collect::<Result<_, _>>()?;

    let mut mono = Vec::with_capacity(raw.len() / channels);
    for frame in raw.chunks(channels) {
        let sum: i32 = frame.iter().map(|s| *s as i32).sum();
        let avg = sum as f32 / channels as f32;
        mono.push(avg / i16::MAX as f32);
    }

    tracing::debug!(
        path = %path.display(),
        channels,
        sample_rate,
        samples = mono.len(),
        "loaded wav file"
    );

    Ok(resample_linear(&mono, sample_rate, SAMPLE_RATE).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_mono_16k_unchanged() {
        let path = std::env::temp_dir().join("sotto_asr_mono16k.wav");
        write_wav(&path, 16000, 1, &[0, 8192, -8192, 16384]);

        let samples = load_wav_mono_16k(&path).unwrap();
        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 8192.0 / i16::MAX as f32).abs() < 1e-6);
    }

    #[test]
    fn mixes_stereo_to_mono() {
        let path = std::env::temp_dir().join("sotto_asr_stereo.wav");
        write_wav(&path, 16000, 2, &[1000, 3000, -2000, 2000]);

        let samples = load_wav_mono_16k(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 2000.0 / i16::MAX as f32).abs() < 1e-6);
        assert!(samples[1].abs() < 1e-6);
    }

    #[test]
    fn resamples_to_engine_rate() {
        let path = std::env::temp_dir().join("sotto_asr_8k.wav");
        let second_of_8k: Vec<i16> = vec![0; 8000];
        write_wav(&path, 8000, 1, &second_of_8k);

        let samples = load_wav_mono_16k(&path).unwrap();
        assert_eq!(samples.len(), 16000);
    }

    #[test]
    fn rejects_missing_file() {
        let err = load_wav_mono_16k(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AsrError::AudioFile(_)));
    }
}
