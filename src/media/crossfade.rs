//! Склейка аудио сегментов с кроссфейдом

use crate::error::{CloneError, Result};
use crate::media::audio::AudioSegment;

/// Склеить сегменты по порядку с кроссфейдом заданной длительности
///
/// Каждый следующий сегмент перекрывает хвост уже склеенного аудио на
/// `crossfade_ms` миллисекунд (затухание по приподнятому косинусу), поэтому
/// длительность результата равна сумме длительностей минус `(N - 1)` длин
/// перекрытия. Перекрытие ограничивается длинами соседних сегментов, при
/// нулевом значении сегменты просто конкатенируются.
pub fn crossfade_concat(segments: &[AudioSegment], crossfade_ms: u64) -> Result<AudioSegment> {
    let first = segments
        .first()
        .ok_or_else(|| CloneError::AudioProcessing("Nothing to merge".to_string()))?;

    // Все сегменты должны иметь одинаковый формат
    let sample_rate = first.sample_rate();
    let channels = first.channels();
    if let Some(other) = segments
        .iter()
        .find(|s| s.sample_rate() != sample_rate || s.channels() != channels)
    {
        return Err(CloneError::AudioProcessing(format!(
            "Cannot merge segments with different formats: {} Hz/{} ch and {} Hz/{} ch",
            sample_rate,
            channels,
            other.sample_rate(),
            other.channels()
        )));
    }

    let requested = first.ms_to_frames(crossfade_ms);
    let ch = channels as usize;

    let total_frames: usize = segments.iter().map(|s| s.frames()).sum();
    let mut result: Vec<f32> = Vec::with_capacity(total_frames * ch);
    result.extend_from_slice(first.samples());

    for segment in &segments[1..] {
        let current_frames = result.len() / ch;
        let overlap = requested.min(current_frames).min(segment.frames());
        let fade_start = (current_frames - overlap) * ch;

        for j in 0..overlap {
            let fade_out = 0.5 * (1.0 + ((std::f32::consts::PI * j as f32) / overlap as f32).cos());
            let fade_in = 1.0 - fade_out;
            for c in 0..ch {
                let idx = fade_start + j * ch + c;
                result[idx] = result[idx] * fade_out + segment.samples()[j * ch + c] * fade_in;
            }
        }

        result.extend_from_slice(&segment.samples()[overlap * ch..]);
    }

    log::debug!(
        "Merged {} segments with {} ms crossfade into {} frames",
        segments.len(),
        crossfade_ms,
        result.len() / ch
    );
    Ok(AudioSegment::new(result, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32, frames: usize, sample_rate: u32) -> AudioSegment {
        AudioSegment::new(vec![value; frames], sample_rate, 1)
    }

    #[test]
    fn test_concat_without_crossfade() {
        let segments = vec![constant(1.0, 44100, 44100), constant(1.0, 44100, 44100)];
        let merged = crossfade_concat(&segments, 0).unwrap();

        assert_eq!(merged.frames(), 88200);
    }

    #[test]
    fn test_crossfade_shortens_by_overlap() {
        let segments = vec![constant(1.0, 44100, 44100), constant(1.0, 44100, 44100)];
        let merged = crossfade_concat(&segments, 100).unwrap();

        // 2 секунды минус 0.1 секунды перекрытия
        assert_eq!(merged.frames(), 88200 - 4410);
    }

    #[test]
    fn test_crossfade_blends_levels() {
        let segments = vec![constant(1.0, 1000, 1000), constant(0.0, 1000, 1000)];
        let merged = crossfade_concat(&segments, 100).unwrap();

        // Начало перекрытия звучит как первый сегмент, конец как второй
        assert!((merged.samples()[900] - 1.0).abs() < 1e-6);
        assert!(merged.samples()[999] < 0.01);
        assert_eq!(merged.samples()[1000], 0.0);
    }

    #[test]
    fn test_overlap_clamped_to_short_segment() {
        let segments = vec![constant(0.5, 1000, 1000), constant(0.5, 20, 1000)];
        let merged = crossfade_concat(&segments, 100).unwrap();

        assert_eq!(merged.frames(), 1000);
    }

    #[test]
    fn test_stereo_frames() {
        let a = AudioSegment::new(vec![0.25; 2000], 1000, 2);
        let b = AudioSegment::new(vec![0.25; 2000], 1000, 2);
        let merged = crossfade_concat(&[a, b], 50).unwrap();

        assert_eq!(merged.channels(), 2);
        assert_eq!(merged.frames(), 1950);
        assert!(merged.samples().iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_format_mismatch() {
        let segments = vec![constant(1.0, 100, 44100), constant(1.0, 100, 22050)];
        assert!(matches!(crossfade_concat(&segments, 10), Err(CloneError::AudioProcessing(_))));
    }

    #[test]
    fn test_empty_input() {
        assert!(crossfade_concat(&[], 40).is_err());
    }
}
