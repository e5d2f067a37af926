//! Нормализация пауз в синтезированной речи
//!
//! Модель иногда вставляет слишком длинные паузы. Каждый участок тишины не
//! короче `min_silence_len_ms` заменяется тишиной длительностью ровно
//! `keep_silence_ms`, остальное аудио не меняется.

use std::path::Path;
use crate::config::SilenceSettings;
use crate::error::Result;
use crate::media::audio::{decode_audio_file, export_audio, AudioSegment};

/// Участок тишины в кадрах, конец не включается
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceRun {
    /// Первый тихий кадр
    pub start: usize,
    /// Кадр после последнего тихого
    pub end: usize,
}

impl SilenceRun {
    /// Длина участка в кадрах
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Пустой ли участок
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Результат нормализации
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// Менять нечего, исходное аудио остается как есть
    Unchanged,
    /// Аудио пересобрано с укороченными паузами
    Rewritten {
        /// Новое аудио
        audio: AudioSegment,
        /// Количество замененных участков
        runs: usize,
    },
}

/// Линейный порог амплитуды для уровня в dBFS
pub fn threshold_amplitude(threshold_db: f32) -> f32 {
    10f32.powf(threshold_db / 20.0)
}

/// Найти участки тишины не короче минимальной длительности
///
/// Кадр считается тихим, если амплитуда всех его каналов ниже порога.
pub fn detect_silence(segment: &AudioSegment, settings: &SilenceSettings) -> Vec<SilenceRun> {
    let threshold = threshold_amplitude(settings.threshold_db);
    let min_frames = segment.ms_to_frames(settings.min_silence_len_ms as u64).max(1);
    let frames = segment.frames();

    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for index in 0..frames {
        let silent = segment.frame(index).iter().all(|s| s.abs() < threshold);
        match (silent, run_start) {
            (true, None) => run_start = Some(index),
            (false, Some(start)) => {
                if index - start >= min_frames {
                    runs.push(SilenceRun { start, end: index });
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        if frames - start >= min_frames {
            runs.push(SilenceRun { start, end: frames });
        }
    }

    runs
}

/// Нормализатор пауз
#[derive(Debug, Clone, Default)]
pub struct SilenceNormalizer {
    settings: SilenceSettings,
}

impl SilenceNormalizer {
    /// Создать нормализатор с указанными настройками
    pub fn new(settings: SilenceSettings) -> Self {
        Self { settings }
    }

    /// Текущие настройки
    pub fn settings(&self) -> &SilenceSettings {
        &self.settings
    }

    /// Нормализовать паузы в сегменте
    pub fn normalize(&self, segment: &AudioSegment) -> Result<NormalizeOutcome> {
        self.settings.validate()?;

        let runs = detect_silence(segment, &self.settings);
        let keep_frames = segment.ms_to_frames(self.settings.keep_silence_ms as u64);

        // Паузы уже нужной длины: пересобирать нечего
        if runs.iter().all(|run| run.len() == keep_frames) {
            log::debug!("No silence to normalize ({} runs already at target length)", runs.len());
            return Ok(NormalizeOutcome::Unchanged);
        }

        let channels = segment.channels() as usize;
        let samples = segment.samples();
        let mut output = Vec::with_capacity(samples.len());
        let mut cursor = 0;

        for run in &runs {
            output.extend_from_slice(&samples[cursor * channels..run.start * channels]);
            output.resize(output.len() + keep_frames * channels, 0.0);
            cursor = run.end;
        }
        output.extend_from_slice(&samples[cursor * channels..]);

        let audio = AudioSegment::new(output, segment.sample_rate(), segment.channels());
        log::info!(
            "Normalized {} silence runs: {} ms -> {} ms",
            runs.len(),
            segment.duration_ms(),
            audio.duration_ms()
        );

        Ok(NormalizeOutcome::Rewritten {
            audio,
            runs: runs.len(),
        })
    }

    /// Нормализовать паузы в файле на месте
    ///
    /// Возвращает `true`, если файл был перезаписан. Если менять нечего,
    /// файл не трогается и не перекодируется.
    pub fn normalize_file(&self, path: &Path) -> Result<bool> {
        let segment = decode_audio_file(path)?;
        match self.normalize(&segment)? {
            NormalizeOutcome::Unchanged => Ok(false),
            NormalizeOutcome::Rewritten { audio, .. } => {
                export_audio(&audio, path)?;
                Ok(true)
            }
        }
    }
}
