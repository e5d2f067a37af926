//! Основной файл библиотеки voice-cloner
//!
//! Библиотека синтезирует речь голосом референсной записи: текст
//! разбивается на фрагменты, каждый фрагмент синтезируется внешней моделью,
//! фрагменты склеиваются с кроссфейдом, а затем длинные паузы в результате
//! сокращаются до заданной длительности.

pub mod config;
pub mod error;
pub mod media;
pub mod notification;
pub mod progress;
pub mod reference;
pub mod request;
pub mod text;
pub mod tts;
pub mod utils;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::media::audio::{decode_audio_file, export_audio, trim_segment};
use crate::media::silence::SilenceNormalizer;
use crate::progress::{ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::reference::{resolve_reference, validate_reference};
use crate::text::chunker::ChunkPlanner;
use crate::tts::invoker::SynthesisInvoker;
use crate::tts::stitcher::ChunkStitcher;

pub use crate::config::{ClonerConfig, GenerationParams, SilenceSettings};
pub use crate::error::{CloneError, ErrorCategory, Result};
pub use crate::request::{GenerationOverrides, SilenceOverrides, SynthesisRequest};
pub use crate::tts::backend::{share, BackendError, SharedBackend, SpeechBackend};
pub use crate::tts::command::CommandBackend;
pub use crate::tts::params::{ParamValue, SynthesisParams};

/// Конвейер клонирования голоса
///
/// Экземпляр модели передается явно и разделяется между запросами. Каждый
/// запуск синтезирует свои фрагменты последовательно, доступ к модели на
/// время вызова эксклюзивный.
pub struct ClonePipeline {
    /// Конфигурация
    config: ClonerConfig,
    /// Модель синтеза
    backend: SharedBackend,
    /// Трекер прогресса
    progress_tracker: Option<ProgressTracker>,
}

impl ClonePipeline {
    /// Создать конвейер с указанной конфигурацией и моделью
    pub fn new(config: ClonerConfig, backend: SharedBackend) -> Self {
        Self {
            config,
            backend,
            progress_tracker: None,
        }
    }

    /// Создать конвейер с репортером прогресса
    pub fn with_progress_reporter(
        config: ClonerConfig,
        backend: SharedBackend,
        reporter: Box<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            backend,
            progress_tracker: Some(ProgressTracker::with_reporter(reporter)),
        }
    }

    /// Установить репортер прогресса
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.progress_tracker
            .get_or_insert_with(ProgressTracker::new)
            .set_reporter(reporter);
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress_tracker
            .get_or_insert_with(ProgressTracker::new)
            .add_observer(observer)
    }

    /// Текущая конфигурация
    pub fn config(&self) -> &ClonerConfig {
        &self.config
    }

    /// Найти референсное аудио для запроса
    pub fn resolve_reference(&self, request: &SynthesisRequest) -> Result<PathBuf> {
        resolve_reference(
            request.reference_audio(),
            self.config.default_reference.as_deref(),
            &self.config.output_dir,
        )
        .into_result()
    }

    /// Выполнить запрос и вернуть путь к результату
    ///
    /// Ошибки проверки входных данных возвращаются как есть, ошибки синтеза
    /// оборачиваются в [`CloneError::SynthesisFailed`].
    pub fn run(&self, request: &SynthesisRequest) -> Result<PathBuf> {
        let progress = self.progress_tracker.as_ref();
        if let Some(tracker) = progress {
            tracker.reset();
            tracker.update_step_progress(0.0, None);
        }

        // 1. Текст и параметры
        request.validate()?;
        let silence = request.silence().apply(&self.config.silence);
        if request.normalize_silence() {
            silence.validate()?;
        }

        // 2. Референс
        let reference = self.resolve_reference(request)?;
        validate_reference(&reference, self.config.min_reference_bytes)?;

        // 3. Путь результата
        let output = match request.output_path() {
            Some(path) => path.to_path_buf(),
            None => unique_output_path(&self.config.output_dir),
        };
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CloneError::from(e).into_synthesis_failed())?;
        }

        // 4. Разбиение и синтез
        if let Some(tracker) = progress {
            tracker.set_step(ProcessStep::ChunkPlanning);
        }
        let base = request.synthesis_params(
            &reference,
            &self.config.default_language,
            &self.config.generation,
        );
        if let Err(e) = self.synthesize(request, &base, &output) {
            remove_partial_output(&output);
            return Err(e.into_synthesis_failed());
        }

        // 5. Нормализация пауз
        if request.normalize_silence() {
            if let Some(tracker) = progress {
                tracker.set_step(ProcessStep::SilenceNormalization);
            }
            match SilenceNormalizer::new(silence).normalize_file(&output) {
                Ok(true) => log::info!("Pauses normalized in {}", output.display()),
                Ok(false) => log::debug!("Pause structure already within limits"),
                Err(e) => log::warn!("Silence normalization failed, keeping raw audio: {}", e),
            }
        }

        // 6. Обрезка
        if let Some(tracker) = progress {
            tracker.set_step(ProcessStep::Finalizing);
        }
        let mut result = output;
        let (start_ms, end_ms) = request.trim_ms();
        if start_ms > 0 || end_ms > 0 {
            match trim_output(&result, start_ms, end_ms) {
                Ok(Some(trimmed)) => result = trimmed,
                Ok(None) => log::warn!("Trimming {} ms + {} ms would remove all audio, skipped", start_ms, end_ms),
                Err(e) => log::warn!("Trimming failed, keeping untrimmed audio: {}", e),
            }
        }

        if let Some(tracker) = progress {
            tracker.complete();
        }
        log::info!("Voice cloning finished: {}", result.display());
        Ok(result)
    }

    /// Выполнить запрос в пуле блокирующих задач Tokio
    pub async fn run_async(self: Arc<Self>, request: SynthesisRequest) -> Result<PathBuf> {
        tokio::task::spawn_blocking(move || self.run(&request))
            .await
            .map_err(|e| CloneError::Other(format!("Synthesis task failed: {}", e)))?
    }

    fn synthesize(&self, request: &SynthesisRequest, base: &SynthesisParams, output: &Path) -> Result<()> {
        let chunks = ChunkPlanner::new(self.config.max_chunk_chars).plan(request.text())?;

        let crossfade_ms = request.crossfade_ms().unwrap_or(self.config.crossfade_ms);
        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(self.backend.clone()), crossfade_ms as u64)
            .with_cleanup(self.config.cleanup_temp_files);
        let outcome = stitcher.stitch(&chunks, base, output, self.progress_tracker.as_ref())?;

        if outcome.degraded() {
            log::warn!("Some chunks were synthesized with a reduced parameter set");
        }
        Ok(())
    }
}

/// Клонировать голос с конфигурацией по умолчанию и переменными `CLONER_*`
pub fn clone_voice(backend: SharedBackend, request: &SynthesisRequest) -> Result<PathBuf> {
    let config = ClonerConfig::default().apply_env_overrides()?;
    ClonePipeline::new(config, backend).run(request)
}

/// Путь `output_<YYYYmmdd_HHMMSS>.wav`, не занятый существующим файлом
fn unique_output_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("output_{}.wav", stamp));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("output_{}_{}.wav", stamp, counter));
        counter += 1;
    }
    path
}

/// Записать обрезанную копию рядом с исходным файлом
fn trim_output(path: &Path, start_ms: u64, end_ms: u64) -> Result<Option<PathBuf>> {
    let segment = decode_audio_file(path)?;
    let Some(trimmed) = trim_segment(&segment, start_ms, end_ms) else {
        return Ok(None);
    };

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("wav");
    let target = path.with_file_name(format!("{}_trimmed_{}_{}.{}", stem, start_ms, end_ms, extension));

    export_audio(&trimmed, &target)?;
    log::info!("Trimmed audio written to {}", target.display());
    Ok(Some(target))
}

fn remove_partial_output(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
}
