//! Сквозные тесты конвейера и общие заглушки модели

use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::media::audio::{decode_audio_file, encode_wav, AudioSegment};
use crate::notification::MemoryProgressObserver;
use crate::progress::ProcessStep;
use crate::tts::backend::{share, BackendError, SpeechBackend};
use crate::tts::params::{ParamValue, SynthesisParams};
use crate::{ClonePipeline, CloneError, ClonerConfig, ErrorCategory, SilenceOverrides, SynthesisRequest};

const RATE: u32 = 16000;

/// Синусоида 220 Гц с амплитудой 0.5
///
/// Фаза сдвинута на π/4, чтобы на границах не было нулевых семплов.
pub(crate) fn sine(duration_ms: u64, sample_rate: u32) -> Vec<f32> {
    let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 220.0 * t + std::f32::consts::FRAC_PI_4).sin() * 0.5
        })
        .collect()
}

/// Заглушка модели: пишет тон заданной длительности и запоминает параметры
pub(crate) struct ToneBackend {
    duration_ms: u64,
    pause_ms: u64,
    rejected: Vec<String>,
    fail_on: Option<String>,
    calls: Arc<Mutex<Vec<SynthesisParams>>>,
}

impl ToneBackend {
    pub(crate) fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            pause_ms: 0,
            rejected: Vec::new(),
            fail_on: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Вставлять паузу в середину каждого фрагмента
    pub(crate) fn with_pause(mut self, pause_ms: u64) -> Self {
        self.pause_ms = pause_ms;
        self
    }

    /// Отклонять перечисленные ключи
    pub(crate) fn rejecting(mut self, keys: &[&str]) -> Self {
        self.rejected = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Падать на текстах, содержащих подстроку
    pub(crate) fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<SynthesisParams>>> {
        self.calls.clone()
    }
}

impl SpeechBackend for ToneBackend {
    fn name(&self) -> &str {
        "tone"
    }

    fn synthesize(&mut self, params: &SynthesisParams) -> Result<(), BackendError> {
        self.calls.lock().push(params.clone());

        if let Some(marker) = &self.fail_on {
            if params.text().contains(marker.as_str()) {
                return Err(BackendError::Synthesis("model crashed".to_string()));
            }
        }

        let present: Vec<String> = self
            .rejected
            .iter()
            .filter(|k| params.contains(k))
            .cloned()
            .collect();
        if !present.is_empty() {
            return Err(BackendError::UnsupportedParameter(present));
        }

        let half = self.duration_ms / 2;
        let mut samples = sine(half, RATE);
        samples.extend(vec![0.0; (self.pause_ms * RATE as u64 / 1000) as usize]);
        samples.extend(sine(self.duration_ms - half, RATE));

        encode_wav(&AudioSegment::new(samples, RATE, 1), params.output_path())
            .map_err(|e| BackendError::Synthesis(e.to_string()))
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Записать референс длительностью `secs` секунд
fn write_reference(dir: &Path, secs: u64) -> PathBuf {
    let path = dir.join("speaker.wav");
    encode_wav(&AudioSegment::new(sine(secs * 1000, RATE), RATE, 1), &path).unwrap();
    path
}

fn config_in(dir: &Path) -> ClonerConfig {
    ClonerConfig {
        output_dir: dir.join("outputs"),
        ..ClonerConfig::default()
    }
}

#[test]
fn test_short_text_single_artifact() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let backend = ToneBackend::new(1200);
    let calls = backend.calls();
    let pipeline = ClonePipeline::new(config_in(dir.path()), share(backend));

    let output = dir.path().join("hallo.wav");
    let request = SynthesisRequest::new("Hallo. Wie geht es dir?", &reference)
        .with_language("de")
        .with_output_path(&output);
    let result = pipeline.run(&request).unwrap();

    assert_eq!(result, output);
    assert!(result.exists());
    assert!(decode_audio_file(&result).unwrap().duration_ms() > 0);

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text(), "Hallo. Wie geht es dir?");
    assert_eq!(calls[0].language(), "de");
    assert_eq!(calls[0].reference_audio(), reference.as_path());
}

#[test]
fn test_empty_text_fails_before_synthesis() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let backend = ToneBackend::new(500);
    let calls = backend.calls();
    let pipeline = ClonePipeline::new(config_in(dir.path()), share(backend));

    let err = pipeline.run(&SynthesisRequest::new("", &reference)).unwrap_err();

    assert!(matches!(err, CloneError::InvalidInput(_)));
    assert_eq!(err.category(), ErrorCategory::Input);
    assert!(calls.lock().is_empty());
}

#[test]
fn test_reference_errors() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ToneBackend::new(500);
    let calls = backend.calls();
    let pipeline = ClonePipeline::new(config_in(dir.path()), share(backend));

    let missing = SynthesisRequest::new("Hallo.", dir.path().join("none.wav"));
    assert!(matches!(pipeline.run(&missing), Err(CloneError::ReferenceNotFound(_))));

    let tiny = dir.path().join("tiny.wav");
    std::fs::write(&tiny, vec![0u8; 100]).unwrap();
    let request = SynthesisRequest::new("Hallo.", &tiny);
    assert!(matches!(pipeline.run(&request), Err(CloneError::ReferenceInvalid(_))));

    assert!(calls.lock().is_empty());
}

#[test]
fn test_long_text_is_chunked_and_stitched() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let backend = ToneBackend::new(1000);
    let calls = backend.calls();
    let config = ClonerConfig {
        max_chunk_chars: 40,
        ..config_in(dir.path())
    };
    let pipeline = ClonePipeline::new(config, share(backend));

    let output = dir.path().join("long.wav");
    let request = SynthesisRequest::new(
        "Das ist der erste Satz. Das ist der zweite Satz. Und hier kommt der dritte.",
        &reference,
    )
    .with_output_path(&output);
    pipeline.run(&request).unwrap();

    assert_eq!(calls.lock().len(), 3);
    assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 3000 - 2 * 40);
}

#[test]
fn test_rejected_style_is_dropped() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let backend = ToneBackend::new(800).rejecting(&["style"]);
    let calls = backend.calls();
    let pipeline = ClonePipeline::new(config_in(dir.path()), share(backend));

    let request = SynthesisRequest::new("Guten Morgen.", &reference)
        .with_emotion("cheerful")
        .with_output_path(dir.path().join("styled.wav"));
    let result = pipeline.run(&request).unwrap();

    assert!(result.exists());
    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains("style"));
    assert!(!calls[1].contains("style"));
    assert_eq!(calls[1].get("emotion"), Some(&ParamValue::Text("cheerful".to_string())));
}

#[test]
fn test_backend_failure_wrapped() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let backend = ToneBackend::new(500).failing_on("Satz");
    let pipeline = ClonePipeline::new(config_in(dir.path()), share(backend));

    let output = dir.path().join("broken.wav");
    let request = SynthesisRequest::new("Ein Satz.", &reference).with_output_path(&output);
    let err = pipeline.run(&request).unwrap_err();

    assert!(matches!(err, CloneError::SynthesisFailed(_)));
    assert_eq!(err.category(), ErrorCategory::Backend);
    assert!(matches!(err.root_cause(), CloneError::Backend(_)));
    assert!(!output.exists());
}

#[test]
fn test_long_pause_normalized() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let pipeline = ClonePipeline::new(
        config_in(dir.path()),
        share(ToneBackend::new(1000).with_pause(1500)),
    );

    let output = dir.path().join("paused.wav");
    let request = SynthesisRequest::new("Hallo.", &reference).with_output_path(&output);
    pipeline.run(&request).unwrap();
    assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 1250);

    let request = request.with_silence_overrides(SilenceOverrides {
        keep_silence_ms: Some(100),
        ..SilenceOverrides::default()
    });
    pipeline.run(&request).unwrap();
    assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 1100);

    let request = request.with_silence_normalization(false);
    pipeline.run(&request).unwrap();
    assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 2500);
}

#[test]
fn test_default_output_name_and_trim() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let config = config_in(dir.path());
    let output_dir = config.output_dir.clone();
    let pipeline = ClonePipeline::new(config, share(ToneBackend::new(1000)));

    let generated = pipeline.run(&SynthesisRequest::new("Hallo.", &reference)).unwrap();
    assert_eq!(generated.parent(), Some(output_dir.as_path()));
    let name = generated.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("output_") && name.ends_with(".wav"));

    let trimmed = pipeline
        .run(&SynthesisRequest::new("Hallo.", &reference).with_trim(0.1, 0.2))
        .unwrap();
    assert!(trimmed.to_string_lossy().ends_with("_trimmed_100_200.wav"));
    assert_eq!(decode_audio_file(&trimmed).unwrap().duration_ms(), 700);

    // Обрезка всего аудио пропускается
    let untouched = pipeline
        .run(&SynthesisRequest::new("Hallo.", &reference).with_trim(0.6, 0.6))
        .unwrap();
    assert!(!untouched.to_string_lossy().contains("_trimmed_"));

    let oversized = pipeline
        .run(&SynthesisRequest::new("Hallo.", &reference).with_trim(1.0e30, 0.0))
        .unwrap();
    assert!(oversized.exists());
    assert!(!oversized.to_string_lossy().contains("_trimmed_"));
}

#[test]
fn test_reference_fallback_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.output_dir).unwrap();
    let reference = write_reference(&config.output_dir, 5);
    let backend = ToneBackend::new(500);
    let calls = backend.calls();
    let pipeline = ClonePipeline::new(config, share(backend));

    let request = SynthesisRequest::with_default_reference("Hallo.")
        .with_output_path(dir.path().join("fallback.wav"));
    pipeline.run(&request).unwrap();

    assert_eq!(calls.lock()[0].reference_audio(), reference.as_path());
}

#[test]
fn test_progress_steps_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let mut pipeline = ClonePipeline::new(config_in(dir.path()), share(ToneBackend::new(500)));
    let observer = MemoryProgressObserver::new();
    pipeline.add_observer(Box::new(observer.clone()));

    let request = SynthesisRequest::new("Hallo.", &reference).with_output_path(dir.path().join("p.wav"));
    pipeline.run(&request).unwrap();

    let expected: Vec<&str> = [
        ProcessStep::Validation,
        ProcessStep::ChunkPlanning,
        ProcessStep::Synthesis,
        ProcessStep::SilenceNormalization,
        ProcessStep::Finalizing,
    ]
    .iter()
    .map(|s| s.as_str())
    .collect();
    assert_eq!(observer.steps(), expected);
    assert_eq!(observer.history().last().unwrap().total_progress, 100.0);
}

#[tokio::test]
async fn test_run_async() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path(), 10);
    let pipeline = Arc::new(ClonePipeline::new(config_in(dir.path()), share(ToneBackend::new(600))));

    let first = SynthesisRequest::new("Erste Anfrage.", &reference).with_output_path(dir.path().join("a.wav"));
    let second = SynthesisRequest::new("Zweite Anfrage.", &reference).with_output_path(dir.path().join("b.wav"));

    let (a, b) = tokio::join!(pipeline.clone().run_async(first), pipeline.clone().run_async(second));

    assert!(a.unwrap().exists());
    assert!(b.unwrap().exists());
}
