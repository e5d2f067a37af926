//! Синтез фрагментов и их склейка в один файл

use std::path::Path;
use crate::error::{CloneError, Result};
use crate::media::audio::{decode_audio_file, export_audio, is_wav_path};
use crate::media::crossfade::crossfade_concat;
use crate::progress::{ProcessStep, ProgressTracker};
use crate::text::chunker::TextChunk;
use crate::tts::invoker::{InvocationReport, SynthesisInvoker};
use crate::tts::params::SynthesisParams;
use crate::utils::temp::ChunkWorkspace;

/// Результат синтеза всех фрагментов
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    /// Количество синтезированных фрагментов
    pub chunks: usize,
    /// Отчеты о вызовах модели по фрагментам
    pub reports: Vec<InvocationReport>,
    /// Выполнялась ли склейка
    pub merged: bool,
}

impl StitchOutcome {
    /// Был ли хотя бы один фрагмент синтезирован с урезанными параметрами
    pub fn degraded(&self) -> bool {
        self.reports.iter().any(|r| !r.dropped_keys.is_empty())
    }
}

/// Синтез последовательности фрагментов в один файл
pub struct ChunkStitcher {
    invoker: SynthesisInvoker,
    crossfade_ms: u64,
    cleanup: bool,
}

impl ChunkStitcher {
    /// Создать склейщик
    pub fn new(invoker: SynthesisInvoker, crossfade_ms: u64) -> Self {
        Self {
            invoker,
            crossfade_ms,
            cleanup: true,
        }
    }

    /// Удалять ли промежуточные файлы фрагментов
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Синтезировать фрагменты и записать результат в `output`
    ///
    /// Фрагменты синтезируются строго по порядку. Ошибка любого фрагмента
    /// прерывает весь запрос, частичный результат не возвращается.
    pub fn stitch(
        &self,
        chunks: &[TextChunk],
        base: &SynthesisParams,
        output: &Path,
        progress: Option<&ProgressTracker>,
    ) -> Result<StitchOutcome> {
        if chunks.is_empty() {
            return Err(CloneError::InvalidInput("nothing to synthesize".to_string()));
        }

        if let Some(tracker) = progress {
            tracker.set_step(ProcessStep::Synthesis);
        }

        // Один фрагмент в WAV синтезируется сразу в итоговый файл
        if chunks.len() == 1 && is_wav_path(output) {
            let chunk = &chunks[0];
            log::info!("Synthesizing single chunk ({} chars) into {}", chunk.char_len(), output.display());
            let report = self.synthesize_chunk(chunk, base, output)?;
            report_chunk(progress, 1, 1);
            return Ok(StitchOutcome {
                chunks: 1,
                reports: vec![report],
                merged: false,
            });
        }

        let mut workspace = ChunkWorkspace::new(self.cleanup)?;
        let mut reports = Vec::with_capacity(chunks.len());
        let mut paths = Vec::with_capacity(chunks.len());

        for (done, chunk) in chunks.iter().enumerate() {
            let path = workspace.chunk_path(chunk.index);
            log::info!(
                "Synthesizing chunk {}/{} ({} chars)",
                done + 1,
                chunks.len(),
                chunk.char_len()
            );
            reports.push(self.synthesize_chunk(chunk, base, &path)?);
            paths.push(path);
            report_chunk(progress, done + 1, chunks.len());
        }

        if let Some(tracker) = progress {
            tracker.set_step(ProcessStep::Stitching);
        }

        let segments = paths
            .iter()
            .map(decode_audio_file)
            .collect::<Result<Vec<_>>>()?;
        let merged = if segments.len() == 1 {
            segments.into_iter().next().ok_or_else(|| CloneError::Other("no audio".to_string()))?
        } else {
            crossfade_concat(&segments, self.crossfade_ms)?
        };
        export_audio(&merged, output)?;

        log::info!(
            "Merged {} chunks into {} ({} ms)",
            chunks.len(),
            output.display(),
            merged.duration_ms()
        );

        workspace.cleanup()?;
        Ok(StitchOutcome {
            chunks: chunks.len(),
            reports,
            merged: chunks.len() > 1,
        })
    }

    fn synthesize_chunk(&self, chunk: &TextChunk, base: &SynthesisParams, path: &Path) -> Result<InvocationReport> {
        let params = base.for_chunk(chunk.text.clone(), path);
        self.invoker
            .invoke(params)
            .map_err(|e| CloneError::ChunkSynthesisFailed {
                index: chunk.index,
                source: Box::new(e),
            })
    }
}

fn report_chunk(progress: Option<&ProgressTracker>, done: usize, total: usize) {
    if let Some(tracker) = progress {
        tracker.update_step_progress(
            done as f32 / total as f32 * 100.0,
            Some(format!("Фрагмент {} из {}", done, total)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunker::ChunkPlanner;
    use crate::tests::ToneBackend;
    use crate::tts::backend::share;
    use tempfile::tempdir;

    fn base() -> SynthesisParams {
        SynthesisParams::new("", "ref.wav", "de", "")
    }

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| TextChunk {
                index,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_three_chunks_merged_with_crossfade() {
        let backend = ToneBackend::new(1000);
        let calls = backend.calls();
        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(share(backend)), 40);

        let dir = tempdir().unwrap();
        let output = dir.path().join("merged.wav");
        let outcome = stitcher
            .stitch(&chunks(&["Eins.", "Zwei.", "Drei."]), &base(), &output, None)
            .unwrap();

        assert_eq!(outcome.chunks, 3);
        assert!(outcome.merged);
        let merged = decode_audio_file(&output).unwrap();
        assert_eq!(merged.duration_ms(), 3 * 1000 - 2 * 40);

        let calls = calls.lock();
        let texts: Vec<&str> = calls.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["Eins.", "Zwei.", "Drei."]);
        // Фрагменты пишутся во временные файлы, а не в итоговый
        assert!(calls.iter().all(|p| p.output_path() != output.as_path()));
    }

    #[test]
    fn test_single_chunk_written_directly() {
        let backend = ToneBackend::new(500);
        let calls = backend.calls();
        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(share(backend)), 40);

        let dir = tempdir().unwrap();
        let output = dir.path().join("single.wav");
        let outcome = stitcher.stitch(&chunks(&["Hallo."]), &base(), &output, None).unwrap();

        assert!(!outcome.merged);
        assert_eq!(calls.lock()[0].output_path(), output.as_path());
        assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 500);
    }

    #[test]
    fn test_zero_crossfade_is_plain_concat() {
        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(share(ToneBackend::new(300))), 0);
        let dir = tempdir().unwrap();
        let output = dir.path().join("plain.wav");

        stitcher.stitch(&chunks(&["A.", "B."]), &base(), &output, None).unwrap();
        assert_eq!(decode_audio_file(&output).unwrap().duration_ms(), 600);
    }

    #[test]
    fn test_chunk_failure_is_fatal() {
        let backend = ToneBackend::new(300).failing_on("Zwei");
        let calls = backend.calls();
        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(share(backend)), 40);

        let dir = tempdir().unwrap();
        let output = dir.path().join("failed.wav");
        let err = stitcher
            .stitch(&chunks(&["Eins.", "Zwei.", "Drei."]), &base(), &output, None)
            .unwrap_err();

        assert!(matches!(err, CloneError::ChunkSynthesisFailed { index: 1, .. }));
        assert!(!output.exists());
        // Третий фрагмент не синтезируется
        assert!(calls.lock().iter().all(|p| p.text() != "Drei."));
    }

    #[test]
    fn test_planned_chunks_report_progress() {
        let planner = ChunkPlanner::new(20);
        let planned = planner.plan("Erster Satz hier. Zweiter Satz hier. Dritter Satz.").unwrap();
        assert!(planned.len() > 1);

        let mut tracker = ProgressTracker::new();
        let observer = crate::notification::MemoryProgressObserver::new();
        tracker.add_observer(Box::new(observer.clone()));

        let stitcher = ChunkStitcher::new(SynthesisInvoker::new(share(ToneBackend::new(200))), 20);
        let dir = tempdir().unwrap();
        stitcher
            .stitch(&planned, &base(), &dir.path().join("out.wav"), Some(&tracker))
            .unwrap();

        let history = observer.history();
        let last_synthesis = history
            .iter()
            .filter(|p| p.step == ProcessStep::Synthesis.as_str())
            .last()
            .unwrap();
        assert_eq!(last_synthesis.step_progress, 100.0);
        assert_eq!(history.last().unwrap().step, ProcessStep::Stitching.as_str());
    }
}
