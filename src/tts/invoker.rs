//! Вызов модели синтеза с протоколом деградации
//!
//! Набор параметров, который принимает модель, зависит от загруженной версии
//! и заранее неизвестен. Вместо отказа всего запроса из-за косметического
//! параметра вызов повторяется с постепенно урезанным набором:
//!
//! 1. полный набор;
//! 2. без ключей, которые бэкенд явно назвал неподдерживаемыми;
//! 3. без всех ключей стилизации и генерации;
//! 4. минимальный набор (текст, референс, путь вывода, основной код языка).
//!
//! Попытка, набор параметров которой совпадает с предыдущей, пропускается.

use crate::error::Result;
use crate::tts::backend::{BackendError, SharedBackend};
use crate::tts::params::SynthesisParams;

/// Уровень деградации, на котором синтез прошел успешно
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradationLevel {
    /// Полный набор параметров
    Full,
    /// Без параметров, отклоненных бэкендом
    WithoutRejected,
    /// Только обязательные параметры
    CoreOnly,
    /// Минимальный набор
    Minimal,
}

impl DegradationLevel {
    /// Название уровня для логов
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full parameter set",
            Self::WithoutRejected => "without rejected parameters",
            Self::CoreOnly => "core parameters only",
            Self::Minimal => "minimal parameter set",
        }
    }
}

/// Отчет об успешном вызове
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationReport {
    /// Уровень, на котором синтез удался
    pub level: DegradationLevel,
    /// Число фактических вызовов бэкенда
    pub attempts: usize,
    /// Ключи, удаленные по ходу деградации
    pub dropped_keys: Vec<String>,
    /// Параметры последнего (успешного) вызова
    pub final_params: SynthesisParams,
}

/// Вызов модели синтеза
#[derive(Clone)]
pub struct SynthesisInvoker {
    backend: SharedBackend,
}

impl SynthesisInvoker {
    /// Создать вызывающий объект для общего экземпляра модели
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Синтезировать речь, деградируя параметры при отказах
    pub fn invoke(&self, params: SynthesisParams) -> Result<InvocationReport> {
        let mut attempts = 0;
        let mut dropped_keys: Vec<String> = Vec::new();

        // 1. Полный набор
        let mut current = params;
        let mut last_error = match self.call(&current, &mut attempts) {
            Ok(()) => return Ok(self.report(DegradationLevel::Full, attempts, dropped_keys, current)),
            Err(e) => e,
        };

        // 2. Удаляем ровно те ключи, которые назвал бэкенд
        if let BackendError::UnsupportedParameter(keys) = last_error.clone() {
            let removed = current.remove_keys(&keys);
            if removed.is_empty() {
                log::debug!("Backend rejected {:?}, none of them are optional parameters", keys);
            } else {
                log::warn!("Synthesis backend rejected {:?}, retrying without them", removed);
                dropped_keys.extend(removed);
                match self.call(&current, &mut attempts) {
                    Ok(()) => {
                        return Ok(self.report(DegradationLevel::WithoutRejected, attempts, dropped_keys, current))
                    }
                    Err(e) => last_error = e,
                }
            }
        }

        // 3. Только обязательные параметры
        let removed = current.strip_styling();
        if !removed.is_empty() {
            log::warn!(
                "Synthesis failed ({}), retrying with core parameters only (dropping {:?})",
                last_error,
                removed
            );
            dropped_keys.extend(removed);
            match self.call(&current, &mut attempts) {
                Ok(()) => return Ok(self.report(DegradationLevel::CoreOnly, attempts, dropped_keys, current)),
                Err(e) => last_error = e,
            }
        }

        // 4. Минимальный набор
        let before = current.clone();
        let removed = current.strip_to_minimal();
        if current != before {
            log::warn!(
                "Synthesis failed ({}), retrying with minimal parameter set (dropping {:?})",
                last_error,
                removed
            );
            dropped_keys.extend(removed);
            match self.call(&current, &mut attempts) {
                Ok(()) => return Ok(self.report(DegradationLevel::Minimal, attempts, dropped_keys, current)),
                Err(e) => last_error = e,
            }
        }

        log::error!("Synthesis failed after {} attempts: {}", attempts, last_error);
        Err(last_error.into())
    }

    fn call(&self, params: &SynthesisParams, attempts: &mut usize) -> std::result::Result<(), BackendError> {
        *attempts += 1;
        let mut backend = self.backend.lock();
        log::debug!(
            "Calling {} (attempt {}) with optional parameters {:?}",
            backend.name(),
            attempts,
            params.optional_keys()
        );
        backend.synthesize(params)
    }

    fn report(
        &self,
        level: DegradationLevel,
        attempts: usize,
        dropped_keys: Vec<String>,
        final_params: SynthesisParams,
    ) -> InvocationReport {
        if level != DegradationLevel::Full {
            log::info!("Synthesis succeeded with {} after {} attempts", level.as_str(), attempts);
        }
        InvocationReport {
            level,
            attempts,
            dropped_keys,
            final_params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloneError;
    use crate::tts::backend::{share, SpeechBackend};
    use crate::tts::params::ParamValue;
    use std::sync::Arc;
    use parking_lot::Mutex;

    /// Бэкенд, отвечающий заранее заданной последовательностью результатов
    struct ScriptedBackend {
        script: Vec<std::result::Result<(), BackendError>>,
        calls: Arc<Mutex<Vec<SynthesisParams>>>,
    }

    impl SpeechBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn synthesize(&mut self, params: &SynthesisParams) -> std::result::Result<(), BackendError> {
            self.calls.lock().push(params.clone());
            if self.script.is_empty() {
                Ok(())
            } else {
                self.script.remove(0)
            }
        }
    }

    fn invoker(script: Vec<std::result::Result<(), BackendError>>) -> (SynthesisInvoker, Arc<Mutex<Vec<SynthesisParams>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = ScriptedBackend { script, calls: calls.clone() };
        (SynthesisInvoker::new(share(backend)), calls)
    }

    fn full_params() -> SynthesisParams {
        SynthesisParams::new("Hallo.", "ref.wav", "de-DE", "out.wav")
            .with_emotion("calm")
            .with("temperature", ParamValue::Number(0.8))
            .with("top_k", ParamValue::Number(50.0))
    }

    #[test]
    fn test_success_on_first_attempt() {
        let (invoker, calls) = invoker(vec![]);
        let report = invoker.invoke(full_params()).unwrap();

        assert_eq!(report.level, DegradationLevel::Full);
        assert_eq!(report.attempts, 1);
        assert!(report.dropped_keys.is_empty());
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_rejected_key_removed_on_second_attempt() {
        let (invoker, calls) = invoker(vec![Err(BackendError::UnsupportedParameter(vec!["style".to_string()]))]);
        let report = invoker.invoke(full_params()).unwrap();

        assert_eq!(report.level, DegradationLevel::WithoutRejected);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.dropped_keys, vec!["style".to_string()]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("style"));
        assert!(!calls[1].contains("style"));
        assert!(calls[1].contains("emotion"));
        assert!(calls[1].contains("temperature"));
    }

    #[test]
    fn test_generic_failure_falls_back_to_core() {
        let (invoker, calls) = invoker(vec![Err(BackendError::Synthesis("boom".to_string()))]);
        let report = invoker.invoke(full_params()).unwrap();

        assert_eq!(report.level, DegradationLevel::CoreOnly);
        assert_eq!(report.attempts, 2);

        let calls = calls.lock();
        assert_eq!(calls[1].optional_keys(), vec!["top_k"]);
        assert_eq!(calls[1].language(), "de-DE");
    }

    #[test]
    fn test_minimal_attempt_after_core_fails() {
        let (invoker, calls) = invoker(vec![
            Err(BackendError::UnsupportedParameter(vec!["emotion".to_string()])),
            Err(BackendError::UnsupportedParameter(vec!["style".to_string()])),
            Err(BackendError::UnsupportedParameter(vec!["top_k".to_string()])),
        ]);
        let report = invoker.invoke(full_params()).unwrap();

        assert_eq!(report.level, DegradationLevel::Minimal);
        assert_eq!(report.attempts, 4);
        assert!(report.final_params.optional_keys().is_empty());
        assert_eq!(report.final_params.language(), "de");
        assert_eq!(calls.lock().len(), 4);
    }

    #[test]
    fn test_terminal_failure_propagated() {
        let failure = || Err(BackendError::Synthesis("model not loaded".to_string()));
        let (invoker, calls) = invoker(vec![failure(), failure(), failure(), failure()]);
        let err = invoker.invoke(full_params()).unwrap_err();

        assert!(matches!(err, CloneError::Backend(ref m) if m == "model not loaded"));
        assert_eq!(calls.lock().len(), 3);
    }

    #[test]
    fn test_identical_attempts_are_skipped() {
        let (invoker, calls) = invoker(vec![Err(BackendError::UnsupportedParameter(vec!["language".to_string()]))]);
        let params = SynthesisParams::new("Hallo.", "ref.wav", "de", "out.wav");
        let err = invoker.invoke(params).unwrap_err();

        assert!(matches!(err, CloneError::UnsupportedParameter(_)));
        assert_eq!(calls.lock().len(), 1);
    }
}
