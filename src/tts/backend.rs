//! Интерфейс внешней модели синтеза голоса
//!
//! Модель загружается один раз и используется всеми запросами, поэтому она
//! передается в конвейер явно и защищена мьютексом: в каждый момент времени
//! вызов синтеза выполняет только один поток.

use std::sync::Arc;
use parking_lot::Mutex;
use thiserror::Error;
use crate::error::CloneError;
use crate::tts::params::SynthesisParams;

/// Ошибки, которые возвращает бэкенд синтеза
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Бэкенд не понимает перечисленные параметры
    #[error("unsupported parameters: {}", .0.join(", "))]
    UnsupportedParameter(Vec<String>),

    /// Любая другая ошибка синтеза
    #[error("{0}")]
    Synthesis(String),
}

impl From<BackendError> for CloneError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnsupportedParameter(keys) => CloneError::UnsupportedParameter(keys),
            BackendError::Synthesis(message) => CloneError::Backend(message),
        }
    }
}

/// Модель синтеза голоса
///
/// Реализация записывает волну в `params.output_path()` или возвращает ошибку.
pub trait SpeechBackend: Send {
    /// Имя бэкенда для логов
    fn name(&self) -> &str;

    /// Синтезировать речь
    fn synthesize(&mut self, params: &SynthesisParams) -> Result<(), BackendError>;
}

/// Общий экземпляр модели с эксклюзивным доступом на время вызова
pub type SharedBackend = Arc<Mutex<dyn SpeechBackend>>;

/// Обернуть бэкенд для совместного использования
pub fn share<B: SpeechBackend + 'static>(backend: B) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}
