//! Модуль обработки ошибок библиотеки voice-cloner
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при клонировании голоса.

use thiserror::Error;

/// Ошибки библиотеки voice-cloner
#[derive(Debug, Error)]
pub enum CloneError {
    /// Некорректные входные данные (пустой текст, неверные параметры)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Референсный аудиофайл не найден
    #[error("Reference audio not found: {0}")]
    ReferenceNotFound(String),

    /// Референсный аудиофайл поврежден или слишком мал
    #[error("Reference audio invalid: {0}")]
    ReferenceInvalid(String),

    /// Бэкенд синтеза отклонил параметры
    #[error("Unsupported synthesis parameters: {}", .0.join(", "))]
    UnsupportedParameter(Vec<String>),

    /// Синтез одного из фрагментов не удался после всех уровней деградации
    #[error("Synthesis of chunk {index} failed: {source}")]
    ChunkSynthesisFailed {
        /// Индекс фрагмента
        index: usize,
        /// Исходная ошибка
        #[source]
        source: Box<CloneError>,
    },

    /// Общая ошибка конвейера с исходной причиной
    #[error("Voice synthesis failed: {0}")]
    SynthesisFailed(#[source] Box<CloneError>),

    /// Ошибка бэкенда синтеза
    #[error("Synthesis backend error: {0}")]
    Backend(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка чтения или записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

/// Категория ошибки с точки зрения вызывающей стороны
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Нужно исправить входные данные
    Input,
    /// Бэкенд недоступен или работает в деградированном режиме
    Backend,
    /// Внутренняя ошибка, можно повторить позже
    Internal,
}

impl CloneError {
    /// Обернуть ошибку в `SynthesisFailed`, если она еще не обернута
    pub fn into_synthesis_failed(self) -> Self {
        match self {
            CloneError::SynthesisFailed(_) => self,
            other => CloneError::SynthesisFailed(Box::new(other)),
        }
    }

    /// Определить категорию ошибки, заглядывая внутрь оберток
    pub fn category(&self) -> ErrorCategory {
        match self {
            CloneError::InvalidInput(_)
            | CloneError::ReferenceNotFound(_)
            | CloneError::ReferenceInvalid(_) => ErrorCategory::Input,
            CloneError::UnsupportedParameter(_)
            | CloneError::ChunkSynthesisFailed { .. }
            | CloneError::Backend(_) => ErrorCategory::Backend,
            CloneError::SynthesisFailed(inner) => inner.category(),
            _ => ErrorCategory::Internal,
        }
    }

    /// Самая глубокая причина в цепочке оберток
    pub fn root_cause(&self) -> &CloneError {
        match self {
            CloneError::SynthesisFailed(inner) => inner.root_cause(),
            CloneError::ChunkSynthesisFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<&str> for CloneError {
    fn from(s: &str) -> Self {
        CloneError::Other(s.to_string())
    }
}

impl From<String> for CloneError {
    fn from(s: String) -> Self {
        CloneError::Other(s)
    }
}

/// Тип Result для библиотеки voice-cloner
pub type Result<T> = std::result::Result<T, CloneError>;
