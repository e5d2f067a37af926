//! Запрос на клонирование голоса
//!
//! Запрос собирается цепочкой `with_*` и после передачи в конвейер не
//! меняется: один запрос соответствует одному запуску.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::config::{check_generation_bound, GenerationParams, SilenceSettings};
use crate::error::{CloneError, Result};
use crate::tts::params::{is_core_key, ParamValue, SynthesisParams, KEY_STYLE_WAV};

/// Переопределения настроек нормализации пауз
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SilenceOverrides {
    /// Порог тишины в dBFS
    pub threshold_db: Option<f32>,
    /// Минимальная длительность паузы для замены (мс)
    pub min_silence_len_ms: Option<u32>,
    /// Длительность, до которой сокращается пауза (мс)
    pub keep_silence_ms: Option<u32>,
}

impl SilenceOverrides {
    /// Наложить переопределения на базовые настройки
    pub fn apply(&self, base: &SilenceSettings) -> SilenceSettings {
        SilenceSettings {
            threshold_db: self.threshold_db.unwrap_or(base.threshold_db),
            min_silence_len_ms: self.min_silence_len_ms.unwrap_or(base.min_silence_len_ms),
            keep_silence_ms: self.keep_silence_ms.unwrap_or(base.keep_silence_ms),
        }
    }

    /// Есть ли хотя бы одно переопределение
    pub fn is_empty(&self) -> bool {
        self.threshold_db.is_none() && self.min_silence_len_ms.is_none() && self.keep_silence_ms.is_none()
    }
}

/// Переопределения параметров генерации
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOverrides {
    /// Вариативность речи
    pub temperature: Option<f32>,
    /// Множитель скорости
    pub speed: Option<f32>,
    /// Штраф за повторы
    pub repetition_penalty: Option<f32>,
    /// Предпочтение длины
    pub length_penalty: Option<f32>,
}

impl GenerationOverrides {
    /// Наложить переопределения на базовые параметры
    pub fn apply(&self, base: &GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature.unwrap_or(base.temperature),
            speed: self.speed.unwrap_or(base.speed),
            repetition_penalty: self.repetition_penalty.unwrap_or(base.repetition_penalty),
            length_penalty: self.length_penalty.unwrap_or(base.length_penalty),
        }
    }

    fn validate(&self) -> Result<()> {
        let values = [
            ("temperature", self.temperature),
            ("speed", self.speed),
            ("repetition_penalty", self.repetition_penalty),
            ("length_penalty", self.length_penalty),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                check_generation_bound(name, value)?;
            }
        }
        Ok(())
    }
}

/// Запрос на синтез речи голосом референса
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    reference_audio: Option<PathBuf>,
    language: Option<String>,
    emotion: Option<String>,
    style_wav: Option<PathBuf>,
    generation: GenerationOverrides,
    crossfade_ms: Option<u32>,
    silence: SilenceOverrides,
    normalize_silence: bool,
    output_path: Option<PathBuf>,
    trim_start_s: f32,
    trim_end_s: f32,
    extra: BTreeMap<String, ParamValue>,
}

impl SynthesisRequest {
    /// Создать запрос с текстом и референсным аудио
    pub fn new(text: impl Into<String>, reference_audio: impl Into<PathBuf>) -> Self {
        Self {
            reference_audio: Some(reference_audio.into()),
            ..Self::with_default_reference(text)
        }
    }

    /// Создать запрос без референса: он будет найден по цепочке запасных путей
    pub fn with_default_reference(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference_audio: None,
            language: None,
            emotion: None,
            style_wav: None,
            generation: GenerationOverrides::default(),
            crossfade_ms: None,
            silence: SilenceOverrides::default(),
            normalize_silence: true,
            output_path: None,
            trim_start_s: 0.0,
            trim_end_s: 0.0,
            extra: BTreeMap::new(),
        }
    }

    /// Код языка (по умолчанию берется из конфигурации)
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Эмоция или стиль речи
    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    /// Референс стиля
    pub fn with_style_wav(mut self, path: impl Into<PathBuf>) -> Self {
        self.style_wav = Some(path.into());
        self
    }

    /// Вариативность речи
    pub fn with_temperature(mut self, value: f32) -> Self {
        self.generation.temperature = Some(value);
        self
    }

    /// Множитель скорости
    pub fn with_speed(mut self, value: f32) -> Self {
        self.generation.speed = Some(value);
        self
    }

    /// Штраф за повторы
    pub fn with_repetition_penalty(mut self, value: f32) -> Self {
        self.generation.repetition_penalty = Some(value);
        self
    }

    /// Предпочтение длины
    pub fn with_length_penalty(mut self, value: f32) -> Self {
        self.generation.length_penalty = Some(value);
        self
    }

    /// Длительность кроссфейда между фрагментами (мс)
    pub fn with_crossfade_ms(mut self, value: u32) -> Self {
        self.crossfade_ms = Some(value);
        self
    }

    /// Переопределения нормализации пауз
    pub fn with_silence_overrides(mut self, overrides: SilenceOverrides) -> Self {
        self.silence = overrides;
        self
    }

    /// Включить или выключить нормализацию пауз
    pub fn with_silence_normalization(mut self, enabled: bool) -> Self {
        self.normalize_silence = enabled;
        self
    }

    /// Путь результата; формат определяется расширением
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Обрезать начало и конец результата (секунды)
    pub fn with_trim(mut self, start_s: f32, end_s: f32) -> Self {
        self.trim_start_s = start_s;
        self.trim_end_s = end_s;
        self
    }

    /// Дополнительный параметр, передаваемый модели как есть
    pub fn with_extra_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Текст
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Референсное аудио, если указано
    pub fn reference_audio(&self) -> Option<&Path> {
        self.reference_audio.as_deref()
    }

    /// Код языка, если указан
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Эмоция, если указана
    pub fn emotion(&self) -> Option<&str> {
        self.emotion.as_deref()
    }

    /// Переопределения параметров генерации
    pub fn generation(&self) -> &GenerationOverrides {
        &self.generation
    }

    /// Длительность кроссфейда, если указана
    pub fn crossfade_ms(&self) -> Option<u32> {
        self.crossfade_ms
    }

    /// Переопределения нормализации пауз
    pub fn silence(&self) -> &SilenceOverrides {
        &self.silence
    }

    /// Нужна ли нормализация пауз
    pub fn normalize_silence(&self) -> bool {
        self.normalize_silence
    }

    /// Путь результата, если указан
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Обрезка начала и конца в миллисекундах
    pub fn trim_ms(&self) -> (u64, u64) {
        (
            (self.trim_start_s * 1000.0).round() as u64,
            (self.trim_end_s * 1000.0).round() as u64,
        )
    }

    /// Проверить текст запроса
    pub fn validate_text(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(CloneError::InvalidInput("text must not be empty".to_string()));
        }
        Ok(())
    }

    /// Проверить параметры запроса (кроме референса)
    pub fn validate(&self) -> Result<()> {
        self.validate_text()?;

        if let Some(language) = &self.language {
            if language.trim().is_empty() {
                return Err(CloneError::InvalidInput("language must not be empty".to_string()));
            }
        }
        self.generation.validate()?;

        for (name, value) in [("trim_start_s", self.trim_start_s), ("trim_end_s", self.trim_end_s)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CloneError::InvalidInput(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if let Some(key) = self.extra.keys().find(|k| is_core_key(k)) {
            return Err(CloneError::InvalidInput(format!(
                "extra parameter '{}' would override a core parameter",
                key
            )));
        }
        Ok(())
    }

    /// Собрать набор параметров синтеза
    ///
    /// Текст и путь вывода подставляются позже для каждого фрагмента.
    pub fn synthesis_params(
        &self,
        reference: &Path,
        default_language: &str,
        defaults: &GenerationParams,
    ) -> SynthesisParams {
        let language = self.language.as_deref().unwrap_or(default_language);
        let mut params = SynthesisParams::new(self.text.trim(), reference, language, PathBuf::new());

        if let Some(emotion) = &self.emotion {
            params = params.with_emotion(emotion);
        }
        if let Some(style) = &self.style_wav {
            params = params.with(KEY_STYLE_WAV, ParamValue::Path(style.clone()));
        }

        let generation = self.generation.apply(defaults);
        params = params
            .with("temperature", ParamValue::Number(generation.temperature))
            .with("speed", ParamValue::Number(generation.speed))
            .with("repetition_penalty", ParamValue::Number(generation.repetition_penalty))
            .with("length_penalty", ParamValue::Number(generation.length_penalty));

        for (key, value) in &self.extra {
            params.set(key.clone(), value.clone());
        }
        params
    }
}
