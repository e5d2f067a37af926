//! Модуль конфигурации библиотеки voice-cloner
//!
//! Этот модуль содержит структуры для настройки конвейера клонирования голоса.
//! Все значения по умолчанию подобраны эмпирически и могут быть переопределены
//! из JSON-файла или переменных окружения.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{CloneError, Result};

/// Настройки нормализации пауз
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceSettings {
    /// Порог тишины в dBFS (отрицательное значение)
    pub threshold_db: f32,
    /// Минимальная длительность паузы для перезаписи (мс)
    pub min_silence_len_ms: u32,
    /// Длительность тишины, которая остается вместо паузы (мс)
    pub keep_silence_ms: u32,
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            min_silence_len_ms: 400,
            keep_silence_ms: 250,
        }
    }
}

impl SilenceSettings {
    /// Проверить корректность настроек
    pub fn validate(&self) -> Result<()> {
        if !self.threshold_db.is_finite() || self.threshold_db >= 0.0 {
            return Err(CloneError::InvalidInput(format!(
                "silence threshold must be a negative dBFS value, got {}",
                self.threshold_db
            )));
        }
        if self.min_silence_len_ms == 0 {
            return Err(CloneError::InvalidInput(
                "minimum silence length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Параметры генерации, передаваемые модели синтеза
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Вариативность речи (0.0 - 1.0)
    pub temperature: f32,
    /// Множитель скорости речи (0.5 - 2.0)
    pub speed: f32,
    /// Штраф за повторы (1.0 - 3.0)
    pub repetition_penalty: f32,
    /// Предпочтение длины предложений (0.5 - 2.0)
    pub length_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            speed: 1.0,
            repetition_penalty: 1.2,
            length_penalty: 1.0,
        }
    }
}

/// Допустимые диапазоны параметров генерации: (имя, мин, макс, мин исключен)
const GENERATION_BOUNDS: [(&str, f32, f32, bool); 4] = [
    ("temperature", 0.0, 1.0, true),
    ("speed", 0.5, 2.0, false),
    ("repetition_penalty", 1.0, 3.0, false),
    ("length_penalty", 0.5, 2.0, false),
];

/// Проверить, что параметр генерации находится в допустимом диапазоне
pub fn check_generation_bound(name: &str, value: f32) -> Result<()> {
    let Some(&(_, min, max, exclusive_min)) = GENERATION_BOUNDS.iter().find(|b| b.0 == name) else {
        return Err(CloneError::InvalidInput(format!("unknown generation parameter: {}", name)));
    };

    let below = if exclusive_min { value <= min } else { value < min };
    if !value.is_finite() || below || value > max {
        return Err(CloneError::InvalidInput(format!(
            "{} must be within {}..={}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

impl GenerationParams {
    /// Проверить все параметры генерации
    pub fn validate(&self) -> Result<()> {
        check_generation_bound("temperature", self.temperature)?;
        check_generation_bound("speed", self.speed)?;
        check_generation_bound("repetition_penalty", self.repetition_penalty)?;
        check_generation_bound("length_penalty", self.length_penalty)
    }
}

/// Конфигурация конвейера клонирования голоса
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClonerConfig {
    /// Директория для результатов, если в запросе не указан путь
    pub output_dir: PathBuf,
    /// Язык по умолчанию
    pub default_language: String,
    /// Максимальная длина фрагмента текста в символах
    pub max_chunk_chars: usize,
    /// Длительность кроссфейда между фрагментами (мс), 0 - без кроссфейда
    pub crossfade_ms: u32,
    /// Настройки нормализации пауз
    pub silence: SilenceSettings,
    /// Параметры генерации по умолчанию
    pub generation: GenerationParams,
    /// Минимальный размер референсного аудио в байтах
    pub min_reference_bytes: u64,
    /// Референсный голос по умолчанию
    pub default_reference: Option<PathBuf>,
    /// Удалять временные файлы фрагментов
    pub cleanup_temp_files: bool,
}

impl Default for ClonerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            default_language: "de".to_string(),
            max_chunk_chars: 250,
            crossfade_ms: 40,
            silence: SilenceSettings::default(),
            generation: GenerationParams::default(),
            min_reference_bytes: 1000,
            default_reference: None,
            cleanup_temp_files: true,
        }
    }
}

impl ClonerConfig {
    /// Загрузить конфигурацию из JSON-файла
    ///
    /// Отсутствующие поля получают значения по умолчанию.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CloneError::Configuration(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: ClonerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Применить переопределения из переменных окружения `CLONER_*`
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var("CLONER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(lang) = std::env::var("CLONER_LANGUAGE") {
            self.default_language = lang;
        }
        if let Some(v) = env_number::<usize>("CLONER_MAX_CHUNK_CHARS")? {
            self.max_chunk_chars = v;
        }
        if let Some(v) = env_number::<u32>("CLONER_CROSSFADE_MS")? {
            self.crossfade_ms = v;
        }
        if let Some(v) = env_number::<f32>("CLONER_SILENCE_THRESH_DB")? {
            self.silence.threshold_db = v;
        }
        if let Some(v) = env_number::<u32>("CLONER_MIN_SILENCE_LEN_MS")? {
            self.silence.min_silence_len_ms = v;
        }
        if let Some(v) = env_number::<u32>("CLONER_KEEP_SILENCE_MS")? {
            self.silence.keep_silence_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Проверить корректность конфигурации
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(CloneError::Configuration("max_chunk_chars must be positive".to_string()));
        }
        if self.default_language.trim().is_empty() {
            return Err(CloneError::Configuration("default_language must not be empty".to_string()));
        }
        self.silence
            .validate()
            .map_err(|e| CloneError::Configuration(e.to_string()))?;
        self.generation
            .validate()
            .map_err(|e| CloneError::Configuration(e.to_string()))
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CloneError::Configuration(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
