//! Набор параметров для вызова модели синтеза
//!
//! Обязательные параметры (текст, референс, язык, путь вывода) хранятся
//! отдельно от необязательных, чтобы протокол деградации мог удалять только
//! последние.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Serialize;

/// Ключ текста
pub const KEY_TEXT: &str = "text";
/// Ключ референсного аудио
pub const KEY_SPEAKER_WAV: &str = "speaker_wav";
/// Ключ языка
pub const KEY_LANGUAGE: &str = "language";
/// Ключ пути вывода
pub const KEY_FILE_PATH: &str = "file_path";

/// Ключи, под которыми передается эмоция: модели понимают разные имена
pub const EMOTION_KEYS: [&str; 3] = ["emotion", "style", "style_name"];
/// Ключ референса стиля
pub const KEY_STYLE_WAV: &str = "style_wav";

/// Необязательные ключи стилизации и генерации, удаляемые на третьем шаге деградации
pub const STYLING_KEYS: [&str; 8] = [
    "emotion",
    "style",
    "style_name",
    "style_wav",
    "temperature",
    "speed",
    "repetition_penalty",
    "length_penalty",
];

/// Значение необязательного параметра
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Строка
    Text(String),
    /// Путь к файлу
    Path(PathBuf),
    /// Число
    Number(f32),
}

/// Параметры одного вызова синтеза
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    text: String,
    reference_audio: PathBuf,
    language: String,
    output_path: PathBuf,
    optional: BTreeMap<String, ParamValue>,
}

impl SynthesisParams {
    /// Создать набор только из обязательных параметров
    pub fn new(
        text: impl Into<String>,
        reference_audio: impl Into<PathBuf>,
        language: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text: text.into(),
            reference_audio: reference_audio.into(),
            language: language.into(),
            output_path: output_path.into(),
            optional: BTreeMap::new(),
        }
    }

    /// Добавить необязательный параметр
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.set(key, value);
        self
    }

    /// Установить необязательный параметр
    ///
    /// Обязательные ключи через этот метод не переопределяются.
    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        if is_core_key(&key) {
            log::warn!("Ignoring attempt to override core parameter '{}'", key);
            return;
        }
        self.optional.insert(key, value);
    }

    /// Передать эмоцию под всеми известными ключами
    pub fn with_emotion(mut self, emotion: &str) -> Self {
        for key in EMOTION_KEYS {
            self.optional.insert(key.to_string(), ParamValue::Text(emotion.to_string()));
        }
        self
    }

    /// Копия параметров для другого фрагмента текста и другого пути вывода
    pub fn for_chunk(&self, text: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            output_path: output_path.into(),
            ..self.clone()
        }
    }

    /// Удалить перечисленные необязательные ключи, вернуть фактически удаленные
    pub fn remove_keys<S: AsRef<str>>(&mut self, keys: &[S]) -> Vec<String> {
        keys.iter()
            .filter_map(|k| self.optional.remove_entry(k.as_ref()).map(|(key, _)| key))
            .collect()
    }

    /// Удалить все ключи стилизации и генерации
    pub fn strip_styling(&mut self) -> Vec<String> {
        self.remove_keys(&STYLING_KEYS)
    }

    /// Оставить только обязательные параметры, язык свести к основному подтегу
    pub fn strip_to_minimal(&mut self) -> Vec<String> {
        let removed: Vec<String> = std::mem::take(&mut self.optional).into_keys().collect();
        self.language = primary_language(&self.language);
        removed
    }

    /// Текст для синтеза
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Путь к референсному аудио
    pub fn reference_audio(&self) -> &Path {
        &self.reference_audio
    }

    /// Код языка
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Путь вывода
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Значение необязательного параметра
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.optional.get(key)
    }

    /// Есть ли необязательный параметр
    pub fn contains(&self, key: &str) -> bool {
        self.optional.contains_key(key)
    }

    /// Имена необязательных параметров в стабильном порядке
    pub fn optional_keys(&self) -> Vec<&str> {
        self.optional.keys().map(String::as_str).collect()
    }

    /// Все параметры в виде JSON-объекта
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(KEY_TEXT.to_string(), self.text.clone().into());
        map.insert(
            KEY_SPEAKER_WAV.to_string(),
            self.reference_audio.to_string_lossy().to_string().into(),
        );
        map.insert(KEY_LANGUAGE.to_string(), self.language.clone().into());
        map.insert(
            KEY_FILE_PATH.to_string(),
            self.output_path.to_string_lossy().to_string().into(),
        );
        for (key, value) in &self.optional {
            map.insert(key.clone(), serde_json::to_value(value).unwrap_or(serde_json::Value::Null));
        }
        serde_json::Value::Object(map)
    }
}

/// Является ли ключ обязательным параметром
pub fn is_core_key(key: &str) -> bool {
    matches!(key, KEY_TEXT | KEY_SPEAKER_WAV | KEY_LANGUAGE | KEY_FILE_PATH)
}

/// Основной подтег языка: "de-DE" -> "de"
fn primary_language(language: &str) -> String {
    language
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or(language)
        .trim()
        .to_lowercase()
}
