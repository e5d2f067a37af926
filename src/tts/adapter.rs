//! Разбор текстовых сообщений об ошибках бэкенда
//!
//! Некоторые бэкенды сообщают об отклоненных параметрах только текстом
//! (например, `TypeError: ... got an unexpected keyword argument 'emotion'`).
//! Здесь такие сообщения превращаются в структурированную [`BackendError`],
//! чтобы протокол деградации работал только со списком ключей.

use lazy_static::lazy_static;
use regex::Regex;
use crate::tts::backend::BackendError;

lazy_static! {
    static ref UNEXPECTED_KWARG: Regex =
        Regex::new(r#"unexpected keyword argument ['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).unwrap();
    static ref UNKNOWN_PARAM: Regex =
        Regex::new(r#"(?i)unknown (?:parameter|argument|key|option)\s*:?\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).unwrap();
    static ref UNSUPPORTED_LIST: Regex =
        Regex::new(r"(?i)unsupported (?:parameters?|arguments?|keys?|options?)\s*:\s*([^\n]+)").unwrap();
    static ref KEY_TOKEN: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// Извлечь имена отклоненных параметров из сообщения
///
/// Возвращает пустой список, если сообщение не похоже на отказ от параметров.
pub fn parse_unsupported_keys(message: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut push = |key: &str| {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    };

    for caps in UNEXPECTED_KWARG.captures_iter(message) {
        push(&caps[1]);
    }
    for caps in UNKNOWN_PARAM.captures_iter(message) {
        push(&caps[1]);
    }
    for caps in UNSUPPORTED_LIST.captures_iter(message) {
        for token in KEY_TOKEN.find_iter(&caps[1]) {
            push(token.as_str());
        }
    }

    keys
}

/// Классифицировать текстовое сообщение бэкенда
pub fn classify_backend_message(message: &str) -> BackendError {
    let keys = parse_unsupported_keys(message);
    if keys.is_empty() {
        BackendError::Synthesis(message.trim().to_string())
    } else {
        BackendError::UnsupportedParameter(keys)
    }
}
