//! Разбиение текста на фрагменты для синтеза
//!
//! Модель синтеза плохо справляется с длинными входами, поэтому текст режется
//! на фрагменты ограниченной длины. Предложения никогда не разрываются:
//! слишком длинное предложение становится отдельным фрагментом целиком.

use lazy_static::lazy_static;
use regex::Regex;
use crate::error::{CloneError, Result};

lazy_static! {
    /// Конец предложения: знак препинания и следующий за ним пробел
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]\s+").unwrap();
}

/// Фрагмент текста для синтеза
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Порядковый номер фрагмента
    pub index: usize,
    /// Текст фрагмента
    pub text: String,
}

impl TextChunk {
    /// Длина фрагмента в символах
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Разбить текст на предложения, сохраняя знаки препинания
///
/// Текст без завершающей пунктуации считается одним предложением.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        // Знаки [.!?] однобайтовые, поэтому граница предложения - сразу после них
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Планировщик фрагментов
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    max_chars: usize,
}

impl ChunkPlanner {
    /// Создать планировщик с максимальной длиной фрагмента в символах
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars: max_chars.max(1) }
    }

    /// Максимальная длина фрагмента
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Разбить текст на упорядоченные фрагменты
    ///
    /// Если весь текст помещается в один фрагмент, возвращается ровно один
    /// фрагмент с исходным текстом, и сшивка не требуется.
    pub fn plan(&self, text: &str) -> Result<Vec<TextChunk>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CloneError::InvalidInput("Text cannot be empty".to_string()));
        }

        if text.chars().count() <= self.max_chars {
            return Ok(vec![TextChunk { index: 0, text: text.to_string() }]);
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if current.is_empty() {
                current = sentence;
                current_len = sentence_len;
            } else if current_len + sentence_len + 1 <= self.max_chars {
                current.push(' ');
                current.push_str(&sentence);
                current_len += sentence_len + 1;
            } else {
                pieces.push(std::mem::take(&mut current));
                current = sentence;
                current_len = sentence_len;
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        for piece in pieces.iter().filter(|p| p.chars().count() > self.max_chars) {
            log::debug!(
                "Sentence of {} chars exceeds chunk limit {}, keeping it intact",
                piece.chars().count(),
                self.max_chars
            );
        }

        log::info!("Split {} chars of text into {} chunks", text.chars().count(), pieces.len());

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextChunk { index, text })
            .collect())
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(250)
    }
}
