//! Поиск и проверка референсного аудио
//!
//! Цепочка запасных путей сделана явной функцией с типизированным
//! результатом, чтобы ее можно было проверить отдельно от конвейера.

use std::path::{Path, PathBuf};
use path_clean::PathClean;
use walkdir::WalkDir;
use crate::error::{CloneError, Result};

/// Результат поиска референса
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceLookup {
    /// Найден существующий файл
    Found(PathBuf),
    /// Ни один кандидат не подошел
    NotFound {
        /// Проверенные пути в порядке проверки
        tried: Vec<PathBuf>,
    },
}

impl ReferenceLookup {
    /// Путь к найденному файлу или ошибка `ReferenceNotFound`
    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            Self::Found(path) => Ok(path),
            Self::NotFound { tried } if tried.is_empty() => Err(CloneError::ReferenceNotFound(
                "no reference audio given and none found".to_string(),
            )),
            Self::NotFound { tried } => Err(CloneError::ReferenceNotFound(
                tried
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

/// Найти референсное аудио
///
/// Порядок кандидатов:
/// 1. запрошенный путь, а если его нет, путь по умолчанию;
/// 2. файл с тем же именем в `search_dir`;
/// 3. первый по имени `*.wav` в `search_dir`, только если путь не был запрошен явно.
pub fn resolve_reference(
    requested: Option<&Path>,
    default: Option<&Path>,
    search_dir: &Path,
) -> ReferenceLookup {
    let mut tried: Vec<PathBuf> = Vec::new();

    if let Some(primary) = requested.or(default) {
        let primary = primary.clean();
        if primary.is_file() {
            return ReferenceLookup::Found(primary);
        }
        tried.push(primary.clone());

        if let Some(name) = primary.file_name() {
            let candidate = search_dir.join(name).clean();
            if !tried.contains(&candidate) {
                if candidate.is_file() {
                    log::info!("Reference {} not found, using {}", primary.display(), candidate.display());
                    return ReferenceLookup::Found(candidate);
                }
                tried.push(candidate);
            }
        }
    }

    if requested.is_none() {
        if let Some(candidate) = first_wav_in(search_dir) {
            log::info!("Using first available reference {}", candidate.display());
            return ReferenceLookup::Found(candidate);
        }
        tried.push(search_dir.join("*.wav").clean());
    }

    ReferenceLookup::NotFound { tried }
}

fn first_wav_in(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
}

/// Проверить, что референс существует и не слишком мал
///
/// Возвращает размер файла в байтах.
pub fn validate_reference(path: &Path, min_bytes: u64) -> Result<u64> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| CloneError::ReferenceNotFound(path.display().to_string()))?;
    if !metadata.is_file() {
        return Err(CloneError::ReferenceNotFound(format!("{} is not a file", path.display())));
    }

    let size = metadata.len();
    if size < min_bytes {
        return Err(CloneError::ReferenceInvalid(format!(
            "{} is only {} bytes, at least {} expected",
            path.display(),
            size,
            min_bytes
        )));
    }

    log::debug!("Reference audio {} ({} bytes)", path.display(), size);
    Ok(size)
}
