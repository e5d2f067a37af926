//! Рабочая директория для промежуточных файлов фрагментов

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use crate::error::Result;

/// Временные файлы одного запроса
///
/// Каждый запрос получает собственную директорию, поэтому параллельные
/// запросы не пересекаются по именам файлов.
pub struct ChunkWorkspace {
    /// Временная директория
    temp_dir: Option<TempDir>,
    /// Выданные пути
    files: Vec<PathBuf>,
    /// Удалять ли файлы при завершении
    cleanup: bool,
}

impl ChunkWorkspace {
    /// Создать рабочую директорию
    pub fn new(cleanup: bool) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("voice-cloner-").tempdir()?;
        log::debug!("Created chunk workspace {}", temp_dir.path().display());

        Ok(Self {
            temp_dir: Some(temp_dir),
            files: Vec::new(),
            cleanup,
        })
    }

    /// Путь для аудио фрагмента с указанным индексом
    ///
    /// Файл не создается: его записывает модель синтеза.
    pub fn chunk_path(&mut self, index: usize) -> PathBuf {
        self.reserve(&format!("chunk_{:04}", index), "wav")
    }

    fn reserve(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        let path = self.path().join(file_name);
        self.files.push(path.clone());
        path
    }

    /// Путь к временной директории
    pub fn path(&self) -> &Path {
        match &self.temp_dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Выданные пути в порядке выдачи
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Удалить промежуточные файлы
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleanup {
            for file in &self.files {
                if file.exists() {
                    fs::remove_file(file)?;
                }
            }
            self.files.clear();
        }

        Ok(())
    }
}

impl Drop for ChunkWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("Failed to remove chunk files: {}", e);
        }
        if !self.cleanup {
            if let Some(dir) = self.temp_dir.take() {
                let kept = dir.keep();
                log::info!("Keeping chunk files in {}", kept.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_unique_and_not_created() {
        let mut workspace = ChunkWorkspace::new(true).unwrap();
        let first = workspace.chunk_path(0);
        let second = workspace.chunk_path(0);

        assert_ne!(first, second);
        assert!(first.starts_with(workspace.path()));
        assert!(!first.exists());
        assert_eq!(workspace.files().len(), 2);
    }

    #[test]
    fn test_cleanup_on_drop() {
        let mut workspace = ChunkWorkspace::new(true).unwrap();
        let path = workspace.chunk_path(1);
        fs::write(&path, b"data").unwrap();
        let dir = workspace.path().to_path_buf();

        drop(workspace);
        assert!(!path.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_files_kept_when_cleanup_disabled() {
        let mut workspace = ChunkWorkspace::new(false).unwrap();
        let path = workspace.chunk_path(2);
        fs::write(&path, b"data").unwrap();
        let dir = workspace.path().to_path_buf();

        drop(workspace);
        assert!(path.exists());
        fs::remove_dir_all(dir).unwrap();
    }
}
