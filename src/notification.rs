//! Наблюдатели прогресса
//!
//! Конкретные реализации [`ProgressObserver`] для логов, файлов, каналов
//! Tokio и пользовательских функций.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use crate::progress::{ProgressInfo, ProgressObserver};

fn format_progress(progress: &ProgressInfo) -> String {
    let details = progress.details.as_deref().unwrap_or("");
    format!(
        "Шаг: {}, Прогресс шага: {:.1}%, Общий прогресс: {:.1}%{}",
        progress.step,
        progress.step_progress,
        progress.total_progress,
        if details.is_empty() { String::new() } else { format!(", Детали: {}", details) }
    )
}

/// Наблюдатель, пишущий прогресс в лог
pub struct LogProgressObserver {
    /// Префикс сообщений
    prefix: Option<String>,
}

impl LogProgressObserver {
    /// Создать новый экземпляр LogProgressObserver
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Создать наблюдатель с префиксом сообщений
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        log::info!("{}[Прогресс] {}", prefix, format_progress(&progress));
    }
}

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    /// История обновлений прогресса
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    /// Создать новый экземпляр MemoryProgressObserver
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Названия этапов в порядке первого появления
    pub fn steps(&self) -> Vec<String> {
        let mut steps: Vec<String> = Vec::new();
        for info in self.history.lock().iter() {
            if steps.last() != Some(&info.step) {
                steps.push(info.step.clone());
            }
        }
        steps
    }

    /// Очистить историю обновлений прогресса
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, дописывающий прогресс в файл
pub struct FileProgressObserver {
    /// Путь к файлу
    file_path: PathBuf,
}

impl FileProgressObserver {
    /// Создать новый экземпляр FileProgressObserver
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            format_progress(&progress)
        );

        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(e) = written {
            log::warn!("Failed to write progress to {}: {}", self.file_path.display(), e);
        }
    }
}

/// Наблюдатель, отправляющий прогресс в канал Tokio
///
/// Отправка не блокирует: если получатель не успевает, обновление теряется.
pub struct ChannelProgressObserver {
    /// Отправитель для канала
    sender: mpsc::Sender<ProgressInfo>,
}

impl ChannelProgressObserver {
    /// Создать новый экземпляр ChannelProgressObserver
    pub fn new(sender: mpsc::Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if let Err(e) = self.sender.try_send(progress) {
            log::debug!("Dropping progress update: {}", e);
        }
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова при обновлении прогресса
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    /// Функция обратного вызова
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    /// Создать новый экземпляр CallbackProgressObserver
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Комбинированный наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeProgressObserver {
    /// Список наблюдателей
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    /// Создать новый экземпляр CompositeProgressObserver
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    /// Удалить всех наблюдателей
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}
