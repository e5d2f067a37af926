//! Модуль для отслеживания прогресса выполнения операций
//!
//! Этот модуль предоставляет реализацию паттерна Observer для отслеживания
//! прогресса клонирования голоса: проверки входных данных, синтеза
//! фрагментов, склейки и нормализации пауз.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения всей операции (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    /// Создает новый экземпляр ProgressInfo
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает уникальный идентификатор наблюдателя, который можно
    /// использовать для его удаления.
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Реализация ProgressReporter по умолчанию
pub struct DefaultProgressReporter {
    /// Наблюдатели
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    /// Счетчик для генерации идентификаторов наблюдателей
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    /// Создать новый экземпляр DefaultProgressReporter
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        let observers = self.observers.read();
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы клонирования голоса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Проверка текста, параметров и референсного аудио
    Validation,
    /// Разбиение текста на фрагменты
    ChunkPlanning,
    /// Синтез фрагментов
    Synthesis,
    /// Склейка фрагментов
    Stitching,
    /// Нормализация пауз
    SilenceNormalization,
    /// Обрезка и завершение
    Finalizing,
}

impl ProcessStep {
    /// Все этапы в порядке выполнения
    pub const ALL: [ProcessStep; 6] = [
        Self::Validation,
        Self::ChunkPlanning,
        Self::Synthesis,
        Self::Stitching,
        Self::SilenceNormalization,
        Self::Finalizing,
    ];

    /// Получить название этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "Проверка входных данных",
            Self::ChunkPlanning => "Разбиение текста на фрагменты",
            Self::Synthesis => "Синтез речи",
            Self::Stitching => "Склейка фрагментов",
            Self::SilenceNormalization => "Нормализация пауз",
            Self::Finalizing => "Завершение",
        }
    }

    /// Получить весовой коэффициент этапа (в процентах от общего процесса)
    pub fn weight(&self) -> f32 {
        match self {
            Self::Validation => 5.0,
            Self::ChunkPlanning => 5.0,
            Self::Synthesis => 70.0,
            Self::Stitching => 10.0,
            Self::SilenceNormalization => 5.0,
            Self::Finalizing => 5.0,
        }
    }
}

struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn new() -> Self {
        Self {
            current_step: ProcessStep::Validation,
            step_progress: 0.0,
            total_progress: 0.0,
            completed_steps: HashMap::new(),
        }
    }

    fn recompute_total(&mut self) {
        let completed: f32 = self
            .completed_steps
            .iter()
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        let current = self.current_step.weight() * self.step_progress / 100.0;
        self.total_progress = (completed + current).clamp(0.0, 100.0);
    }
}

/// Трекер прогресса для отслеживания выполнения процесса
pub struct ProgressTracker {
    /// Репортер прогресса
    reporter: Option<Box<dyn ProgressReporter>>,
    /// Состояние текущего запуска
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    /// Создать новый экземпляр ProgressTracker
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState::new()),
        }
    }

    /// Создать новый экземпляр ProgressTracker с репортером
    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            state: RwLock::new(TrackerState::new()),
        }
    }

    /// Установить репортер прогресса
    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя
    ///
    /// Если репортер не установлен, создается репортер по умолчанию.
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter
            .get_or_insert_with(|| Box::new(DefaultProgressReporter::new()))
            .add_observer(observer)
    }

    /// Сбросить состояние перед новым запуском
    pub fn reset(&self) {
        *self.state.write() = TrackerState::new();
    }

    /// Установить текущий этап
    ///
    /// Предыдущий этап считается завершенным на 100%.
    pub fn set_step(&self, step: ProcessStep) {
        let snapshot = {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            state.recompute_total();
            Self::snapshot(&state, None)
        };
        self.report(snapshot);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let snapshot = {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recompute_total();
            Self::snapshot(&state, details)
        };
        self.report(snapshot);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        let snapshot = {
            let mut state = self.state.write();
            for step in ProcessStep::ALL {
                state.completed_steps.insert(step, 100.0);
            }
            state.step_progress = 100.0;
            state.total_progress = 100.0;
            Self::snapshot(&state, Some("Процесс завершен".to_string()))
        };
        self.report(snapshot);
    }

    /// Текущий общий прогресс
    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    fn snapshot(state: &TrackerState, details: Option<String>) -> ProgressInfo {
        ProgressInfo::new(
            state.current_step.as_str(),
            state.step_progress,
            state.total_progress,
            details,
        )
    }

    fn report(&self, progress: ProgressInfo) {
        if let Some(reporter) = &self.reporter {
            reporter.notify_progress(progress);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
