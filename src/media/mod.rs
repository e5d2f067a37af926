//! Обработка аудио: декодирование, склейка фрагментов и нормализация пауз

pub mod audio;
pub mod crossfade;
pub mod silence;
