//! Вспомогательные утилиты: временные файлы фрагментов и вызов FFmpeg

pub mod ffmpeg;
pub mod temp;
