//! Модуль для подготовки текста к синтезу
//!
//! Этот модуль содержит функции для разбиения текста на фрагменты.

pub mod chunker;
