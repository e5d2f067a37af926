//! Синтез речи
//!
//! Здесь собрано все, что касается вызова модели: набор параметров,
//! интерфейс бэкенда, протокол деградации и склейка фрагментов.

pub mod adapter;
pub mod backend;
pub mod command;
pub mod invoker;
pub mod params;
pub mod stitcher;
