//! Модуль для работы с FFmpeg
//!
//! FFmpeg нужен только для записи результата в форматы, отличные от WAV.

use std::path::Path;
use std::process::Command;
use crate::error::{CloneError, Result};

/// Проверка наличия FFmpeg
pub fn check_ffmpeg_installed() -> bool {
    match Command::new("ffmpeg").arg("-version").output() {
        Ok(output) => output.status.success(),
        Err(e) => {
            log::debug!("FFmpeg is not available: {}", e);
            false
        }
    }
}

/// Запуск команды FFmpeg
pub fn run_ffmpeg_command(args: &[&str]) -> Result<()> {
    log::debug!("Running ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .map_err(|e| CloneError::AudioProcessing(format!("Failed to start ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CloneError::AudioProcessing(format!(
            "FFmpeg command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Перекодировать аудиофайл, формат вывода определяется по расширению
pub fn convert_audio(input: &Path, output: &Path) -> Result<()> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    run_ffmpeg_command(&["-y", "-loglevel", "error", "-i", &input, &output])
}
