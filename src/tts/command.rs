//! Бэкенд синтеза через внешнюю программу
//!
//! Программа получает набор параметров в виде JSON на stdin и путь вывода в
//! переменной окружения `CLONER_OUTPUT_PATH`. Ненулевой код выхода считается
//! ошибкой, текст stderr разбирается адаптером сообщений.

use std::ffi::OsString;
use std::io::Write;
use std::process::{Command, Stdio};
use crate::tts::adapter::classify_backend_message;
use crate::tts::backend::{BackendError, SpeechBackend};
use crate::tts::params::SynthesisParams;

/// Переменная окружения с путем вывода
pub const OUTPUT_PATH_ENV: &str = "CLONER_OUTPUT_PATH";

/// Бэкенд, запускающий внешнюю программу синтеза
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: OsString,
    args: Vec<OsString>,
    name: String,
}

impl CommandBackend {
    /// Создать бэкенд для программы
    pub fn new(program: impl Into<OsString>) -> Self {
        let program = program.into();
        let name = program.to_string_lossy().to_string();
        Self {
            program,
            args: Vec::new(),
            name,
        }
    }

    /// Добавить аргумент командной строки
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Добавить несколько аргументов
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl SpeechBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn synthesize(&mut self, params: &SynthesisParams) -> Result<(), BackendError> {
        let payload = params.to_json().to_string();

        log::debug!("Running synthesis command {} for {} chars", self.name, params.text().chars().count());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(OUTPUT_PATH_ENV, params.output_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Synthesis(format!("Failed to start {}: {}", self.name, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // Программа может не читать stdin, обрыв канала здесь не ошибка
            if let Err(e) = stdin.write_all(payload.as_bytes()) {
                log::debug!("Synthesis command closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| BackendError::Synthesis(format!("Failed to wait for {}: {}", self.name, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::debug!("Synthesis command failed with status {}: {}", output.status, stderr.trim());
            return Err(match classify_backend_message(&stderr) {
                BackendError::Synthesis(message) if message.is_empty() => BackendError::Synthesis(
                    format!("{} exited with status {}", self.name, output.status),
                ),
                other => other,
            });
        }

        if !params.output_path().exists() {
            return Err(BackendError::Synthesis(format!(
                "{} finished but produced no file at {}",
                self.name,
                params.output_path().display()
            )));
        }

        Ok(())
    }
}
