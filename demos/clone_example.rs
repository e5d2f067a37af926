//! Пример клонирования голоса через внешнюю программу синтеза
//!
//! Запуск:
//!
//! ```text
//! cargo run --example clone_example -- <программа синтеза> <референс.wav> "Текст для синтеза"
//! ```
//!
//! Программа синтеза получает параметры в виде JSON на stdin и должна
//! записать WAV по пути из переменной `CLONER_OUTPUT_PATH`.

use std::sync::Arc;
use anyhow::{bail, Context};
use voice_cloner::notification::{CompositeProgressObserver, FileProgressObserver, LogProgressObserver};
use voice_cloner::progress::{DefaultProgressReporter, ProgressReporter};
use voice_cloner::{share, ClonePipeline, ClonerConfig, CommandBackend, SynthesisRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализируем логирование
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: clone_example <synthesis program> <reference.wav> <text> [emotion]");
    }

    let config = match std::env::var("CLONER_CONFIG") {
        Ok(path) => ClonerConfig::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => ClonerConfig::default(),
    }
    .apply_env_overrides()?;

    // Программа синтеза, например обертка над Coqui XTTS
    let backend = share(CommandBackend::new(&args[0]));

    // Наблюдатели прогресса: лог и файл
    let mut composite = CompositeProgressObserver::new();
    composite.add_observer(Box::new(LogProgressObserver::with_prefix("[clone] ")));
    composite.add_observer(Box::new(FileProgressObserver::new("progress.log")));

    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(composite));

    let pipeline = Arc::new(ClonePipeline::with_progress_reporter(config, backend, Box::new(reporter)));

    let mut request = SynthesisRequest::new(args[2].clone(), &args[1]);
    if let Some(emotion) = args.get(3) {
        request = request.with_emotion(emotion.clone());
    }

    match pipeline.run_async(request).await {
        Ok(path) => {
            println!("Готово: {}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("Ошибка ({:?}): {}", e.category(), e);
            Err(e.into())
        }
    }
}
