//! Модуль для работы с аудио
//!
//! Аудио хранится в памяти как чередующиеся семплы `f32` в диапазоне
//! [-1.0, 1.0]. WAV читается и пишется через hound, остальные форматы
//! декодируются symphonia. Запись в форматы, отличные от WAV, выполняется
//! через FFmpeg.

use std::fs::File;
use std::path::Path;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use crate::error::{CloneError, Result};
use crate::utils::ffmpeg::convert_audio;

/// Аудио сегмент в памяти
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Чередующиеся семплы всех каналов
    samples: Vec<f32>,
    /// Частота дискретизации в Гц
    sample_rate: u32,
    /// Количество каналов
    channels: u16,
}

impl AudioSegment {
    /// Создать сегмент из чередующихся семплов
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let mut samples = samples;
        // Неполный последний кадр отбрасывается
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);

        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Тишина заданной длительности
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = ms_to_frames(duration_ms, sample_rate);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Семплы
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Забрать семплы
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Частота дискретизации
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Количество каналов
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Пустой ли сегмент
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Длительность в миллисекундах
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Длительность в секундах
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Перевести миллисекунды в кадры для частоты этого сегмента
    pub fn ms_to_frames(&self, ms: u64) -> usize {
        ms_to_frames(ms, self.sample_rate)
    }

    /// Кадр с указанным индексом
    pub fn frame(&self, index: usize) -> &[f32] {
        let channels = self.channels as usize;
        &self.samples[index * channels..(index + 1) * channels]
    }

    /// Копия диапазона кадров, границы ограничиваются длиной сегмента
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioSegment {
        let frames = self.frames();
        let start = start.min(frames);
        let end = end.clamp(start, frames);
        let channels = self.channels as usize;

        AudioSegment {
            samples: self.samples[start * channels..end * channels].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// Перевести миллисекунды в кадры
///
/// Результат насыщается на `usize::MAX`.
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    let frames = ms as u128 * sample_rate as u128 / 1000;
    usize::try_from(frames).unwrap_or(usize::MAX)
}

/// Декодировать аудиофайл
///
/// WAV читается через hound, MP3, M4A, AAC, FLAC и OGG через symphonia.
/// Каналы не сводятся: сегмент сохраняет раскладку исходного файла.
pub fn decode_audio_file<P: AsRef<Path>>(file_path: P) -> Result<AudioSegment> {
    let file_path = file_path.as_ref();
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "wav" => decode_wav_file(file_path),
        "mp3" | "m4a" | "aac" | "flac" | "ogg" => decode_compressed_file(file_path, &extension),
        _ => Err(CloneError::AudioProcessing(format!(
            "Unsupported audio format: {}",
            file_path.display()
        ))),
    }
}

/// Декодировать WAV-файл
pub fn decode_wav_file<P: AsRef<Path>>(file_path: P) -> Result<AudioSegment> {
    let mut reader = WavReader::open(file_path.as_ref())?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|s| s as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8_388_608.0))
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2_147_483_648.0))
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        _ => {
            return Err(CloneError::AudioProcessing(format!(
                "Unsupported WAV format: {:?}, {} bits",
                spec.sample_format, spec.bits_per_sample
            )));
        }
    };

    log::debug!(
        "Decoded {} samples from {} ({} Hz, {} channels)",
        samples.len(),
        file_path.as_ref().display(),
        spec.sample_rate,
        spec.channels
    );
    Ok(AudioSegment::new(samples, spec.sample_rate, spec.channels))
}

fn decode_compressed_file(file_path: &Path, extension: &str) -> Result<AudioSegment> {
    let file = File::open(file_path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| CloneError::AudioProcessing(format!("Failed to probe audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CloneError::AudioProcessing("No audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CloneError::AudioProcessing(format!("Failed to create decoder: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);
    let mut samples = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in {}: {}", file_path.display(), e);
            }
            Err(e) => {
                return Err(CloneError::AudioProcessing(format!("Failed to decode audio: {}", e)));
            }
        }
    }

    log::debug!(
        "Decoded {} samples from {} ({} Hz, {} channels)",
        samples.len(),
        file_path.display(),
        sample_rate,
        channels
    );
    Ok(AudioSegment::new(samples, sample_rate, channels))
}

/// Записать сегмент в WAV (16 бит PCM)
pub fn encode_wav<P: AsRef<Path>>(segment: &AudioSegment, output_path: P) -> Result<()> {
    let spec = WavSpec {
        channels: segment.channels(),
        sample_rate: segment.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(output_path.as_ref(), spec)?;
    for &sample in segment.samples() {
        let value = (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;

    log::debug!(
        "Saved WAV file {} ({} ms, {} Hz)",
        output_path.as_ref().display(),
        segment.duration_ms(),
        segment.sample_rate()
    );
    Ok(())
}

/// Записать сегмент в формат, определяемый расширением пути
///
/// Для WAV запись прямая, для остальных форматов сегмент сначала пишется во
/// временный WAV рядом с целевым файлом и перекодируется FFmpeg.
pub fn export_audio<P: AsRef<Path>>(segment: &AudioSegment, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    if is_wav_path(output_path) {
        return encode_wav(segment, output_path);
    }

    let dir = output_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let intermediate = tempfile::Builder::new()
        .prefix(".voice-cloner-")
        .suffix(".wav")
        .tempfile_in(dir)?;
    encode_wav(segment, intermediate.path())?;
    convert_audio(intermediate.path(), output_path)
}

/// Обрезать начало и конец сегмента
///
/// Возвращает `None`, если обрезка удалила бы все аудио.
pub fn trim_segment(segment: &AudioSegment, start_ms: u64, end_ms: u64) -> Option<AudioSegment> {
    let start = segment.ms_to_frames(start_ms);
    let end_trim = segment.ms_to_frames(end_ms);
    let frames = segment.frames();

    if start.saturating_add(end_trim) >= frames {
        return None;
    }
    Some(segment.slice_frames(start, frames - end_trim))
}

/// Имеет ли путь расширение WAV
pub fn is_wav_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}
