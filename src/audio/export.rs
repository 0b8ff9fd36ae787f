//! Audio mixing and export.
//!
//! Per-speaker capture buffers are realized as temp files inside a scoped
//! working directory, then ffmpeg overlays them (or transcodes the single
//! track) into one mono 16kHz Opus/OGG file. The 12kbps voip profile keeps
//! an hour of speech well under the transcription API's upload limit.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

use crate::services::SourceEncoding;

pub const EXPORT_EXTENSION: &str = "ogg";

/// Outputs below this size signal a processing failure, not silent success.
const MIN_EXPORT_BYTES: u64 = 100;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("recording contained no speaker audio")]
    EmptyRecording,
    #[error("audio export failed: {0}")]
    ExportFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Check if ffmpeg is available on the system.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Combine per-speaker buffers into `<output_base>.ogg`.
///
/// The transcode work runs on a blocking worker so the event loop stays
/// responsive while ffmpeg churns.
pub async fn mix_and_export(
    buffers: HashMap<u64, Vec<u8>>,
    encoding: SourceEncoding,
    output_base: PathBuf,
) -> Result<PathBuf, ExportError> {
    if buffers.is_empty() {
        return Err(ExportError::EmptyRecording);
    }

    tokio::task::spawn_blocking(move || export_blocking(&buffers, encoding, &output_base))
        .await
        .map_err(|e| ExportError::ExportFailed(format!("export worker failed: {e}")))?
}

fn export_blocking(
    buffers: &HashMap<u64, Vec<u8>>,
    encoding: SourceEncoding,
    output_base: &Path,
) -> Result<PathBuf, ExportError> {
    if !ffmpeg_available() {
        return Err(ExportError::ExportFailed(
            "ffmpeg is required for audio export but was not found on PATH".to_string(),
        ));
    }

    let out_path = output_base.with_extension(EXPORT_EXTENSION);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Dropped on every exit path, removing the per-speaker temp files.
    let workdir = tempfile::TempDir::new()?;

    let mut track_paths = Vec::with_capacity(buffers.len());
    for (speaker_id, data) in buffers {
        let track = workdir.path().join(format!("speaker_{speaker_id}.wav"));
        match encoding {
            SourceEncoding::Wav => fs::write(&track, data)?,
            SourceEncoding::Pcm {
                sample_rate,
                channels,
            } => write_pcm_as_wav(&track, data, sample_rate, channels)?,
        }
        track_paths.push(track);
    }
    // Stable input order keeps the ffmpeg invocation deterministic.
    track_paths.sort();

    let args = build_ffmpeg_args(&track_paths, &out_path);
    debug!("Running ffmpeg with {} input track(s)", track_paths.len());

    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .map_err(|e| ExportError::ExportFailed(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExportError::ExportFailed(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let size = fs::metadata(&out_path).map(|m| m.len()).unwrap_or(0);
    if size < MIN_EXPORT_BYTES {
        let _ = fs::remove_file(&out_path);
        return Err(ExportError::ExportFailed(format!(
            "output file too small: {size} bytes"
        )));
    }

    info!("Exported mixed audio: {:?} ({} bytes)", out_path, size);
    Ok(out_path)
}

/// ffmpeg argument list: one `-i` per track, an `amix` overlay when more
/// than one speaker contributed, and the mono/16kHz/Opus output settings.
fn build_ffmpeg_args(track_paths: &[PathBuf], out_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    for track in track_paths {
        args.push("-i".into());
        args.push(track.into());
    }

    if track_paths.len() > 1 {
        let inputs: String = (0..track_paths.len()).map(|i| format!("[{i}:a]")).collect();
        let filter = format!(
            "{inputs}amix=inputs={}:duration=longest:dropout_transition=2[mixed]",
            track_paths.len()
        );
        args.push("-filter_complex".into());
        args.push(filter.into());
        args.push("-map".into());
        args.push("[mixed]".into());
    }

    for arg in [
        "-ac", "1", "-ar", "16000", "-c:a", "libopus", "-b:a", "12k", "-application", "voip",
    ] {
        args.push(arg.into());
    }
    args.push(out_path.into());

    args
}

/// Wrap raw interleaved 16-bit LE PCM into a WAV container.
fn write_pcm_as_wav(
    path: &Path,
    data: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<(), ExportError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| ExportError::ExportFailed(e.to_string()))?;
    for chunk in data.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        writer
            .write_sample(sample)
            .map_err(|e| ExportError::ExportFailed(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| ExportError::ExportFailed(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pcm_sine(seconds: u32, sample_rate: u32) -> Vec<u8> {
        let total = (seconds * sample_rate) as usize;
        let mut data = Vec::with_capacity(total * 2);
        for n in 0..total {
            let t = n as f32 / sample_rate as f32;
            let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16;
            data.extend_from_slice(&sample.to_le_bytes());
        }
        data
    }

    #[tokio::test]
    async fn test_empty_buffers_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("out");

        let result = mix_and_export(HashMap::new(), SourceEncoding::Wav, base).await;

        assert!(matches!(result, Err(ExportError::EmptyRecording)));
        // Nothing may have been created next to the requested output.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_single_track_args_have_no_mix_filter() {
        let tracks = vec![PathBuf::from("/tmp/work/speaker_1.wav")];
        let args = build_ffmpeg_args(&tracks, Path::new("/tmp/out.ogg"));

        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!rendered.iter().any(|a| a.contains("amix")));
        assert_eq!(rendered.iter().filter(|a| *a == "-i").count(), 1);
        assert!(rendered.contains(&"libopus".to_string()));
        assert!(rendered.contains(&"voip".to_string()));
    }

    #[test]
    fn test_multi_track_args_mix_all_inputs() {
        let tracks = vec![
            PathBuf::from("/tmp/work/speaker_1.wav"),
            PathBuf::from("/tmp/work/speaker_2.wav"),
            PathBuf::from("/tmp/work/speaker_3.wav"),
        ];
        let args = build_ffmpeg_args(&tracks, Path::new("/tmp/out.ogg"));

        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rendered.iter().filter(|a| *a == "-i").count(), 3);

        let filter = rendered
            .iter()
            .find(|a| a.contains("amix"))
            .expect("multi-track export must mix");
        assert!(filter.contains("amix=inputs=3"));
        assert!(filter.contains("duration=longest"));
        assert!(filter.starts_with("[0:a][1:a][2:a]"));
    }

    #[test]
    fn test_write_pcm_as_wav_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.wav");
        let data = pcm_sine(1, 16000);

        write_pcm_as_wav(&path, &data, 16000, 1).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(reader.len() as usize, data.len() / 2);
    }

    #[tokio::test]
    async fn test_single_speaker_export() {
        if !ffmpeg_available() {
            eprintln!("Skipping: ffmpeg not installed");
            return;
        }

        let dir = TempDir::new().unwrap();
        let base = dir.path().join("recording_123");
        let mut buffers = HashMap::new();
        buffers.insert(1001, pcm_sine(2, 16000));

        let out = mix_and_export(
            buffers,
            SourceEncoding::Pcm {
                sample_rate: 16000,
                channels: 1,
            },
            base,
        )
        .await
        .unwrap();

        assert_eq!(out.extension().unwrap(), EXPORT_EXTENSION);
        assert!(fs::metadata(&out).unwrap().len() >= 100);
    }

    #[tokio::test]
    async fn test_two_speaker_export() {
        if !ffmpeg_available() {
            eprintln!("Skipping: ffmpeg not installed");
            return;
        }

        let dir = TempDir::new().unwrap();
        let base = dir.path().join("recording_456");
        let mut buffers = HashMap::new();
        buffers.insert(1001, pcm_sine(2, 16000));
        buffers.insert(1002, pcm_sine(1, 16000));

        let out = mix_and_export(
            buffers,
            SourceEncoding::Pcm {
                sample_rate: 16000,
                channels: 1,
            },
            base,
        )
        .await
        .unwrap();

        assert_eq!(out.extension().unwrap(), EXPORT_EXTENSION);
        assert!(fs::metadata(&out).unwrap().len() >= 100);
    }
}
