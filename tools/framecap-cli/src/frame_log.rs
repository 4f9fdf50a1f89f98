//! JSONL frame log recorder.
//!
//! Stands in for a video encoder: every committed frame becomes one JSON
//! line with its timestamp, size, mean color and a checksum of its pixels,
//! which is enough to check ordering, timing and content of a capture.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use framecap_capture_engine::MediaRecorder;
use framecap_common::error::{FramecapError, FramecapResult};
use serde::{Deserialize, Serialize};

/// First line of a frame log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameLogHeader {
    pub schema_version: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
}

/// One committed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: u64,
    pub timestamp_ns: i64,
    pub width: u32,
    pub height: u32,
    /// Mean RGBA over all pixels, 0-255.
    pub mean_rgba: [f64; 4],
    /// FNV-1a hash of the raw pixel bytes.
    pub checksum: u64,
}

/// Recorder writing a [`FrameRecord`] per frame.
pub struct FrameLogRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
    finished: bool,
}

impl FrameLogRecorder {
    /// Create the log at `path`, truncating an existing file.
    pub fn create(path: &Path, width: u32, height: u32) -> FramecapResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let header = FrameLogHeader {
            schema_version: "1.0".to_string(),
            width,
            height,
            pixel_format: "rgba8_srgb".to_string(),
        };
        writeln!(writer, "# {}", serde_json::to_string(&header)?)?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
            finished: false,
        })
    }

    fn flush(&mut self) -> FramecapResult<()> {
        self.writer
            .flush()
            .map_err(|e| FramecapError::commit(format!("Failed to flush frame log: {e}")))
    }
}

impl MediaRecorder for FrameLogRecorder {
    fn frame_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn commit_frame(&mut self, pixels: &[u8], timestamp: i64) -> FramecapResult<()> {
        if self.finished {
            return Err(FramecapError::commit("frame log already finished"));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if pixels.len() != expected {
            return Err(FramecapError::commit(format!(
                "expected {expected} bytes of RGBA8, got {}",
                pixels.len()
            )));
        }

        let record = FrameRecord {
            index: self.frames_written,
            timestamp_ns: timestamp,
            width: self.width,
            height: self.height,
            mean_rgba: mean_rgba(pixels),
            checksum: fnv1a_64(pixels),
        };
        let json = serde_json::to_string(&record)?;
        writeln!(self.writer, "{json}")
            .map_err(|e| FramecapError::commit(format!("Failed to write frame: {e}")))?;
        self.frames_written += 1;

        if self.frames_written % 100 == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> FramecapResult<()> {
        self.finished = true;
        self.flush()?;
        tracing::info!(
            path = %self.path.display(),
            frames = self.frames_written,
            "Frame log finalized"
        );
        Ok(())
    }
}

impl Drop for FrameLogRecorder {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

fn mean_rgba(pixels: &[u8]) -> [f64; 4] {
    let mut sums = [0u64; 4];
    for px in pixels.chunks_exact(4) {
        for (sum, channel) in sums.iter_mut().zip(px) {
            *sum += u64::from(*channel);
        }
    }
    let count = (pixels.len() / 4).max(1) as f64;
    sums.map(|s| s as f64 / count)
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Parse a frame log, skipping the header and blank lines.
pub fn parse_frame_log(content: &str) -> FramecapResult<Vec<FrameRecord>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| serde_json::from_str(line).map_err(FramecapError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("framecap_test_frame_log");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn writes_header_and_records() {
        let path = temp_path("records.jsonl");
        {
            let mut recorder = FrameLogRecorder::create(&path, 2, 1).unwrap();
            recorder
                .commit_frame(&[255, 0, 0, 255, 0, 0, 255, 255], 0)
                .unwrap();
            recorder
                .commit_frame(&[0, 0, 0, 255, 0, 0, 0, 255], 33_000_000)
                .unwrap();
            recorder.finish().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# "));
        let records = parse_frame_log(&content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mean_rgba, [127.5, 0.0, 127.5, 255.0]);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].timestamp_ns, 33_000_000);
        assert_ne!(records[0].checksum, records[1].checksum);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_wrong_sized_frames() {
        let path = temp_path("wrong_size.jsonl");
        let mut recorder = FrameLogRecorder::create(&path, 4, 4).unwrap();
        assert!(recorder.commit_frame(&[0; 12], 0).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_frames_after_finish() {
        let path = temp_path("finished.jsonl");
        let mut recorder = FrameLogRecorder::create(&path, 1, 1).unwrap();
        recorder.finish().unwrap();
        assert!(recorder.commit_frame(&[0; 4], 0).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn fnv_matches_reference_vector() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }
}
