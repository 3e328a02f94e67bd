//! File-backed capture: an external OCR step keeps writing its latest
//! recognized text to a file, and every sample re-reads it.

use std::fs;
use std::path::PathBuf;
use watcher_core::{Frame, FrameSource, Recognizer, WatcherError};

pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for TextFileSource {
    type Image = String;

    fn capture_frame(&mut self) -> watcher_core::Result<Option<Frame<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(|text| Some(Frame::new(text)))
            .map_err(|e| WatcherError::Capture(format!("{}: {e}", self.path.display())))
    }
}

/// The frame already is text.
pub struct PassThrough;

impl Recognizer<String> for PassThrough {
    fn recognize(&mut self, image: &String) -> watcher_core::Result<String> {
        Ok(image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_sample() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = TextFileSource::new(dir.path().join("ocr.txt"));
        assert!(src.capture_frame().unwrap().is_none());
    }

    #[test]
    fn reads_latest_contents_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocr.txt");
        let mut src = TextFileSource::new(&path);

        std::fs::write(&path, "第一行").unwrap();
        let frame = src.capture_frame().unwrap().unwrap();
        assert_eq!(PassThrough.recognize(&frame.image).unwrap(), "第一行");

        std::fs::write(&path, "第二行").unwrap();
        assert_eq!(src.capture_frame().unwrap().unwrap().image, "第二行");
    }

    #[test]
    fn unreadable_path_is_a_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = TextFileSource::new(dir.path());
        assert!(matches!(src.capture_frame(), Err(WatcherError::Capture(_))));
    }
}
