//! Capture and recognition capabilities.
//!
//! Real adapters (window capture, the OCR model) live outside the core; the
//! polling loop is written against these traits only.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Screen-space rectangle being monitored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One captured sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<I> {
    /// Region the frame was cut from, when the source knows it. A change
    /// between consecutive frames invalidates the dedup window.
    pub region: Option<Region>,
    pub image: I,
}

impl<I> Frame<I> {
    pub fn new(image: I) -> Self {
        Self {
            region: None,
            image,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

pub trait FrameSource {
    type Image;

    /// `Ok(None)` means nothing to capture this round (e.g. target window missing).
    fn capture_frame(&mut self) -> Result<Option<Frame<Self::Image>>>;
}

pub trait Recognizer<I> {
    /// One-time setup. Failure here is fatal for the polling loop.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Blocking text recognition of one frame.
    fn recognize(&mut self, image: &I) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_validity() {
        assert!(!Region::default().is_valid());
        assert!(Region {
            x: 0,
            y: 0,
            width: 10,
            height: 5
        }
        .is_valid());
    }
}
