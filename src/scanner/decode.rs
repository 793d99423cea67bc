//! QR decode collaborator boundary.
//!
//! Decoding is delegated entirely to `rqrr`; this module only adapts a
//! [`Frame`] into its input shape. Per-frame decode failures are the
//! expected steady state while scanning and produce no signal at all.

use crate::camera::Frame;

pub trait Decode: Send {
    /// Attempt to locate and decode one QR payload in the frame.
    fn decode(&mut self, frame: &Frame) -> Option<String>;
}

pub struct RqrrDecoder;

impl Decode for RqrrDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        if width == 0 || height == 0 || frame.luma.len() < width * height {
            return None;
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            frame.luma[y * width + x]
        });

        for grid in prepared.detect_grids() {
            if let Ok((_meta, content)) = grid.decode() {
                return Some(content);
            }
        }
        None
    }
}
