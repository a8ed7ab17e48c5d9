use std::path::{Path, PathBuf};

use image::imageops;
use invigil_core::Frame;
use thiserror::Error;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read frame directory: {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no frames found in {path}")]
    NoFrames { path: PathBuf },

    #[error("failed to open replay file: {path}: {source}")]
    ReplayOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read replay file: {path}: {source}")]
    ReplayRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid replay record at {path}:{line}: {source}")]
    ReplayParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Still images from a directory, served in lexical filename order.
///
/// Files that fail to decode are skipped and do not consume a frame index.
pub struct DirectoryFrameSource {
    paths: std::vec::IntoIter<PathBuf>,
    mirror: bool,
    next_index: u64,
    skipped: usize,
}

impl DirectoryFrameSource {
    /// Open the directory. Fails if it cannot be read or holds no images.
    pub fn open(dir: &Path, mirror: bool) -> Result<Self, SourceError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SourceError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(SourceError::NoFrames {
                path: dir.to_path_buf(),
            });
        }
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), mirror, "frame source opened");

        Ok(Self {
            paths: paths.into_iter(),
            mirror,
            next_index: 0,
            skipped: 0,
        })
    }

    /// Files that could not be decoded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for DirectoryFrameSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            let path = self.paths.next()?;
            let mut image = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable frame");
                    self.skipped += 1;
                    continue;
                }
            };

            if self.mirror {
                imageops::flip_horizontal_in_place(&mut image);
            }

            let frame = Frame::new(self.next_index, image);
            self.next_index += 1;
            return Some(frame);
        }
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
