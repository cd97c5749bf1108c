//! Environment variable overrides.
//!
//! Every variable is read once, on first use. Invalid values are reported on *stderr* and make the
//! process exit with status 1.

use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
    process,
    sync::OnceLock,
};

const ENV_MODEL_DIR: &str = "HANDMARK_MODEL_DIR";
const ENV_WEBCAM_NAME: &str = "HANDMARK_WEBCAM_NAME";
const ENV_JPEG_BACKEND: &str = "HANDMARK_JPEG_BACKEND";

/// Directory the ONNX models are loaded from when `HANDMARK_MODEL_DIR` is unset.
pub const DEFAULT_MODEL_DIR: &str = "3rdparty/onnx";

/// The JPEG decoder used for webcam frames and image files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegBackend {
    /// The `zune-jpeg` crate. Fastest of the pure-Rust decoders.
    ZuneJpeg,
    /// The `jpeg-decoder` crate (through `image`). Slower, but very robust.
    JpegDecoder,
}

impl JpegBackend {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "zune-jpeg" => Some(Self::ZuneJpeg),
            "jpeg-decoder" => Some(Self::JpegDecoder),
            _ => None,
        }
    }
}

/// Reads an environment variable, exiting the process if it is set to a non-Unicode value.
fn var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(s)) => invalid(name, &s.to_string_lossy()),
    }
}

fn invalid(name: &str, value: &str) -> ! {
    eprintln!("invalid value set for `{name}` variable: '{value}'; exiting");
    process::exit(1);
}

/// Returns the directory containing the palm detection and hand landmark models.
///
/// Controlled by `HANDMARK_MODEL_DIR`, defaults to [`DEFAULT_MODEL_DIR`].
pub fn model_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = var(ENV_MODEL_DIR)
            .map_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR), PathBuf::from);
        log::debug!("loading models from {}", dir.display());
        dir
    })
}

/// Returns the webcam name forced by `HANDMARK_WEBCAM_NAME`, if any.
pub fn webcam_name() -> Option<&'static str> {
    static NAME: OnceLock<Option<String>> = OnceLock::new();
    NAME.get_or_init(|| {
        let name = var(ENV_WEBCAM_NAME);
        if let Some(name) = &name {
            log::debug!("webcam override: `{ENV_WEBCAM_NAME}` is set to '{name}'");
        }
        name
    })
    .as_deref()
}

/// Returns the JPEG decoder selected by `HANDMARK_JPEG_BACKEND`.
pub fn jpeg_backend() -> JpegBackend {
    static BACKEND: OnceLock<JpegBackend> = OnceLock::new();
    *BACKEND.get_or_init(|| {
        let backend = match var(ENV_JPEG_BACKEND) {
            Some(value) => {
                JpegBackend::parse(&value).unwrap_or_else(|| invalid(ENV_JPEG_BACKEND, &value))
            }
            None => JpegBackend::ZuneJpeg,
        };
        log::debug!("using JPEG decode backend: {:?}", backend);
        backend
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_jpeg_backend() {
        assert_eq!(JpegBackend::parse("zune-jpeg"), Some(JpegBackend::ZuneJpeg));
        assert_eq!(
            JpegBackend::parse("jpeg-decoder"),
            Some(JpegBackend::JpegDecoder)
        );
        assert_eq!(JpegBackend::parse("mozjpeg"), None);
        assert_eq!(JpegBackend::parse(""), None);
    }
}
