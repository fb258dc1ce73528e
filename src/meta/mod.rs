// src/meta/mod.rs - Pluggable gcode file metadata extraction
pub mod ankerslicer;

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use ankerslicer::AnkerSlicerMeta;

/// Flat property mapping produced by a format loader.
pub type PropMap = BTreeMap<String, Value>;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Embedded preview image; raw bytes serialize as hex text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// Flat per-file metadata handed to the job queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub size: u64,
    pub modified: f64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub slicer: Option<String>,
    #[serde(default)]
    pub slicer_version: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<f64>,
    #[serde(default)]
    pub layer_height: Option<f64>,
    #[serde(default)]
    pub object_height: Option<f64>,
    #[serde(default)]
    pub filament_total: Option<f64>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

/// One per-format property extractor.
///
/// `detect` sniffs the file; `load_props` returns the flat property
/// mapping; `load_metadata` condenses props into `FileMetadata`. "Not
/// this format" is signaled by `detect` returning false or by empty
/// props, never by an error.
pub trait GcodeMeta: Send + Sync {
    fn detect(&self, file: &mut dyn ReadSeek) -> io::Result<bool>;
    fn load_props(&self, file: &mut dyn ReadSeek) -> io::Result<PropMap>;
    fn load_metadata(&self, props: &PropMap) -> FileMetadata;
}

/// First line of the file (capped at 4 KiB), for format sniffing.
pub(crate) fn read_first_line(file: &mut dyn ReadSeek) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0u8; 4096];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if buf[..filled].contains(&b'\n') {
            break;
        }
    }
    buf.truncate(filled);
    if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        buf.truncate(pos + 1);
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(buf)
}

/// Tries each registered loader in order; first `detect` match wins.
pub struct GcodeMetaAuto {
    loaders: Vec<Box<dyn GcodeMeta>>,
}

impl GcodeMetaAuto {
    pub fn new(loaders: Vec<Box<dyn GcodeMeta>>) -> Self {
        Self { loaders }
    }

    /// Loaders shipped with the bridge.
    pub fn builtin() -> Self {
        Self::new(vec![Box::new(AnkerSlicerMeta)])
    }

    pub fn load(&self, file: &mut dyn ReadSeek) -> io::Result<Option<FileMetadata>> {
        for loader in &self.loaders {
            if loader.detect(file)? {
                let props = loader.load_props(file)?;
                return Ok(Some(loader.load_metadata(&props)));
            }
        }
        Ok(None)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
