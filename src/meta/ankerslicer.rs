// src/meta/ankerslicer.rs - AnkerSlicer gcode property extraction
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use serde_json::Value;

use super::{read_first_line, FileMetadata, GcodeMeta, PropMap, ReadSeek, Thumbnail};

const DETECT_MARKER: &[u8] = b";Recompiled by AnkerMake";

// Properties live in the file's comment header and in a base64 parameter
// block near the end; 32 KiB from each side covers both without slurping
// multi-hundred-MiB prints.
const HEAD_SIZE: u64 = 32 * 1024;
const TAIL_SIZE: u64 = 32 * 1024;

static RE_THUMB_BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^; thumbnail begin (\d+) (\d+)").expect("pattern compiles"));

pub struct AnkerSlicerMeta;

/// Header values are JSON-ish: numbers, quoted strings, bracketed lists.
/// Anything that fails to parse stays a plain string.
fn parse_prop(raw: &str) -> Value {
    let mut val = raw;
    if val.starts_with("\"[") && val.ends_with("]\"") {
        val = &val[1..val.len() - 1];
    }
    serde_json::from_str(val).unwrap_or_else(|_| Value::String(val.to_string()))
}

/// Base64 decode tolerating interleaved comment characters.
fn decode_b64_loose(text: &str) -> Option<Vec<u8>> {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    base64::engine::general_purpose::STANDARD.decode(filtered).ok()
}

fn parse_head(data: &[u8], props: &mut PropMap) {
    let mut thumbs: Vec<Thumbnail> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut pending_size: Option<(u32, u32)> = None;

    for raw in data.split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        if !line.starts_with(';') {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key[1..].to_lowercase().replace(' ', "_");
            props.insert(format!("_{key}"), parse_prop(value.trim()));
        } else if let Some(caps) = RE_THUMB_BEGIN.captures(line) {
            pending.clear();
            pending_size = caps[1]
                .parse()
                .ok()
                .zip(caps[2].parse().ok());
        } else if line.starts_with("; thumbnail end") {
            if let (Some((width, height)), Some(data)) =
                (pending_size.take(), decode_b64_loose(&pending.join("")))
            {
                thumbs.push(Thumbnail { width, height, data });
            }
            pending.clear();
        } else {
            pending.push(line.to_string());
        }
    }

    for (index, thumb) in thumbs.into_iter().enumerate() {
        props.insert(
            format!("__thumb_{index}"),
            serde_json::json!({
                "width": thumb.width,
                "height": thumb.height,
                "data": hex::encode(&thumb.data),
            }),
        );
    }
}

fn parse_tail(data: &[u8], props: &mut PropMap) {
    let Some(start) = find(data, b";paramBegin") else {
        return;
    };
    let after = &data[start + b";paramBegin".len()..];
    let Some(end) = find(after, b";paramEnd") else {
        return;
    };

    let block = String::from_utf8_lossy(&after[..end]).replace("\r\n;", "");
    let Some(decoded) = decode_b64_loose(&block) else {
        return;
    };

    for line in String::from_utf8_lossy(&decoded).lines() {
        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.to_string(), parse_prop(value));
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn prop_f64(props: &PropMap, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match props.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn prop_str(props: &PropMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match props.get(*key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    })
}

impl GcodeMeta for AnkerSlicerMeta {
    fn detect(&self, file: &mut dyn ReadSeek) -> io::Result<bool> {
        let line = read_first_line(file)?;
        Ok(line
            .windows(DETECT_MARKER.len())
            .any(|w| w == DETECT_MARKER))
    }

    fn load_props(&self, file: &mut dyn ReadSeek) -> io::Result<PropMap> {
        let size = file.seek(SeekFrom::End(0))?;
        let mut props = PropMap::new();

        if size > HEAD_SIZE + TAIL_SIZE {
            let mut head = vec![0; HEAD_SIZE as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut head)?;

            let mut tail = vec![0; TAIL_SIZE as usize];
            file.seek(SeekFrom::End(-(TAIL_SIZE as i64)))?;
            file.read_exact(&mut tail)?;

            parse_head(&head, &mut props);
            parse_tail(&tail, &mut props);
        } else {
            let mut data = Vec::with_capacity(size as usize);
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut data)?;

            parse_head(&data, &mut props);
            parse_tail(&data, &mut props);
        }

        Ok(props)
    }

    fn load_metadata(&self, props: &PropMap) -> FileMetadata {
        let mut md = FileMetadata {
            slicer: Some("AnkerSlicer".to_string()),
            slicer_version: prop_str(props, &["_version", "version"]),
            estimated_time: prop_f64(props, &["_print_time", "estimate_time", "print_time"]),
            layer_height: prop_f64(props, &["_layer_height", "layer_height"]),
            object_height: prop_f64(props, &["_max_z_height", "max_z_height"]),
            filament_total: prop_f64(props, &["_filament_used", "filament_used"]),
            ..Default::default()
        };

        for index in 0.. {
            let Some(Value::Object(thumb)) = props.get(&format!("__thumb_{index}")) else {
                break;
            };
            let data = thumb
                .get("data")
                .and_then(Value::as_str)
                .and_then(|s| hex::decode(s).ok())
                .unwrap_or_default();
            md.thumbnails.push(Thumbnail {
                width: thumb.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
                height: thumb.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
                data,
            });
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_file() -> Cursor<Vec<u8>> {
        let thumb_b64 = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        let params = base64::engine::general_purpose::STANDARD
            .encode("machine_name=M5\nfilament_used=1234.5\n");
        let text = format!(
            ";Recompiled by AnkerMake\n\
             ;Layer Height: 0.2\n\
             ;Print Time: 3780\n\
             ;Max Z Height: 42.5\n\
             ; thumbnail begin 16 16\n\
             ; {thumb_b64}\n\
             ; thumbnail end\n\
             G28\nG1 X10 Y10\n\
             ;paramBegin{params};paramEnd\n"
        );
        Cursor::new(text.into_bytes())
    }

    #[test]
    fn test_detect_by_first_line() {
        let meta = AnkerSlicerMeta;
        assert!(meta.detect(&mut sample_file()).unwrap());
        assert!(!meta
            .detect(&mut Cursor::new(b"; generated by PrusaSlicer\n".to_vec()))
            .unwrap());
    }

    #[test]
    fn test_header_props_and_thumbnail() {
        let meta = AnkerSlicerMeta;
        let props = meta.load_props(&mut sample_file()).unwrap();

        assert_eq!(props["_layer_height"], serde_json::json!(0.2));
        assert_eq!(props["_print_time"], serde_json::json!(3780));
        assert_eq!(props["__thumb_0"]["data"], "01020304");
    }

    #[test]
    fn test_tail_param_block() {
        let meta = AnkerSlicerMeta;
        let props = meta.load_props(&mut sample_file()).unwrap();
        assert_eq!(props["machine_name"], serde_json::json!("M5"));
        assert_eq!(props["filament_used"], serde_json::json!(1234.5));
    }

    #[test]
    fn test_metadata_condenses_props() {
        let meta = AnkerSlicerMeta;
        let props = meta.load_props(&mut sample_file()).unwrap();
        let md = meta.load_metadata(&props);

        assert_eq!(md.slicer.as_deref(), Some("AnkerSlicer"));
        assert_eq!(md.layer_height, Some(0.2));
        assert_eq!(md.estimated_time, Some(3780.0));
        assert_eq!(md.object_height, Some(42.5));
        assert_eq!(md.filament_total, Some(1234.5));
        assert_eq!(md.thumbnails.len(), 1);
        assert_eq!(md.thumbnails[0].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_param_block_is_fine() {
        let meta = AnkerSlicerMeta;
        let mut file = Cursor::new(b";Recompiled by AnkerMake\nG28\n".to_vec());
        let props = meta.load_props(&mut file).unwrap();
        assert!(!props.contains_key("machine_name"));
    }
}
