//! Subcommand implementations

use anyhow::{Context, Result};
use grav_core::{json, Compression, Config, GravSerializer, JsonMeta, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// How files are read and written
#[derive(Debug, Clone, Default)]
pub struct Io {
    pub config: Config,
    /// Files hold Base64 text instead of raw bytes
    pub base64: bool,
}

impl Io {
    /// Read a file, undo the Base64 layer if any, then decompress
    pub fn read(&self, path: &Path) -> Result<GravSerializer> {
        let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let raw = if self.base64 {
            let text = String::from_utf8(raw).context("base64 input is not text")?;
            GravSerializer::from_base64(&text)?.into_bytes()
        } else {
            raw
        };
        debug!(path = %path.display(), size = raw.len(), codec = %self.config.compression, "read input");
        Ok(GravSerializer::load(raw.as_slice(), &self.config)?)
    }

    /// Compress a buffer, add the Base64 layer if any, then write the file
    pub fn write(&self, path: &Path, ser: &GravSerializer) -> Result<()> {
        let mut packed = Vec::new();
        ser.save(&mut packed, &self.config)?;
        let out = if self.base64 {
            GravSerializer::from_bytes(packed).to_base64().into_bytes()
        } else {
            packed
        };
        fs::write(path, &out).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), size = out.len(), "wrote output");
        Ok(())
    }
}

/// One line per tagged value until the buffer ends
pub fn inspect(ser: &mut GravSerializer) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    while ser.has_next() {
        let offset = ser.position();
        let value = ser
            .read_object(&[])
            .with_context(|| format!("decoding value #{} at byte {offset}", lines.len()))?;
        lines.push(format!("#{} @{offset} {}: {}", lines.len(), value.type_name(), value));
    }
    Ok(lines)
}

/// Decode the first tagged value as JSON
pub fn to_json(ser: &mut GravSerializer, pretty: bool) -> Result<String> {
    let value = ser.read_object(&[]).context("decoding value")?;
    let doc = json::value_to_json(&value)?;
    let text = if pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    Ok(text)
}

/// Parse lenient JSON into a tree and encode it as a tagged object
pub fn from_json(text: &str) -> Result<GravSerializer> {
    let meta = JsonMeta::from_json(text).context("parsing JSON")?;
    let mut ser = GravSerializer::new();
    ser.write_object(&Value::from(meta))?;
    Ok(ser)
}

/// Read `input` with the codec of `io` and write it to `output` with `to`
pub fn recompress(io: &Io, input: &Path, output: &Path, to: Compression) -> Result<()> {
    let from = io.config.compression;
    let ser = io
        .read(input)
        .with_context(|| format!("decompressing with {from}"))?;
    let target = Io {
        config: io.config.clone().with_compression(to),
        base64: io.base64,
    };
    target.write(output, &ser)?;
    info!(%from, %to, size = ser.len(), "recompressed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grav_core::Compressor;

    #[test]
    fn test_inspect_lists_every_value() {
        let mut ser = GravSerializer::new();
        ser.write_object(&Value::Int(5)).unwrap();
        ser.write_object(&Value::from("hi")).unwrap();

        let lines = inspect(&mut ser).unwrap();
        assert_eq!(lines, vec!["#0 @0 int: 5", "#1 @5 string: \"hi\""]);
    }

    #[test]
    fn test_inspect_reports_bad_tag() {
        let mut ser = GravSerializer::from_bytes(vec![250]);
        let err = inspect(&mut ser).unwrap_err();
        assert!(err.to_string().contains("value #0"));
    }

    #[test]
    fn test_json_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.grav");
        let io = Io {
            config: Config::default().with_compression(Compression::Zstd),
            base64: true,
        };

        let ser = from_json("{ \"a\": { \"b\": 1 }, /* note */ \"c\": [true] }").unwrap();
        io.write(&path, &ser).unwrap();

        let mut read = io.read(&path).unwrap();
        assert_eq!(to_json(&mut read, false).unwrap(), r#"{"a":{"b":1},"c":[true]}"#);
    }

    #[test]
    fn test_from_json_rejects_arrays() {
        assert!(from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_recompress() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.grav");
        let output = dir.path().join("out.grav");
        let data: Vec<u8> = (0..2048u32).map(|i| (i % 13) as u8).collect();
        fs::write(&input, Compression::Deflate.compress(&data).unwrap()).unwrap();

        let io = Io {
            config: Config::default().with_compression(Compression::Deflate),
            base64: false,
        };
        recompress(&io, &input, &output, Compression::Lz4).unwrap();
        let lz4 = fs::read(&output).unwrap();
        assert_eq!(Compression::Lz4.decompress(&lz4).unwrap(), data);

        fs::write(&input, b"not deflate").unwrap();
        assert!(recompress(&io, &input, &output, Compression::None).is_err());
    }

    #[test]
    fn test_recompress_keeps_base64_layer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.b64");
        let output = dir.path().join("out.b64");
        let io = Io {
            config: Config::default().with_compression(Compression::Zstd),
            base64: true,
        };
        let ser = from_json("{ \"hp\": 20 }").unwrap();
        io.write(&input, &ser).unwrap();

        recompress(&io, &input, &output, Compression::Deflate).unwrap();
        let text = fs::read_to_string(&output).unwrap();
        let packed = GravSerializer::from_base64(&text).unwrap().into_bytes();
        assert_eq!(Compression::Deflate.decompress(&packed).unwrap(), ser.as_bytes());
    }
}
