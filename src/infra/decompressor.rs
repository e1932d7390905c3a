//! Content decoding infrastructure.
//!
//! The client advertises gzip, deflate and brotli, and presents the decoded
//! entity to the caller the way a browser would.

use std::io::Read;

/// Value sent in `Accept-Encoding`.
pub const ACCEPTED_ENCODINGS: &str = "gzip, deflate, br";

/// Trait for content decompression.
pub trait Decompressor: Send + Sync {
    /// The content-encoding token this decompressor handles.
    fn encoding(&self) -> &'static str;

    /// Decodes a complete body.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String>;
}

#[derive(Default)]
pub struct GzipDecompressor;

impl Decompressor for GzipDecompressor {
    fn encoding(&self) -> &'static str {
        "gzip"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(data)
            .read_to_end(&mut decoded)
            .map_err(|e| format!("gzip: {}", e))?;
        Ok(decoded)
    }
}

/// `deflate` as sent by servers is zlib-wrapped.
#[derive(Default)]
pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn encoding(&self) -> &'static str {
        "deflate"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decoded = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut decoded)
            .map_err(|e| format!("deflate: {}", e))?;
        Ok(decoded)
    }
}

#[derive(Default)]
pub struct BrotliDecompressor;

impl Decompressor for BrotliDecompressor {
    fn encoding(&self) -> &'static str {
        "br"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decoded = Vec::new();
        brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut decoded)
            .map_err(|e| format!("br: {}", e))?;
        Ok(decoded)
    }
}

/// Selects a decoder by `Content-Encoding` token.
pub struct MultiDecompressor {
    decoders: Vec<Box<dyn Decompressor>>,
}

impl Default for MultiDecompressor {
    fn default() -> Self {
        Self {
            decoders: vec![
                Box::new(GzipDecompressor),
                Box::new(DeflateDecompressor),
                Box::new(BrotliDecompressor),
            ],
        }
    }
}

impl MultiDecompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the decoder for a `Content-Encoding` header value.
    ///
    /// Stacked encodings such as `gzip, br` are not supported and yield `None`.
    pub fn find(&self, content_encoding: &str) -> Option<&dyn Decompressor> {
        let token = content_encoding.trim();
        self.decoders
            .iter()
            .find(|d| token.eq_ignore_ascii_case(d.encoding()))
            .map(|d| d.as_ref())
    }
}

/// Whether the body carries an encoding this client can decode.
pub fn is_supported_encoding(content_encoding: &str) -> bool {
    MultiDecompressor::new().find(content_encoding).is_some()
}

/// Decodes `body` according to `content_encoding`.
///
/// Unknown encodings are an error; callers check [`is_supported_encoding`] first.
pub fn decompress_body(body: &[u8], content_encoding: &str) -> Result<Vec<u8>, String> {
    let decompressors = MultiDecompressor::new();
    let decoder = decompressors
        .find(content_encoding)
        .ok_or_else(|| format!("unsupported content-encoding: {}", content_encoding))?;
    decoder.decompress(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ORIGINAL: &[u8] = b"Hello, World!";

    #[test]
    fn test_gzip_decompression() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(ORIGINAL).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress_body(&compressed, "gzip").unwrap(), ORIGINAL);
    }

    #[test]
    fn test_deflate_decompression() {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(ORIGINAL).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress_body(&compressed, "Deflate").unwrap(), ORIGINAL);
    }

    #[test]
    fn test_brotli_decompression() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(ORIGINAL).unwrap();
        }

        assert_eq!(decompress_body(&compressed, "br").unwrap(), ORIGINAL);
    }

    #[test]
    fn test_supported_encodings() {
        assert!(is_supported_encoding("gzip"));
        assert!(is_supported_encoding(" br "));
        assert!(!is_supported_encoding("identity"));
        assert!(!is_supported_encoding("gzip, br"));
    }

    #[test]
    fn test_truncated_gzip_fails() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(ORIGINAL).unwrap();
        let compressed = encoder.finish().unwrap();

        assert!(decompress_body(&compressed[..compressed.len() / 2], "gzip").is_err());
    }
}
