
//! Text encodings of binary payloads inside xml files:
//! plain base64, and base64 of zlib-compressed bytes.
//! Also unpacks gzip compressed binary files.

use std::borrow::Cow;
use std::io::Read;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crate::error::{Error, Result};


/// Compression level used for zlib payloads.
const ZLIB_LEVEL: u8 = 6;

/// Encode the bytes as standard base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring any whitespace that xml formatting inserted.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|character| !character.is_whitespace()).collect();
    Ok(STANDARD.decode(compact.as_bytes())?)
}

/// Compress the bytes with zlib, then encode them as base64.
pub fn encode_zlib_base64(bytes: &[u8]) -> String {
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(bytes, ZLIB_LEVEL);
    encode_base64(&compressed)
}

/// Decode base64, then decompress the zlib stream.
/// When `expected_byte_size` is known, a different decompressed size is an error.
pub fn decode_zlib_base64(text: &str, expected_byte_size: Option<usize>) -> Result<Vec<u8>> {
    let compressed = decode_base64(text)?;

    let mut decoder = zune_inflate::DeflateDecoder::new(&compressed);
    let decompressed = decoder.decode_zlib()
        .map_err(|error| Error::invalid(format!("zlib decompression failed: {:?}", error)))?;

    if let Some(expected) = expected_byte_size {
        if decompressed.len() != expected {
            return Err(Error::invalid(format!(
                "zlib decompression size mismatch: expected {}, got {}",
                expected, decompressed.len()
            )));
        }
    }

    Ok(decompressed)
}

/// The first two bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompress the bytes if they are a gzip stream, otherwise return them unchanged.
pub fn gunzip_if_compressed(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(bytes));
    }

    let mut decompressed = Vec::with_capacity(bytes.len() * 4);
    flate2::read::GzDecoder::new(bytes).read_to_end(&mut decompressed)
        .map_err(|error| Error::invalid(format!("gzip decompression failed: {}", error)))?;

    Ok(Cow::Owned(decompressed))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base64_ignores_line_breaks(){
        let encoded = encode_base64(b"caret surface data");
        let wrapped = format!("{}\n   {}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"caret surface data");
    }

    #[test]
    fn zlib_size_is_checked(){
        let encoded = encode_zlib_base64(&[7; 100]);
        assert_eq!(decode_zlib_base64(&encoded, Some(100)).unwrap(), vec![7; 100]);
        assert!(decode_zlib_base64(&encoded, Some(99)).is_err());
    }

    #[test]
    fn gzip_is_detected(){
        use std::io::Write;

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"curvature").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(&*gunzip_if_compressed(&compressed).unwrap(), b"curvature");
        assert!(matches!(gunzip_if_compressed(b"plain").unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn malformed_payloads(){
        assert!(decode_base64("not base64 !!").is_err());
        assert!(decode_zlib_base64(&encode_base64(b"plain"), None).is_err());
    }
}
