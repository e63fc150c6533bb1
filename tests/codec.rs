extern crate caret_files;

use std::io::Write;
use rand::Rng;
use caret_files::codec::*;
use caret_files::error::ErrorKind;

fn random_payload(random: &mut impl Rng) -> Vec<u8> {
    let size = random.random_range(0 .. 4096);

    // half of the payloads repeat a few values, which compress well
    if random.random_bool(0.5) { (0 .. size).map(|_| random.random()).collect() }
    else { (0 .. size).map(|_| random.random_range(0 .. 4_u8)).collect() }
}

#[test]
fn base64_of_random_payloads() {
    let mut random = rand::rng();

    for _ in 0 .. 64 {
        let payload = random_payload(&mut random);
        assert_eq!(decode_base64(&encode_base64(&payload)).unwrap(), payload);
    }
}

#[test]
fn zlib_base64_of_random_payloads() {
    let mut random = rand::rng();

    for _ in 0 .. 64 {
        let payload = random_payload(&mut random);
        let text = encode_zlib_base64(&payload);

        assert_eq!(decode_zlib_base64(&text, Some(payload.len())).unwrap(), payload);
        assert_eq!(decode_zlib_base64(&text, None).unwrap(), payload);
    }
}

#[test]
fn wrapped_base64_lines() {
    let payload: Vec<u8> = (0 ..= 255).collect();
    let text = encode_base64(&payload);

    let wrapped: String = text.as_bytes().chunks(76)
        .map(|line| format!("\n      {}", String::from_utf8_lossy(line)))
        .collect();

    assert_eq!(decode_base64(&wrapped).unwrap(), payload);
}

#[test]
fn unexpected_decompressed_size() {
    let text = encode_zlib_base64(&[7; 100]);
    let error = decode_zlib_base64(&text, Some(99)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FormatInvalid);
}

#[test]
fn gzip_is_detected() {
    let mut random = rand::rng();
    let mut payload = b"BeginHeader\n".to_vec();
    payload.extend(random_payload(&mut random));

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&payload).unwrap();
    let compressed = encoder.finish().unwrap();

    assert_eq!(gunzip_if_compressed(&compressed).unwrap().as_ref(), payload.as_slice());
    assert_eq!(gunzip_if_compressed(&payload[..]).unwrap().as_ref(), payload.as_slice());
}
