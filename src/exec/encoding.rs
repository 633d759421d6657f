// src/exec/encoding.rs

//! Output chunk decoding.
//!
//! Spawned commands can emit output in whatever encoding the platform
//! locale dictates (Shift_JIS console output on Japanese Windows being the
//! motivating case). Every raw chunk read off a pipe is normalised to
//! UTF-8 before it is appended to a result:
//!
//! 1. valid UTF-8 (which covers ASCII) passes through unchanged,
//! 2. otherwise the encoding is detected heuristically and the chunk is
//!    transcoded,
//! 3. if detection-based transcoding still produces errors, fall back to
//!    the platform default encoding.

use chardetng::EncodingDetector;

/// Decode one raw output chunk to UTF-8.
pub fn decode_chunk(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (text, _, had_errors) = encoding.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }

    platform_default_decode(bytes)
}

/// Last-resort decode using the platform default encoding.
///
/// Windows consoles commonly emit cp932 (Shift_JIS); elsewhere we take a
/// lossy UTF-8 reading rather than dropping the chunk.
fn platform_default_decode(bytes: &[u8]) -> String {
    if cfg!(windows) {
        let (text, _, _) = encoding_rs::SHIFT_JIS.decode(bytes);
        text.into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
