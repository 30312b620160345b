//! File info extraction: stat, encoding-aware line count, SHA-256 content hash.

use encoding_rs::{Encoding, UTF_8};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Bytes sampled from the head of a file for encoding detection
const ENCODING_SAMPLE_BYTES: usize = 10_000;
/// Read size for the streaming hash/line-count pass
const CHUNK_SIZE: usize = 8192;

/// Metadata captured for a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub line_count: u64,
    /// Modification time, unix seconds
    pub modified_at: i64,
    /// Hex-encoded SHA-256 of the full content
    pub content_hash: String,
}

/// Stat, detect encoding, then hash and count lines in one streaming pass.
pub fn read_file_info(path: &Path) -> io::Result<FileInfo> {
    let meta = fs::metadata(path)?;
    let modified_at = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let encoding = detect_encoding(path)?;
    let mut decoder = encoding.new_decoder();
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut text = String::new();
    let mut size = 0u64;
    let mut newlines = 0u64;
    let mut ends_with_newline = true;

    loop {
        let n = file.read(&mut chunk)?;
        let last = n == 0;
        hasher.update(&chunk[..n]);
        size += n as u64;

        text.clear();
        if let Some(needed) = decoder.max_utf8_buffer_length(n) {
            text.reserve(needed);
        }
        // Malformed sequences become U+FFFD
        let _ = decoder.decode_to_string(&chunk[..n], &mut text, last);

        newlines += text.bytes().filter(|b| *b == b'\n').count() as u64;
        if let Some(c) = text.chars().last() {
            ends_with_newline = c == '\n';
        }

        if last {
            break;
        }
    }

    let line_count = if ends_with_newline {
        newlines
    } else {
        newlines + 1
    };

    Ok(FileInfo {
        size,
        line_count,
        modified_at,
        content_hash: hex::encode(hasher.finalize()),
    })
}

/// Hash a file without decoding it
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Guess the text encoding from the head of the file, defaulting to UTF-8
fn detect_encoding(path: &Path) -> io::Result<&'static Encoding> {
    let mut sample = Vec::with_capacity(ENCODING_SAMPLE_BYTES);
    File::open(path)?
        .take(ENCODING_SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)?;
    Ok(guess_encoding(&sample))
}

fn guess_encoding(sample: &[u8]) -> &'static Encoding {
    if sample.is_empty() {
        return UTF_8;
    }
    if let Some((encoding, _bom_len)) = Encoding::for_bom(sample) {
        return encoding;
    }
    let mut detector = chardetng::EncodingDetector::new();
    // A truncated sample may end mid-character
    detector.feed(sample, false);
    detector.guess(None, true)
}
