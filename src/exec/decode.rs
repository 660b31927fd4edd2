// src/exec/decode.rs

//! Output decoding: bytes from a pipe -> display text.
//!
//! Each stream gets its own streaming decoder so a multi-byte character
//! split across two reads is reassembled instead of turning into
//! replacement characters. Decoded text has ANSI escape sequences removed.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Decoder, Encoding, GBK, UTF_8};
use regex::Regex;

use crate::types::PlatformKind;

// CSI sequences (colours, cursor movement) and OSC sequences (window
// titles, hyperlinks) terminated by BEL.
static ANSI_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\x1B\x{9B}][\[\]()#;?]*(?:(?:(?:(?:;[-a-zA-Z\d/#&.:=?%@~_]+)*|[a-zA-Z\d]+(?:;[-a-zA-Z\d/#&.:=?%@~_]*)*)?\x07)|(?:(?:\d{1,4}(?:;\d{0,4})*)?[\dA-PR-TZcf-nq-uy=><~]))",
    )
    .expect("valid ansi escape regex")
});

// A sequence at the very end of the text that has not reached its final
// byte yet: CSI with parameter (0x30-0x3F) and intermediate (0x20-0x2F)
// bytes only, OSC without its BEL, or a bare ESC.
static PARTIAL_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\x1B\[[0-?]*[ -/]*|\x{9B}[0-?]*[ -/]*|\x1B\][^\x07\x1B]*|\x1B[()#]?)\z")
        .expect("valid partial escape regex")
});

/// Longest unterminated escape held back between chunks. Anything longer
/// is not a real sequence and is passed through.
const MAX_PENDING_ESCAPE: usize = 64;

/// Remove ANSI escape sequences from `text`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE_RE.replace_all(text, "")
}

/// Code page used for child output on the given platform: UTF-8 on POSIX,
/// GBK (code page 936) on Windows.
pub fn platform_encoding(kind: PlatformKind) -> &'static Encoding {
    match kind {
        PlatformKind::Posix => UTF_8,
        PlatformKind::Windows => GBK,
    }
}

pub struct OutputDecoder {
    decoder: Decoder,
    /// Unterminated escape sequence from the end of the previous chunk.
    pending: String,
}

impl std::fmt::Debug for OutputDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDecoder")
            .field("encoding", &self.decoder.encoding().name())
            .field("pending", &self.pending)
            .finish()
    }
}

impl OutputDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder_without_bom_handling(),
            pending: String::new(),
        }
    }

    pub fn for_platform(kind: PlatformKind) -> Self {
        Self::new(platform_encoding(kind))
    }

    /// Decode one chunk. Trailing bytes of an incomplete character, and an
    /// escape sequence still waiting for its final byte, are held back
    /// until the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(&self.decode_raw(bytes, false));

        if let Some(partial) = PARTIAL_ESCAPE_RE.find(&text) {
            if partial.len() <= MAX_PENDING_ESCAPE {
                self.pending = text.split_off(partial.start());
            }
        }
        strip_ansi(&text).into_owned()
    }

    /// Flush whatever is still buffered at end of stream.
    pub fn finish(&mut self) -> String {
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(&self.decode_raw(&[], true));
        strip_ansi(&text).into_owned()
    }

    fn decode_raw(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or_else(|| bytes.len().saturating_mul(3).saturating_add(16));
        let mut out = String::with_capacity(capacity);
        let (_result, _read, _had_replacements) =
            self.decoder.decode_to_string(bytes, &mut out, last);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_and_title_sequences() {
        let input = "\x1b[31mred\x1b[0m \x1b]0;title\x07plain";
        assert_eq!(strip_ansi(input), "red plain");
    }

    #[test]
    fn reassembles_utf8_split_across_chunks() {
        let bytes = "héllo".as_bytes();
        let mut decoder = OutputDecoder::for_platform(PlatformKind::Posix);
        let mut out = decoder.decode(&bytes[..2]);
        out.push_str(&decoder.decode(&bytes[2..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo");
    }

    #[test]
    fn escape_split_across_chunks_is_removed() {
        let mut decoder = OutputDecoder::for_platform(PlatformKind::Posix);
        let mut out = decoder.decode(b"\x1b[3");
        assert_eq!(out, "");
        out.push_str(&decoder.decode(b"1mred\x1b[0m\n"));
        out.push_str(&decoder.finish());
        assert_eq!(out, "red\n");
    }

    #[test]
    fn text_before_a_partial_escape_is_not_delayed() {
        let mut decoder = OutputDecoder::for_platform(PlatformKind::Posix);
        assert_eq!(decoder.decode(b"done \x1b]0;ti"), "done ");
        assert_eq!(decoder.decode(b"tle\x07next"), "next");
    }

    #[test]
    fn unterminated_escape_is_flushed_at_end() {
        let mut decoder = OutputDecoder::for_platform(PlatformKind::Posix);
        assert_eq!(decoder.decode(b"tail\x1b["), "tail");
        assert_eq!(decoder.finish(), "\x1b[");
    }

    #[test]
    fn decodes_gbk_on_windows() {
        let (bytes, _, _) = GBK.encode("中文");
        let mut decoder = OutputDecoder::for_platform(PlatformKind::Windows);
        assert_eq!(decoder.decode(&bytes), "中文");
    }
}
