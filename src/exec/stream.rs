// src/exec/stream.rs

//! Pipe readers shared by the synchronous runner and background sessions.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::exec::decode::OutputDecoder;
use crate::types::StreamKind;

const READ_CHUNK_SIZE: usize = 8192;

/// Read `reader` to EOF, handing each decoded, non-empty chunk to `sink`.
///
/// The reader is never abandoned early: even when the consumer has stopped
/// caring, draining the pipe keeps a still-running descendant from
/// blocking on a full buffer or dying of SIGPIPE.
pub(crate) async fn pump_stream<R, F>(
    mut reader: R,
    kind: StreamKind,
    mut decoder: OutputDecoder,
    mut sink: F,
) where
    R: AsyncRead + Unpin,
    F: FnMut(StreamKind, String),
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(stream = ?kind, error = %e, "pipe read failed; stopping reader");
                break;
            }
        };

        let text = decoder.decode(&buf[..n]);
        if !text.is_empty() {
            sink(kind, text);
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        sink(kind, tail);
    }
    debug!(stream = ?kind, "pipe reader reached EOF");
}
