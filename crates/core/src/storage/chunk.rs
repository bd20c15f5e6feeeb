//! Bounded chunk streams over spooled files.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;

/// A lazy, restartable sequence of byte chunks read from a file.
///
/// Every call to [`ChunkSource::stream`] re-opens the file, so a consumer that
/// has to retry a transfer can start over from the first byte. No chunk is
/// longer than the configured chunk size.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    path: PathBuf,
    chunk_size: usize,
    len: u64,
}

impl ChunkSource {
    /// Create a chunk source over `path`, which holds `len` bytes.
    ///
    /// A zero chunk size is treated as one byte.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, chunk_size: u64, len: u64) -> Self {
        let chunk_size = usize::try_from(chunk_size).unwrap_or(usize::MAX).max(1);
        Self {
            path: path.into(),
            chunk_size,
            len,
        }
    }

    /// Total number of bytes the stream yields.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.len
    }

    /// Number of chunks a full pass yields when every read fills its buffer.
    #[must_use]
    pub fn expected_chunks(&self) -> u64 {
        self.len.div_ceil(self.chunk_size as u64)
    }

    /// Start a fresh pass over the file.
    pub fn stream(&self) -> BoxStream<'static, io::Result<Bytes>> {
        let path = self.path.clone();
        let chunk_size = self.chunk_size;

        stream::once(async move { tokio::fs::File::open(path).await })
            .map_ok(move |file| ReaderStream::with_capacity(file, chunk_size))
            .try_flatten()
            .map_ok(move |chunk| {
                stream::iter(
                    split_bounded(chunk, chunk_size)
                        .into_iter()
                        .map(Ok::<Bytes, io::Error>),
                )
            })
            .try_flatten()
            .boxed()
    }
}

/// Split `bytes` into pieces of at most `limit` bytes without copying.
fn split_bounded(mut bytes: Bytes, limit: usize) -> Vec<Bytes> {
    let limit = limit.max(1);
    if bytes.len() <= limit {
        return vec![bytes];
    }

    let mut pieces = Vec::with_capacity(bytes.len().div_ceil(limit));
    while bytes.len() > limit {
        pieces.push(bytes.split_to(limit));
    }
    if !bytes.is_empty() {
        pieces.push(bytes);
    }
    pieces
}
