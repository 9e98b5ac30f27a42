use std::io;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncReadExt as _;

/// Replays a saved stream body from disk.
///
/// The file is read in blocks of `chunk_size` bytes. A chunk is handed out
/// once at least `chunk_size` bytes are buffered and ends at the last
/// complete line, so no `data: ` line is ever split between chunks.
pub struct FileChunks {
    file: tokio::fs::File,
    chunk_size: usize,
    delay: Duration,
    buf: Vec<u8>,
    eof: bool,
}

impl FileChunks {
    pub async fn open(path: &Path, chunk_size: usize, delay: Duration) -> io::Result<Self> {
        if chunk_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be greater than 0",
            ));
        }
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            file,
            chunk_size,
            delay,
            buf: Vec::new(),
            eof: false,
        })
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send {
        futures::stream::try_unfold(self, |mut chunks| async move {
            let next = chunks.next_chunk().await?;
            Ok(next.map(|chunk| (chunk, chunks)))
        })
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(end) = self.line_boundary() {
                let rest = self.buf.split_off(end);
                let chunk = std::mem::replace(&mut self.buf, rest);
                self.pause().await;
                return Ok(Some(Bytes::from(chunk)));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.pause().await;
                return Ok(Some(Bytes::from(std::mem::take(&mut self.buf))));
            }

            let mut block = vec![0; self.chunk_size];
            let read = self.file.read(&mut block).await?;
            if read == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&block[..read]);
            }
        }
    }

    fn line_boundary(&self) -> Option<usize> {
        if self.buf.len() < self.chunk_size {
            return None;
        }
        self.buf.iter().rposition(|&b| b == b'\n').map(|i| i + 1)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use futures::TryStreamExt as _;

    #[tokio::test]
    async fn chunks_end_on_line_boundaries() {
        let body = "data: one\ndata: two\ndata: three\ndata: tail";
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(body.as_bytes()).expect("write");

        let chunks: Vec<Bytes> = FileChunks::open(file.path(), 5, Duration::ZERO)
            .await
            .expect("open")
            .into_stream()
            .try_collect()
            .await
            .expect("read");

        assert!(chunks.len() >= 3);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.last(), Some(&b'\n'));
        }
        assert_eq!(chunks.concat(), body.as_bytes());
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let err = FileChunks::open(file.path(), 0, Duration::ZERO)
            .await
            .err()
            .expect("invalid input");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
