//! Upload bodies that report how much has been sent

use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Receives `(transferred, total)` byte counts during an upload.
///
/// Called synchronously from the upload; keep it cheap.
pub trait ProgressObserver: Send + Sync {
    /// `transferred` of `total` bytes have been sent
    fn report(&self, transferred: u64, total: u64);
}

impl<F> ProgressObserver for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn report(&self, transferred: u64, total: u64) {
        self(transferred, total);
    }
}

struct Upload<R> {
    reader: R,
    buffer_size: usize,
    transferred: u64,
    total: u64,
    observer: Arc<dyn ProgressObserver>,
    started: bool,
}

/// Read `reader` in `buffer_size` chunks, reporting `(0, total)` before the
/// first chunk and the running count after each one
pub(crate) fn progress_stream<R>(
    reader: R,
    total: u64,
    buffer_size: usize,
    observer: Arc<dyn ProgressObserver>,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let upload = Upload {
        reader,
        buffer_size: buffer_size.max(1),
        transferred: 0,
        total,
        observer,
        started: false,
    };

    futures::stream::try_unfold(upload, next_chunk)
}

async fn next_chunk<R>(mut upload: Upload<R>) -> std::io::Result<Option<(Vec<u8>, Upload<R>)>>
where
    R: AsyncRead + Unpin,
{
    if !upload.started {
        upload.observer.report(0, upload.total);
        upload.started = true;
    }

    let mut chunk = vec![0; upload.buffer_size];
    let mut filled = 0;
    while filled < chunk.len() {
        let read = upload.reader.read(&mut chunk[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    if filled == 0 {
        return Ok(None);
    }

    chunk.truncate(filled);
    upload.transferred += filled as u64;
    upload.observer.report(upload.transferred, upload.total);
    Ok(Some((chunk, upload)))
}
