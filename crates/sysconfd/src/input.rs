// Request lines read on a dedicated OS thread.
//
// A blocking read parked in the runtime's blocking pool keeps runtime
// shutdown waiting until the next line or end of input. The reader thread
// here is detached instead: once the receiving side is gone the process can
// exit while the thread is still parked in `read`.

use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Lines buffered between the reader thread and the request loop
const LINE_BUFFER: usize = 16;

/// Forward every line of `reader` into an async stream
///
/// The stream ends after end of input or after the first read error, which
/// is delivered as the last item.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<ReceiverStream<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    thread::Builder::new()
        .name("sysconfd-stdin".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() {
                    debug!("Request loop gone, stopping input reader");
                    return;
                }
                if failed {
                    return;
                }
            }
        })?;

    Ok(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::{Duration, Instant};
    use tokio_stream::StreamExt;

    /// Blocks in `read` until its sender is dropped
    struct Stalled(std::sync::mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn forwards_lines_then_ends() {
        let input = Cursor::new("{\"op\":\"get-state\"}\n\n{\"op\":\"get-config\"}\n");
        let lines: Vec<String> = spawn_line_reader(input)
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;

        assert_eq!(
            lines,
            vec![
                "{\"op\":\"get-state\"}".to_string(),
                String::new(),
                "{\"op\":\"get-config\"}".to_string(),
            ]
        );
    }

    #[test]
    fn stalled_input_does_not_hold_up_runtime_shutdown() {
        let (release, parked) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let started = Instant::now();
        runtime.block_on(async {
            let mut lines = spawn_line_reader(BufReader::new(Stalled(parked))).unwrap();
            // nothing arrives; the caller gives up as it would on a signal
            let next = tokio::time::timeout(Duration::from_millis(50), lines.next()).await;
            assert!(next.is_err());
        });
        drop(runtime);

        assert!(started.elapsed() < Duration::from_secs(1));
        drop(release);
    }
}
