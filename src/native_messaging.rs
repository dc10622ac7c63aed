use crate::messages::{Event, Inbound, Request, RequestSender};
use std::io::{self, Read, Write};
use std::thread;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

/// Largest frame accepted from the host, as browser native messaging hosts do.
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Read a request using the browser native messaging framing.
/// Messages are prefixed with a 4-byte length in native byte order
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Option<Request>> {
    let mut length_bytes = [0u8; 4];

    // Read the 4-byte message length
    match reader.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Ok(None); // Host closed the pipe
        }
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length > MAX_MESSAGE_LEN {
        // The stream cannot be resynchronised after this.
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes exceeds {} byte limit", length, MAX_MESSAGE_LEN),
        ));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;

    let message: Request = serde_json::from_slice(&buffer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(Some(message))
}

/// Write an event using the same framing.
pub fn write_message<W: Write>(writer: &mut W, event: &Event) -> io::Result<()> {
    let json = serde_json::to_string(event)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let length = json.len() as u32;
    writer.write_all(&length.to_ne_bytes())?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;

    Ok(())
}

fn write_stdout(event: &Event) -> io::Result<()> {
    // Holding the lock keeps the length prefix and body together.
    let mut stdout = io::stdout().lock();
    write_message(&mut stdout, event)
}

/// Serves requests from stdin and pushes events to stdout until stdin closes.
pub fn spawn_stdio_bridge(requests: RequestSender, mut events: broadcast::Receiver<Event>) {
    thread::spawn(move || {
        loop {
            match events.blocking_recv() {
                Ok(event) => {
                    if let Err(e) = write_stdout(&event) {
                        error!(error = %e, "failed to write to stdout");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stdout consumer lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        loop {
            match read_message(&mut stdin) {
                Ok(Some(request)) => {
                    debug!(?request, "stdio request");
                    if !forward_blocking(&requests, request) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("stdin closed, quitting");
                    let _ = requests.send(Inbound::new(Request::Quit));
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %e, "failed to parse message");
                    let _ = write_stdout(&Event::Error(format!("Parse error: {}", e)));
                }
                Err(e) => {
                    error!(error = %e, "failed to read from stdin");
                    let _ = requests.send(Inbound::new(Request::Quit));
                    break;
                }
            }
        }
    });
}

/// Returns false once the controller is gone.
fn forward_blocking(requests: &RequestSender, request: Request) -> bool {
    if request != Request::RequestConfig {
        return requests.send(Inbound::new(request)).is_ok();
    }
    let (reply_tx, reply_rx) = oneshot::channel();
    let inbound = Inbound {
        request,
        reply: Some(reply_tx),
    };
    if requests.send(inbound).is_err() {
        return false;
    }
    match reply_rx.blocking_recv() {
        Ok(config) => {
            if let Err(e) = write_stdout(&Event::Config(config)) {
                error!(error = %e, "failed to write config reply");
            }
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(json: &str) -> Vec<u8> {
        let mut bytes = (json.len() as u32).to_ne_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    #[test]
    fn test_read_requests_until_eof() {
        let mut input = framed(r#"{"type":"toggle-timer"}"#);
        input.extend(framed(r#"{"type":"request-config"}"#));
        let mut reader = Cursor::new(input);

        assert_eq!(read_message(&mut reader).unwrap(), Some(Request::ToggleTimer));
        assert_eq!(read_message(&mut reader).unwrap(), Some(Request::RequestConfig));
        assert_eq!(read_message(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_invalid_request_is_invalid_data() {
        let mut reader = Cursor::new(framed(r#"{"type":"launch-rocket"}"#));
        let err = read_message(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_oversized_frame_is_rejected_unread() {
        let mut input = ((MAX_MESSAGE_LEN + 1) as u32).to_ne_bytes().to_vec();
        input.extend_from_slice(br#"{"type":"quit"}"#);
        let mut reader = Cursor::new(input);
        let err = read_message(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(reader.position(), 4);

        let mut reader = Cursor::new(u32::MAX.to_ne_bytes().to_vec());
        assert_eq!(
            read_message(&mut reader).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_event_framing() {
        let mut out = Vec::new();
        write_message(&mut out, &Event::EndTimer).unwrap();
        let body = r#"{"type":"end-timer"}"#;
        assert_eq!(&out[..4], &(body.len() as u32).to_ne_bytes());
        assert_eq!(&out[4..], body.as_bytes());
    }

    #[test]
    fn test_forward_blocking_writes_nothing_for_plain_requests() {
        let (tx, mut rx) = crate::messages::create_request_channel();
        assert!(forward_blocking(&tx, Request::ResetTimer));
        let inbound = rx.try_recv().unwrap();
        assert_eq!(inbound.request, Request::ResetTimer);
        assert!(inbound.reply.is_none());

        drop(rx);
        assert!(!forward_blocking(&tx, Request::ToggleTimer));
    }
}
