//! In-process port pair.
//!
//! Both ends live in the same process; frames still travel as strings so
//! the bridge exercises the same serialization path as a real transport.

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};

use super::{Channel, ChannelError};

/// One end of an in-process channel.
#[derive(Debug)]
pub struct MemoryPort {
    tx: Sender<String>,
    rx: Receiver<String>,
}

/// Create two connected ports. Frames posted on one are polled on the other.
pub fn pair() -> (MemoryPort, MemoryPort) {
    let (a_tx, b_rx) = unbounded();
    let (b_tx, a_rx) = unbounded();
    (
        MemoryPort { tx: a_tx, rx: a_rx },
        MemoryPort { tx: b_tx, rx: b_rx },
    )
}

impl Channel for MemoryPort {
    fn post(&mut self, frame: String) -> Result<(), ChannelError> {
        self.tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn poll(&mut self) -> Result<Option<String>, ChannelError> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut host, mut client) = pair();
        host.post("a".into()).unwrap();
        host.post("b".into()).unwrap();

        assert_eq!(client.poll().unwrap().as_deref(), Some("a"));
        assert_eq!(client.poll().unwrap().as_deref(), Some("b"));
        assert_eq!(client.poll().unwrap(), None);
    }

    #[test]
    fn test_dropped_peer_reports_closed() {
        let (mut host, client) = pair();
        drop(client);

        assert!(matches!(host.post("x".into()), Err(ChannelError::Closed)));
        assert!(matches!(host.poll(), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_pending_frames_survive_peer_drop() {
        let (mut host, mut client) = pair();
        client.post("last words".into()).unwrap();
        drop(client);

        assert_eq!(host.poll().unwrap().as_deref(), Some("last words"));
        assert!(matches!(host.poll(), Err(ChannelError::Closed)));
    }
}
