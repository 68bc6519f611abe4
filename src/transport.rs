//! The USB side of the driver, as the control core sees it.

use std::collections::VecDeque;
use std::io;

use crate::protocol::ControlCode;
use crate::Result;

pub trait Transport {
    fn send_bulk(&mut self, data: &[u8]) -> Result<()>;
    fn send_control(&mut self, code: ControlCode, data: &[u8]) -> Result<()>;
    /// Receive at most `max_len` bytes from the bulk IN endpoint.
    fn receive_bulk(&mut self, max_len: usize) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_bulk(&mut self, data: &[u8]) -> Result<()> {
        (**self).send_bulk(data)
    }

    fn send_control(&mut self, code: ControlCode, data: &[u8]) -> Result<()> {
        (**self).send_control(code, data)
    }

    fn receive_bulk(&mut self, max_len: usize) -> Result<Vec<u8>> {
        (**self).receive_bulk(max_len)
    }
}

/// One outgoing transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Bulk(Vec<u8>),
    Control(ControlCode, Vec<u8>),
}

impl Transfer {
    pub fn send<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        match self {
            Transfer::Bulk(data) => transport.send_bulk(data),
            Transfer::Control(code, data) => transport.send_control(*code, data),
        }
    }
}

/// Transport that records what is sent and plays back queued responses.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<Transfer>,
    responses: VecDeque<Vec<u8>>,
    /// Number of transfers that succeed before every further one fails.
    fail_after: Option<usize>,
    attempts: usize,
}

impl RecordingTransport {
    pub fn new() -> RecordingTransport {
        RecordingTransport::default()
    }

    pub fn queue_response(&mut self, data: impl Into<Vec<u8>>) {
        self.responses.push_back(data.into());
    }

    pub fn fail_after(&mut self, transfers: Option<usize>) {
        self.fail_after = transfers;
        self.attempts = 0;
    }

    pub fn sent(&self) -> &[Transfer] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.sent)
    }

    fn attempt(&mut self) -> Result<()> {
        self.attempts += 1;
        match self.fail_after {
            Some(limit) if self.attempts > limit =>
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))?,
            _ => Ok(())
        }
    }
}

impl Transport for RecordingTransport {
    fn send_bulk(&mut self, data: &[u8]) -> Result<()> {
        self.attempt()?;
        log::trace!("send_bulk({:02x?})", data);
        self.sent.push(Transfer::Bulk(data.to_vec()));
        Ok(())
    }

    fn send_control(&mut self, code: ControlCode, data: &[u8]) -> Result<()> {
        self.attempt()?;
        log::trace!("send_control({:?}, {:02x?})", code, data);
        self.sent.push(Transfer::Control(code, data.to_vec()));
        Ok(())
    }

    fn receive_bulk(&mut self, max_len: usize) -> Result<Vec<u8>> {
        self.attempt()?;
        let mut data = self.responses.pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no response queued"))?;
        data.truncate(max_len);
        log::trace!("receive_bulk({}) = {} bytes", max_len, data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    #[test]
    fn test_record_and_replay() {
        let mut transport = RecordingTransport::new();
        transport.queue_response([1, 2, 3]);
        transport.send_bulk(&[0x05, 0x00]).unwrap();
        transport.send_control(ControlCode::BeginCommand, &[0x0f]).unwrap();
        assert_eq!(transport.receive_bulk(2).unwrap(), [1, 2]);
        assert_eq!(transport.sent(), [
            Transfer::Bulk(vec![0x05, 0x00]),
            Transfer::Control(ControlCode::BeginCommand, vec![0x0f]),
        ]);
        assert!(matches!(transport.receive_bulk(2), Err(Error::Transport(_))));
    }

    #[test]
    fn test_failure_injection() {
        let mut transport = RecordingTransport::new();
        transport.fail_after(Some(1));
        transport.send_bulk(&[1]).unwrap();
        assert!(matches!(transport.send_bulk(&[2]), Err(Error::Transport(_))));
        assert_eq!(transport.take_sent(), [Transfer::Bulk(vec![1])]);
        assert!(transport.sent().is_empty());
    }
}
