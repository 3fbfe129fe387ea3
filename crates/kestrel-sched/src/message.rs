//! Task ids and the messages that travel between tasks.

/// Identifier of a schedulable unit, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u16);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task{}", self.0)
    }
}

/// Message type, interpreted by the receiving task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u16);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// A message in flight.
///
/// Ownership moves from the sender into the mailbox and then into the
/// receiving handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// What kind of message this is.
    pub id: MessageId,
    /// Message body.
    pub payload: Vec<u8>,
}

impl Message {
    /// Message with a payload.
    pub fn new(id: MessageId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Message with no payload.
    pub fn empty(id: MessageId) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(TaskId(3).to_string(), "task3");
        assert_eq!(MessageId(0x10A).to_string(), "0x010A");
    }

    #[test]
    fn constructors() {
        let m = Message::new(MessageId(1), vec![1, 2]);
        assert_eq!(m.payload, vec![1, 2]);
        assert!(Message::empty(MessageId(2)).payload.is_empty());
        assert_eq!(Message::new(MessageId(1), &[7u8][..]).payload, vec![7]);
    }
}
