//! Buffer connections between endpoints.

use crate::buffer::Buffer;
use crate::capability::Endpoint;
use crate::instance::InstanceId;

/// Identifier of a connection. Never reused within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    /// Raw id value, as carried on the host protocol.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuilds an id received from the host.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "conn{}", self.0)
    }
}

/// One side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// An instance endpoint inside the graph.
    Instance(InstanceId, Endpoint),
    /// The host or hardware side (a stream endpoint outside the graph).
    Host,
}

impl Terminal {
    /// The instance on this side, if any.
    pub fn instance(self) -> Option<InstanceId> {
        match self {
            Self::Instance(id, _) => Some(id),
            Self::Host => None,
        }
    }
}

impl core::fmt::Display for Terminal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Instance(id, ep) => write!(f, "{id}.{ep}"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// A writer terminal, a reader terminal and the buffer between them.
#[derive(Debug)]
pub struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) source: Terminal,
    pub(crate) sink: Terminal,
    /// `None` only while lent to a `process` call.
    pub(crate) buffer: Option<Buffer>,
}

impl Connection {
    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Writer side.
    pub fn source(&self) -> Terminal {
        self.source
    }

    /// Reader side.
    pub fn sink(&self) -> Terminal {
        self.sink
    }

    /// The connection's buffer.
    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Instance-to-instance edge, if both sides are instances.
    pub fn edge(&self) -> Option<(InstanceId, InstanceId)> {
        Some((self.source.instance()?, self.sink.instance()?))
    }
}
