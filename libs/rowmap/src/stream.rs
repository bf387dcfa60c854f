use std::io::{Cursor, Read};

/// Read-only byte stream over a binary column.
///
/// Either a live handle from the row source or an in-memory copy of the
/// payload, depending on what the source supports.
pub struct ColumnStream {
    inner: Inner,
}

enum Inner {
    Live(Box<dyn Read + Send>),
    Buffered(Cursor<Vec<u8>>),
}

impl ColumnStream {
    pub fn live(reader: Box<dyn Read + Send>) -> Self {
        Self {
            inner: Inner::Live(reader),
        }
    }

    pub fn buffered(data: Vec<u8>) -> Self {
        Self {
            inner: Inner::Buffered(Cursor::new(data)),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.inner, Inner::Live(_))
    }

    /// Total payload length, known only for buffered streams.
    pub fn len_hint(&self) -> Option<usize> {
        match &self.inner {
            Inner::Live(_) => None,
            Inner::Buffered(c) => Some(c.get_ref().len()),
        }
    }
}

impl Read for ColumnStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            Inner::Live(r) => r.read(buf),
            Inner::Buffered(c) => c.read(buf),
        }
    }
}

impl std::fmt::Debug for ColumnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnStream")
            .field("live", &self.is_live())
            .field("len_hint", &self.len_hint())
            .finish()
    }
}
