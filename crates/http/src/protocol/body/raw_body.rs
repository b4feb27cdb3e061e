use crate::protocol::body::BodyParser;
use crate::protocol::ParseError;
use bytes::{Bytes, BytesMut};

/// Keeps the request body as an opaque byte blob.
#[derive(Debug, Default)]
pub struct RawBody {
    data: BytesMut,
}

impl RawBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

impl BodyParser for RawBody {
    #[inline]
    fn feed(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn process(&mut self) -> Result<(), ParseError> {
        Ok(())
    }
}
