use crate::error::{Error, Result};

/// Hands out sequential ports to non-serverless projects for one run.
///
/// One allocator threads through the whole directory scan. Every
/// non-serverless project consumes exactly one port whether or not it
/// starts, so the same listing order always yields the same ports.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    next: Option<u16>,
    last: u16,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            next: Some(base_port),
            last: base_port,
        }
    }

    /// Take the next port, or `None` for a serverless project (the counter does not move)
    pub fn allocate(&mut self, serverless: bool) -> Result<Option<u16>> {
        if serverless {
            return Ok(None);
        }
        let port = self.next.ok_or(Error::PortsExhausted { last: self.last })?;
        self.last = port;
        self.next = port.checked_add(1);
        Ok(Some(port))
    }
}
