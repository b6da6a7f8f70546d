use super::A2sError;

/// Little-endian cursor over a single reply packet.
///
/// Strings are borrowed lossily: servers occasionally send names that are not
/// valid UTF-8, and a bad byte in the MOTD should not fail the whole probe.
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if every byte has been consumed.
    pub const fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes left in the packet.
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], A2sError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(A2sError::UnexpectedEof { field });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, A2sError> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16, A2sError> {
        let bytes = self.read_bytes(2, field)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32, A2sError> {
        let bytes = self.read_bytes(4, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64_le(&mut self, field: &'static str) -> Result<u64, A2sError> {
        let bytes = self.read_bytes(8, field)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_array4(&mut self, field: &'static str) -> Result<[u8; 4], A2sError> {
        let bytes = self.read_bytes(4, field)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a NUL-terminated string.
    pub fn read_cstring(&mut self, field: &'static str) -> Result<String, A2sError> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(nul) = rest.iter().position(|b| *b == 0) else {
            return Err(A2sError::UnterminatedString { field });
        };
        let value = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(value)
    }
}
