use crate::error::BytecodeError;
use std::sync::Arc;

/// A positioned cursor over an immutable bytecode buffer.
///
/// All multi-byte integers are big-endian (spec §3, §6.1). The instruction
/// pointer is writable by the caller — the analyzer rewinds it between
/// passes (spec §4.1) — so `seek`/`tell` are plain getters/setters rather
/// than being hidden behind an iterator-only interface.
#[derive(Clone, Debug)]
pub struct BytecodeReader {
    bytes: Arc<[u8]>,
    ip: u32,
}

impl BytecodeReader {
    pub fn new(bytes: Arc<[u8]>) -> Self {
        Self { bytes, ip: 0 }
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn tell(&self) -> u32 {
        self.ip
    }

    pub fn seek(&mut self, ip: u32) {
        self.ip = ip;
    }

    pub fn is_eof(&self) -> bool {
        self.ip >= self.len()
    }

    pub fn remaining(&self) -> u32 {
        self.len().saturating_sub(self.ip)
    }

    fn take(&mut self, n: u32) -> Result<&[u8], BytecodeError> {
        let start = self.ip as usize;
        let end = start + n as usize;
        if end > self.bytes.len() {
            return Err(BytecodeError::TruncatedInstruction);
        }
        self.ip += n;
        Ok(&self.bytes[start..end])
    }

    pub fn read_u8(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, BytecodeError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, BytecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, BytecodeError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, BytecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, BytecodeError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32, BytecodeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads exactly `len` bytes with no terminator (spec §4.1).
    pub fn read_string(&mut self, len: u32) -> Result<Arc<[u8]>, BytecodeError> {
        Ok(Arc::from(self.take(len)?))
    }

    /// Applies a relative 32-bit displacement measured from the start of the
    /// current instruction (spec §4.4, "Control flow"): `base` is the PC the
    /// jump-family instruction itself started at.
    pub fn jump_relative(&mut self, base: u32, displacement: i32) {
        self.ip = (base as i64 + displacement as i64) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> BytecodeReader {
        BytecodeReader::new(Arc::from(bytes))
    }

    #[test]
    fn reads_big_endian_integers() {
        let mut r = reader(&[0x00, 0x00, 0x01, 0x02]);
        assert_eq!(r.read_u32().unwrap(), 0x0000_0102);
    }

    #[test]
    fn truncated_read_fails() {
        let mut r = reader(&[0x00, 0x01]);
        assert_eq!(r.read_u32(), Err(BytecodeError::TruncatedInstruction));
    }

    #[test]
    fn string_reads_exact_length_without_terminator() {
        let mut r = reader(b"hello\0world");
        let s = r.read_string(5).unwrap();
        assert_eq!(&*s, b"hello");
        assert_eq!(r.tell(), 5);
    }

    #[test]
    fn seek_and_tell_roundtrip() {
        let mut r = reader(&[0u8; 16]);
        r.seek(10);
        assert_eq!(r.tell(), 10);
        assert!(!r.is_eof());
        r.seek(16);
        assert!(r.is_eof());
    }

    #[test]
    fn relative_jump_applies_from_instruction_start() {
        let mut r = reader(&[0u8; 32]);
        r.jump_relative(4, 10);
        assert_eq!(r.tell(), 14);
        r.jump_relative(20, -15);
        assert_eq!(r.tell(), 5);
    }
}
