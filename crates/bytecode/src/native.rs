//! Platform-native script envelope detection (spec §6.7).
//!
//! A platform-native image disguises a foreign binary as a regular script:
//! a fixed instruction prefix followed by a sequence of string constants
//! that, concatenated, reassemble the real payload. Detecting this shape
//! happens before analysis so the engine can route it to a platform-specific
//! backend instead of attempting to reconstruct control flow out of what is,
//! semantically, opaque binary data wearing a bytecode costume.

use std::sync::Arc;

use crate::disassembler::Disassembler;
use crate::opcode::{type_suffix as ty, Opcode};
use crate::reader::BytecodeReader;

const MAGIC: &[u8] = b"NWScript Platform Native Script v1.0";

/// Payload recovered from a matching platform-native envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformNativeImage {
    pub platform_signature: Arc<[u8]>,
    pub payload: Arc<[u8]>,
}

/// Checks the bytecode stream against the exact prefix in spec §6.7 and, if
/// it matches, reassembles and returns the embedded platform-native binary.
/// Returns `None` for any stream that does not match — including a stream
/// that is merely truncated or malformed in a way a real script could never
/// be, since a non-matching prefix simply means "regular script".
pub fn detect_platform_native(code: &Arc<[u8]>) -> Option<PlatformNativeImage> {
    let mut r = BytecodeReader::new(code.clone());

    expect_opcode(&mut r, Opcode::Jsr, ty::UNARY_NONE)?;
    skip_operand(&mut r, 4);
    expect_opcode(&mut r, Opcode::Retn, ty::UNARY_NONE)?;
    expect_opcode(&mut r, Opcode::Retn, ty::UNARY_NONE)?;

    let banner = read_const_string(&mut r)?;
    if &*banner != MAGIC {
        return None;
    }

    let platform_signature = read_const_string(&mut r)?;
    let total_binary_size = read_const_int(&mut r)?;
    if total_binary_size < 0 {
        return None;
    }
    let total_binary_size = total_binary_size as usize;

    let mut payload = Vec::with_capacity(total_binary_size);
    while payload.len() < total_binary_size {
        let chunk = read_const_string(&mut r)?;
        payload.extend_from_slice(&chunk);
    }
    if payload.len() != total_binary_size {
        return None;
    }

    Some(PlatformNativeImage {
        platform_signature,
        payload: Arc::from(payload),
    })
}

fn expect_opcode(r: &mut BytecodeReader, opcode: Opcode, suffix: u8) -> Option<()> {
    let decoded = Disassembler::decode(r).ok()?;
    (decoded.opcode == opcode && decoded.type_suffix == suffix).then_some(())
}

fn skip_operand(r: &mut BytecodeReader, len: u32) {
    r.seek(r.tell() + len);
}

fn read_const_string(r: &mut BytecodeReader) -> Option<Arc<[u8]>> {
    let decoded = Disassembler::decode(r).ok()?;
    if decoded.opcode != Opcode::Const || decoded.type_suffix != ty::UNARY_STRING {
        return None;
    }
    let len = r.read_u16().ok()? as u32;
    r.read_string(len).ok()
}

fn read_const_int(r: &mut BytecodeReader) -> Option<i32> {
    let decoded = Disassembler::decode(r).ok()?;
    if decoded.opcode != Opcode::Const || decoded.type_suffix != ty::UNARY_INT {
        return None;
    }
    r.read_i32().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_const_string(buf: &mut Vec<u8>, s: &[u8]) {
        buf.push(Opcode::Const.as_byte());
        buf.push(ty::UNARY_STRING);
        buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
        buf.extend_from_slice(s);
    }

    fn push_const_int(buf: &mut Vec<u8>, v: i32) {
        buf.push(Opcode::Const.as_byte());
        buf.push(ty::UNARY_INT);
        buf.extend_from_slice(&v.to_be_bytes());
    }

    fn envelope(platform_sig: &[u8], chunks: &[&[u8]]) -> Arc<[u8]> {
        let mut buf = Vec::new();
        buf.push(Opcode::Jsr.as_byte());
        buf.push(ty::UNARY_NONE);
        buf.extend_from_slice(&8i32.to_be_bytes());
        buf.push(Opcode::Retn.as_byte());
        buf.push(ty::UNARY_NONE);
        buf.push(Opcode::Retn.as_byte());
        buf.push(ty::UNARY_NONE);
        push_const_string(&mut buf, MAGIC);
        push_const_string(&mut buf, platform_sig);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        push_const_int(&mut buf, total as i32);
        for chunk in chunks {
            push_const_string(&mut buf, chunk);
        }
        Arc::from(buf)
    }

    #[test]
    fn detects_matching_envelope_and_reassembles_payload() {
        let code = envelope(b"win32", &[b"hel", b"lo!"]);
        let image = detect_platform_native(&code).unwrap();
        assert_eq!(&*image.platform_signature, b"win32");
        assert_eq!(&*image.payload, b"hello!");
    }

    #[test]
    fn rejects_regular_script() {
        let mut buf = Vec::new();
        buf.push(Opcode::RsAdd.as_byte());
        buf.push(ty::UNARY_INT);
        buf.push(Opcode::Retn.as_byte());
        buf.push(ty::UNARY_NONE);
        let code: Arc<[u8]> = Arc::from(buf);
        assert!(detect_platform_native(&code).is_none());
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut code_vec = envelope(b"win32", &[b"short"]).to_vec();
        // Corrupt the declared total size upward so reassembly can never reach it.
        let len = code_vec.len();
        code_vec[len - 5 - 4..len - 5].copy_from_slice(&999i32.to_be_bytes());
        let code: Arc<[u8]> = Arc::from(code_vec);
        assert!(detect_platform_native(&code).is_none());
    }
}
