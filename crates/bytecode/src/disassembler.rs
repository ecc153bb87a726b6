use crate::error::BytecodeError;
use crate::opcode::{type_suffix as ty, Opcode};
use crate::reader::BytecodeReader;

/// Decoded instruction header: opcode, type suffix, the instruction's total
/// length in bytes (header + operands), and the cursor offset — relative to
/// the instruction's start — at which the reader is left sitting. Per spec
/// §4.2 this is typically `2` (right after the opcode/type-suffix header);
/// the caller (VM or analyzer) reads the operands itself from there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub opcode: Opcode,
    pub type_suffix: u8,
    pub length: u32,
    pub cursor_offset: u32,
}

/// Fixed operand byte-width for an (opcode, type-suffix) pair that does not
/// depend on stream content, or `None` for the one case that does
/// (`CONST` with a string operand, whose length is prefixed in the stream).
fn fixed_operand_len(opcode: Opcode, suffix: u8) -> Result<Option<u32>, BytecodeError> {
    use Opcode::*;
    let is_legal_and_len: Option<u32> = match opcode {
        CpDownSp | CpDownBp | CpTopSp | CpTopBp => {
            (suffix == ty::UNARY_STACKOP).then_some(4 + 2)
        }
        RsAdd => matches!(
            suffix,
            ty::UNARY_INT | ty::UNARY_FLOAT | ty::UNARY_STRING | ty::UNARY_OBJECTID
        )
        .then_some(0)
        .or_else(|| ty::is_unary_engine(suffix).then_some(0)),
        Const => match suffix {
            ty::UNARY_INT => Some(4),
            ty::UNARY_FLOAT => Some(4),
            ty::UNARY_OBJECTID => Some(4),
            ty::UNARY_STRING => return Ok(None),
            _ => None,
        },
        Action => (suffix == ty::UNARY_NONE || suffix == ty::UNARY_STACKOP).then_some(2 + 1),
        LogAnd | LogOr | IncOr | ExcOr | BoolAnd | ShLeft | ShRight | UShRight | Mod => {
            (suffix == ty::BINARY_INTINT).then_some(0)
        }
        Equal | NEqual => match suffix {
            ty::BINARY_INTINT
            | ty::BINARY_FLOATFLOAT
            | ty::BINARY_OBJECTIDOBJECTID
            | ty::BINARY_STRINGSTRING => Some(0),
            ty::BINARY_STRUCTSTRUCT => Some(2),
            s if ty::is_binary_engine(s) => Some(0),
            _ => None,
        },
        Geq | Gt | Lt | Leq => {
            matches!(suffix, ty::BINARY_INTINT | ty::BINARY_FLOATFLOAT).then_some(0)
        }
        Add => match suffix {
            ty::BINARY_INTINT
            | ty::BINARY_FLOATFLOAT
            | ty::BINARY_STRINGSTRING
            | ty::BINARY_INTFLOAT
            | ty::BINARY_FLOATINT
            | ty::BINARY_VECTORVECTOR
            | ty::BINARY_VECTORFLOAT
            | ty::BINARY_FLOATVECTOR => Some(0),
            _ => None,
        },
        Sub | Mul | Div => match suffix {
            ty::BINARY_INTINT
            | ty::BINARY_FLOATFLOAT
            | ty::BINARY_INTFLOAT
            | ty::BINARY_FLOATINT
            | ty::BINARY_VECTORVECTOR
            | ty::BINARY_VECTORFLOAT
            | ty::BINARY_FLOATVECTOR => Some(0),
            _ => None,
        },
        Neg => matches!(suffix, ty::UNARY_INT | ty::UNARY_FLOAT).then_some(0),
        Comp | Not => (suffix == ty::UNARY_INT).then_some(0),
        MovSp => (suffix == ty::UNARY_NONE).then_some(4),
        StoreStateAll => (suffix == ty::UNARY_NONE).then_some(4),
        StoreState => (suffix == ty::UNARY_NONE).then_some(4 + 4 + 4),
        Jmp | Jsr | Jz | Jnz => (suffix == ty::UNARY_NONE).then_some(4),
        Retn => (suffix == ty::UNARY_NONE).then_some(0),
        Destruct => (suffix == ty::UNARY_STACKOP).then_some(2 + 2 + 2),
        DecISp | IncISp | DecIBp | IncIBp => (suffix == ty::UNARY_STACKOP).then_some(4),
        SaveBp | RestoreBp | Nop => (suffix == ty::UNARY_NONE).then_some(0),
    };

    match is_legal_and_len {
        Some(len) => Ok(Some(len)),
        None => Err(BytecodeError::InvalidOpcodeType {
            opcode: opcode.as_byte(),
            type_suffix: suffix,
        }),
    }
}

/// Decodes one instruction: opcode, type suffix, total length, operand
/// cursor (spec §4.2). `reader` must be positioned at the instruction start;
/// on success it is left positioned `cursor_offset` bytes past that start.
pub struct Disassembler;

impl Disassembler {
    pub fn decode(reader: &mut BytecodeReader) -> Result<DecodedInstruction, BytecodeError> {
        let start = reader.tell();
        let opcode_byte = reader.read_u8()?;
        let opcode = Opcode::from_byte(opcode_byte)
            .ok_or(BytecodeError::UnknownOpcode { opcode: opcode_byte })?;
        let type_suffix = reader.read_u8()?;

        let operand_len = match fixed_operand_len(opcode, type_suffix)? {
            Some(len) => len,
            None => {
                // Only CONST+UNARY_STRING is variable-length: a u16 byte
                // count precedes the string payload.
                let str_len = reader.read_u16()? as u32;
                2 + str_len
            }
        };

        let length = 2 + operand_len;
        reader.seek(start + 2);

        Ok(DecodedInstruction {
            opcode,
            type_suffix,
            length,
            cursor_offset: 2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn reader(bytes: &[u8]) -> BytecodeReader {
        BytecodeReader::new(Arc::from(bytes))
    }

    #[test]
    fn decodes_retn() {
        let mut r = reader(&[Opcode::Retn.as_byte(), ty::UNARY_NONE]);
        let d = Disassembler::decode(&mut r).unwrap();
        assert_eq!(d.opcode, Opcode::Retn);
        assert_eq!(d.length, 2);
        assert_eq!(d.cursor_offset, 2);
        assert_eq!(r.tell(), 2);
    }

    #[test]
    fn decodes_const_int() {
        let mut r = reader(&[
            Opcode::Const.as_byte(),
            ty::UNARY_INT,
            0x00,
            0x00,
            0x00,
            0x03,
        ]);
        let d = Disassembler::decode(&mut r).unwrap();
        assert_eq!(d.length, 6);
        assert_eq!(r.tell(), 2);
    }

    #[test]
    fn decodes_const_string_variable_length() {
        let mut bytes = vec![Opcode::Const.as_byte(), ty::UNARY_STRING, 0x00, 0x03];
        bytes.extend_from_slice(b"abc");
        let mut r = reader(&bytes);
        let d = Disassembler::decode(&mut r).unwrap();
        assert_eq!(d.length, 2 + 2 + 3);
        assert_eq!(r.tell(), 2);
    }

    #[test]
    fn rejects_illegal_type_suffix() {
        let mut r = reader(&[Opcode::Retn.as_byte(), ty::UNARY_INT]);
        assert_eq!(
            Disassembler::decode(&mut r),
            Err(BytecodeError::InvalidOpcodeType {
                opcode: Opcode::Retn.as_byte(),
                type_suffix: ty::UNARY_INT
            })
        );
    }

    #[test]
    fn rejects_unknown_opcode() {
        let mut r = reader(&[0xFF, 0x00]);
        assert_eq!(
            Disassembler::decode(&mut r),
            Err(BytecodeError::UnknownOpcode { opcode: 0xFF })
        );
    }
}
