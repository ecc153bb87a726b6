use std::path::PathBuf;

use analyzer::ActionTable;
use bytecode::{BytecodeReader, Disassembler};
use clap::Parser;
use primitives::ActionSignature;

use crate::cmd::input::{load_bytes, InputError};

/// `bytecode` subcommand: linear disassembly plus a pass-1 structural
/// summary, the way `revme bytecode` prints an EOF container's layout.
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Hex-encoded compiled script.
    #[arg(required_unless_present = "path")]
    bytes: Option<String>,
    /// Path to a file containing the hex-encoded compiled script.
    #[arg(long)]
    path: Option<PathBuf>,
    /// Also run structural analysis (pass 1) and print its summary.
    #[arg(long)]
    analyze: bool,
    /// Run all three passes and dump each subroutine's lifted IR.
    #[arg(long)]
    ir: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Bytecode(#[from] bytecode::BytecodeError),
    #[error(transparent)]
    Analyzer(#[from] analyzer::AnalyzerError),
}

struct NoActions;
impl ActionTable for NoActions {
    fn signature(&self, _ordinal: u16) -> Option<&ActionSignature> {
        None
    }
}

impl Cmd {
    pub fn run(&self) -> Result<(), Error> {
        let code = load_bytes(&self.bytes, &self.path)?;

        let mut reader = BytecodeReader::new(code.clone());
        while !reader.is_eof() {
            let pc = reader.tell();
            let decoded = Disassembler::decode(&mut reader)?;
            let operand_len = decoded.length - decoded.cursor_offset;
            reader.seek(pc + decoded.length);
            println!(
                "{pc:>6}: {:?} suffix=0x{:02X} len={} operand_bytes={}",
                decoded.opcode, decoded.type_suffix, decoded.length, operand_len
            );
        }

        if self.analyze {
            let entry = analyzer::structure::discover_entry(&code)?;
            println!(
                "\nentry: pc={} has_int_return={} globals_pc={:?}",
                entry.entry_pc, entry.has_int_return, entry.globals_pc
            );
            let analysis = analyzer::structure::analyze_structure(&code, &NoActions)?;
            println!("global_count: {}", analysis.global_count);
            println!("subroutines: {}", analysis.subroutines.len());
            for sub in &analysis.subroutines {
                println!(
                    "  entry_pc={} param_size={:?} flow_count={} flags={:?}",
                    sub.entry_pc,
                    sub.param_size,
                    sub.flows.len(),
                    sub.flags
                );
            }
        }

        if self.ir {
            let program = analyzer::analyze_program(&code, &NoActions, true)?;
            for sub in &program.subroutines {
                println!("\nsubroutine entry_pc={} param_size={:?}", sub.entry_pc, sub.param_size);
                for flow in &sub.flows {
                    println!(
                        "  flow [{}..{}) start_sp={} end_sp={:?} termination={:?}",
                        flow.start_pc, flow.end_pc, flow.start_sp, flow.end_sp, flow.termination
                    );
                    for instr in &flow.instructions {
                        println!("    pc={} {:?}", instr.origin_pc, instr.op);
                    }
                }
            }
        }

        Ok(())
    }
}
