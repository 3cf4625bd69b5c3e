use as_lib::{assemble, AsmError};
use common::program::{Assembled, Program};
use emu_lib::{Emulator, ExecError, RunSummary, Snapshot, Trace};

use delegate::delegate;
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No program loaded")]
    NoProgram,

    #[error(transparent)]
    Asm(#[from] AsmError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Executed { trace: Trace, snapshot: Snapshot },
    Halted(Snapshot),
}

/// One independent machine: memory, registers and the loaded program. Nothing
/// is shared between sessions.
pub struct Session {
    emu: Emulator,
    program: Option<Program>,
}

impl Session {
    pub fn new() -> Session {
        Session { emu: Emulator::new(), program: None }
    }

    /// Assemble and load. A failed assembly leaves the previous program and
    /// memory in place.
    pub fn assemble(&mut self, source: &str, origin: u32) -> Result<&[Assembled], SessionError> {
        let prog = assemble(source, origin)?;
        info!("Loaded {} instructions at {origin:04X}", prog.instructions.len());
        self.emu.load(&prog);
        let prog = self.program.insert(prog);
        Ok(prog.listing.as_slice())
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    // Starts at the given address, or the origin if none.
    pub fn run(&mut self, start: Option<u32>, max_steps: usize) -> Result<RunSummary, SessionError> {
        let Some(prog) = &self.program else {
            return Err(SessionError::NoProgram);
        };
        let start = start.unwrap_or(prog.origin);
        debug!("Running from {start:04X}, at most {max_steps} steps");
        Ok(self.emu.run_at(start, max_steps)?)
    }

    pub fn seek(&mut self, addr: u32) -> Result<(), SessionError> {
        if self.program.is_none() {
            return Err(SessionError::NoProgram);
        }
        Ok(self.emu.seek(addr)?)
    }

    pub fn step(&mut self) -> Result<StepResult, SessionError> {
        if self.program.is_none() {
            return Err(SessionError::NoProgram);
        }
        Ok(match self.emu.step()? {
            Some(trace) => StepResult::Executed { trace, snapshot: self.emu.snapshot() },
            None => StepResult::Halted(self.emu.snapshot()),
        })
    }

    // Registers and program go; memory stays.
    pub fn reset(&mut self) {
        self.emu.reset();
        self.program = None;
    }

    delegate! {
        to self.emu {
            /// Stopped on HLT.
            pub fn is_halted(&self) -> bool;
            /// Halted, or ran off the end of the program.
            pub fn is_done(&self) -> bool;
            pub fn num_ins(&self) -> usize;
            pub fn snapshot(&self) -> Snapshot;
            pub fn mem_read_byte(&self, addr: u32) -> u8;
            pub fn mem_write_byte(&mut self, addr: u32, val: u8);
            pub fn mem_read_word(&self, addr: u32) -> u16;
            pub fn mem_write_word(&mut self, addr: u32, val: u16);
            /// Copies data in starting at addr, wrapping at the top of memory.
            #[call(mem_load)]
            pub fn mem_write_bytes(&mut self, addr: u32, data: &[u8]);
            #[call(mem_clear)]
            pub fn clear_memory(&mut self);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
