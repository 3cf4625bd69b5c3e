pub mod emulator;
pub mod emulator_state;

pub use emulator::{Emulator, ExecError, RunSummary, Trace};
pub use emulator_state::{EmulatorState, Memory, Registers, Snapshot, Status};
