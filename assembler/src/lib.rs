pub mod assembler;
pub mod encode;
pub mod ir;
pub mod misc;

pub use assembler::assemble;
pub use misc::AsmError;
