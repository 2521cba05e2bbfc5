pub mod access_unit;
pub mod fragmentation_state;
pub mod frame_assembler;
pub mod reassembled_unit;
pub mod reassembler;
pub mod reassembly_outcome;

pub use access_unit::AccessUnit;
pub use frame_assembler::FrameAssembler;
pub use reassembled_unit::ReassembledUnit;
pub use reassembler::{DEFAULT_REASSEMBLY_TIMEOUT, Fragment, Reassembler};
pub use reassembly_outcome::{DropReason, ReassemblyOutcome};
