//! 宿主解释器：值模型、字节码、脉络与运行循环

pub mod chunk;
pub mod engine;
pub mod registry;
pub mod strand;
pub mod value;

pub use chunk::{Chunk, Op};
pub use engine::{CallCtx, Engine, StepResult};
pub use registry::RegSlot;
pub use strand::{Strand, StrandState};
pub use value::{CapTable, Function, Table, TableKey, TypeTag, UserData, Value};
