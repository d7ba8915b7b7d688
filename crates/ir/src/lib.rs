pub mod builder;
pub mod constant;
pub mod dfg;
pub mod func_cursor;
pub mod function;
pub mod global_variable;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod types;
pub mod value;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use constant::Constant;
pub use dfg::{Block, BlockId, DataFlowGraph};
pub use func_cursor::{CursorLocation, FuncCursor, InstInserter};
pub use function::{ElemTypeAnnotation, Function, Signature};
pub use global_variable::{GlobalVariableData, GlobalVariableRef};
pub use inst::{InstData, InstId};
pub use layout::Layout;
pub use linkage::Linkage;
pub use module::{FuncRef, Module, ModuleCtx};
pub use types::{AddrSpace, Type};
pub use value::{ConstExpr, Immediate, Value, ValueId};
