mod func_builder;
mod module_builder;

pub use func_builder::FunctionBuilder;
pub use module_builder::ModuleBuilder;

pub mod test_util {
    use super::*;

    use ptrlift_triple::TargetTriple;

    use crate::{
        func_cursor::InstInserter,
        ir_writer::{FuncWriter, ModuleWriter},
        module::{FuncRef, Module, ModuleCtx},
        Linkage, Signature, Type,
    };

    /// Returns a module context targeting the newer legacy writer.
    pub fn test_ctx() -> ModuleCtx {
        let Ok(triple) = TargetTriple::parse("air64-bitcode-7.0") else {
            unreachable!()
        };
        ModuleCtx::new(triple)
    }

    pub struct TestModuleBuilder {
        pub module_builder: ModuleBuilder,
        func_ref: Option<FuncRef>,
    }

    impl TestModuleBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_ctx(ctx: ModuleCtx) -> Self {
            Self {
                module_builder: ModuleBuilder::new(ctx),
                func_ref: None,
            }
        }

        pub fn func_builder(
            &mut self,
            args: &[Type],
            ret_ty: Type,
        ) -> FunctionBuilder<'_, InstInserter> {
            let sig = Signature::new("test_func", Linkage::Public, args, ret_ty);
            let func_ref = self.module_builder.declare_function(sig);
            self.func_ref = Some(func_ref);
            self.module_builder.func_builder(func_ref)
        }

        /// Returns the function made by the last `func_builder` call.
        pub fn func_ref(&self) -> Option<FuncRef> {
            self.func_ref
        }

        pub fn build(self) -> Module {
            self.module_builder.build()
        }
    }

    impl Default for TestModuleBuilder {
        fn default() -> Self {
            Self::with_ctx(test_ctx())
        }
    }

    pub fn dump_func(module: &Module, func_ref: FuncRef) -> String {
        FuncWriter::new(func_ref, &module.funcs[func_ref]).dump_string()
    }

    pub fn dump_module(module: &Module) -> String {
        ModuleWriter::new(module).dump_string()
    }
}
