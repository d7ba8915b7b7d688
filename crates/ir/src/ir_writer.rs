//! Textual form of the IR, used by tests and debug logging.
use std::io;

use crate::{
    module::{FuncRef, ModuleCtx},
    types::{write_types_with_delim, StructData},
    BlockId, Function, InstId, Module, Type, ValueId,
};

pub trait WriteWithModule {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()>;

    fn dump_string(&self, ctx: &ModuleCtx) -> String {
        let mut s = Vec::new();
        if self.write(ctx, &mut s).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&s).into_owned()
    }
}

pub trait WriteWithFunc {
    fn write(&self, ctx: &FuncWriteCtx, w: &mut impl io::Write) -> io::Result<()>;

    fn dump_string(&self, ctx: &FuncWriteCtx) -> String {
        let mut s = Vec::new();
        if self.write(ctx, &mut s).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&s).into_owned()
    }
}

impl<T> WriteWithFunc for &T
where
    T: WriteWithFunc,
{
    fn write(&self, ctx: &FuncWriteCtx, w: &mut impl io::Write) -> io::Result<()> {
        (*self).write(ctx, w)
    }
}

pub struct FuncWriteCtx<'a> {
    pub func: &'a Function,
    pub func_ref: FuncRef,
}

impl<'a> FuncWriteCtx<'a> {
    pub fn new(func: &'a Function, func_ref: FuncRef) -> Self {
        Self { func, func_ref }
    }

    pub fn module_ctx(&self) -> &ModuleCtx {
        self.func.ctx()
    }

    pub fn write_iter_with_delim<T>(
        &self,
        iter: impl Iterator<Item = T>,
        delim: &str,
        w: &mut impl io::Write,
    ) -> io::Result<()>
    where
        T: WriteWithFunc,
    {
        let mut iter = iter.peekable();
        while let Some(item) = iter.next() {
            item.write(self, w)?;
            if iter.peek().is_some() {
                w.write_all(delim.as_bytes())?;
            }
        }

        Ok(())
    }
}

pub struct ModuleWriter<'a> {
    module: &'a Module,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    pub fn write(&mut self, w: &mut impl io::Write) -> io::Result<()> {
        let ctx = &self.module.ctx;
        writeln!(w, "target = \"{}\"", ctx.triple)?;

        // Resolve module level items up front so that writing them doesn't
        // hold the stores.
        let structs: Vec<StructData> =
            ctx.with_ty_store(|s| s.all_struct_data().cloned().collect());
        for data in structs {
            write_struct_def(ctx, &data, w)?;
        }

        let gvs: Vec<_> = ctx.with_gv_store(|s| s.all_gvs().map(|(_, data)| data.clone()).collect());
        for gv in gvs {
            gv.write(ctx, w)?;
            writeln!(w)?;
        }
        writeln!(w)?;

        for func_ref in self.module.funcs.keys() {
            let func = &self.module.funcs[func_ref];
            FuncWriter::new(func_ref, func).write(w)?;
            writeln!(w)?;
        }

        Ok(())
    }

    pub fn dump_string(&mut self) -> String {
        let mut s = Vec::new();
        if self.write(&mut s).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&s).into_owned()
    }
}

pub struct FuncWriter<'a> {
    ctx: FuncWriteCtx<'a>,
    level: u8,
}

impl<'a> FuncWriter<'a> {
    pub fn new(func_ref: FuncRef, func: &'a Function) -> Self {
        Self {
            ctx: FuncWriteCtx::new(func, func_ref),
            level: 0,
        }
    }

    pub fn write(&mut self, w: &mut impl io::Write) -> io::Result<()> {
        let module = self.ctx.module_ctx();
        let sig = module.func_sig(self.ctx.func_ref, |sig| sig.clone());
        if self.ctx.func.is_declaration() {
            sig.write(module, w)?;
            return writeln!(w, ";");
        }

        write!(w, "func {} %{}(", sig.linkage(), sig.name())?;
        self.ctx.write_iter_with_delim(
            self.ctx.func.arg_values.iter().map(|v| ValueWithTy(*v)),
            ", ",
            w,
        )?;
        write!(w, ")")?;
        if !sig.ret_ty().is_unit() {
            write!(w, " -> ")?;
            sig.ret_ty().write(module, w)?;
        }
        if let Some(elem_types) = sig.elem_types() {
            w.write_all(b" ")?;
            elem_types.write(module, w)?;
        }
        writeln!(w, " {{")?;

        self.level += 1;
        for block in self.ctx.func.layout.iter_block() {
            self.write_block_with_inst(block, w)?;
        }
        self.level -= 1;

        writeln!(w, "}}")
    }

    pub fn write_block_with_inst(
        &mut self,
        block: BlockId,
        w: &mut impl io::Write,
    ) -> io::Result<()> {
        self.indent(w)?;
        write!(w, "block{}", block.0)?;
        self.enter(w)?;
        for inst in self.ctx.func.layout.iter_inst(block) {
            self.indent(w)?;
            inst.write(&self.ctx, w)?;
            w.write_all(b";\n")?;
        }
        self.leave();

        Ok(())
    }

    /// Writes a single instruction without indentation.
    pub fn dump_inst(&self, inst: InstId) -> String {
        inst.dump_string(&self.ctx)
    }

    pub fn dump_string(&mut self) -> String {
        let mut s = Vec::new();
        if self.write(&mut s).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&s).into_owned()
    }

    fn indent(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_all(" ".repeat(self.level as usize * 4).as_bytes())
    }

    fn enter(&mut self, w: &mut impl io::Write) -> io::Result<()> {
        self.level += 1;
        w.write_all(b":\n")
    }

    fn leave(&mut self) {
        self.level -= 1;
    }
}

struct ValueWithTy(ValueId);

impl WriteWithFunc for ValueWithTy {
    fn write(&self, ctx: &FuncWriteCtx, w: &mut impl io::Write) -> io::Result<()> {
        self.0.write(ctx, w)?;
        w.write_all(b".")?;
        ctx.func.dfg.value_ty(self.0).write(ctx.module_ctx(), w)
    }
}

fn write_struct_def(ctx: &ModuleCtx, data: &StructData, w: &mut impl io::Write) -> io::Result<()> {
    let Some(name) = &data.name else {
        return Ok(());
    };

    write!(w, "type @{name} = ")?;
    write!(w, "{}", if data.packed { "<{" } else { "{" })?;
    write_types_with_delim(ctx, w, &data.fields, ", ")?;
    writeln!(w, "{};", if data.packed { "}>" } else { "}" })
}

/// Shorthand used by debug logging.
pub fn dump_type(ctx: &ModuleCtx, ty: Type) -> String {
    ty.dump_string(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::test_util::{dump_func, dump_module, TestModuleBuilder},
        AddrSpace, Constant, GlobalVariableData, Linkage,
    };

    #[test]
    fn write_func() {
        let mut mb = TestModuleBuilder::new();
        let mut builder = mb.func_builder(&[Type::PTR, Type::I64], Type::I32);
        let b0 = builder.append_block();
        let b1 = builder.append_block();
        let [p, idx] = [builder.args()[0], builder.args()[1]];

        builder.switch_to_block(b0);
        let arr = builder.module_builder.declare_array_type(Type::I32, 4);
        let zero = builder.make_imm_value(0i64);
        let addr = builder.gep(arr, &[p, zero, idx]);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v = builder.load(addr, Type::I32);
        builder.ret(Some(v));
        builder.finish();

        let func_ref = mb.func_ref().unwrap();
        let module = mb.build();
        insta::assert_snapshot!(dump_func(&module, func_ref), @r"
        func public %test_func(v0.ptr, v1.i64) -> i32 {
            block0:
                v3.ptr = gep [i32; 4] v0 0.i64 v1;
                jump block1;
            block1:
                v4.i32 = load v3;
                return v4;
        }
        ");
    }

    #[test]
    fn write_module_items() {
        let mut mb = TestModuleBuilder::new();
        let pair = mb
            .module_builder
            .declare_struct_type("pair", &[Type::I32, Type::PTR], false);
        mb.module_builder.make_global(GlobalVariableData::new(
            "g".to_string(),
            pair,
            AddrSpace(1),
            Linkage::Private,
            false,
            Some(Constant::Zero(pair)),
        ));
        let module = mb.build();

        assert_eq!(
            dump_module(&module),
            "target = \"air64-bitcode-7.0\"
type @pair = {i32, ptr};
global private addrspace(1) @pair %g = zero.@pair;

"
        );
    }
}
