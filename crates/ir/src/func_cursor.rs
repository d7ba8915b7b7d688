use super::{BlockId, Function, InstData, InstId, ValueId};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorLocation {
    At(InstId),
    BlockTop(BlockId),
    BlockBottom(BlockId),
    #[default]
    NoWhere,
}

pub trait FuncCursor {
    fn at_location(loc: CursorLocation) -> Self;
    fn set_location(&mut self, loc: CursorLocation);
    fn loc(&self) -> CursorLocation;

    fn set_to_entry(&mut self, func: &Function) {
        let loc = if let Some(entry) = func.layout.entry_block() {
            CursorLocation::BlockTop(entry)
        } else {
            CursorLocation::NoWhere
        };

        self.set_location(loc);
    }

    /// Inserts `inst` right after the current location.
    fn insert_inst(&mut self, func: &mut Function, inst: InstId) {
        match self.loc() {
            CursorLocation::At(at) => func.layout.insert_inst_after(inst, at),
            CursorLocation::BlockTop(block) => func.layout.prepend_inst(inst, block),
            CursorLocation::BlockBottom(block) => func.layout.append_inst(inst, block),
            CursorLocation::NoWhere => panic!("cursor loc points to `NoWhere`"),
        }
    }

    fn append_inst(&mut self, func: &mut Function, inst: InstId) {
        let current_block = self.expect_block(func);
        func.layout.append_inst(inst, current_block);
    }

    fn insert_inst_data(&mut self, func: &mut Function, data: InstData) -> InstId {
        let inst = func.dfg.make_inst(data);
        self.insert_inst(func, inst);
        inst
    }

    fn append_inst_data(&mut self, func: &mut Function, data: InstData) -> InstId {
        let inst = func.dfg.make_inst(data);
        self.append_inst(func, inst);
        inst
    }

    /// Inserts `data` and makes its result, moving the cursor onto the new
    /// instruction.
    fn insert_inst_data_with_result(
        &mut self,
        func: &mut Function,
        data: InstData,
    ) -> (InstId, Option<ValueId>) {
        let inst = self.insert_inst_data(func, data);
        let result = self.make_result(func, inst);
        if let Some(result) = result {
            self.attach_result(func, inst, result);
        }
        self.set_location(CursorLocation::At(inst));
        (inst, result)
    }

    fn replace(&mut self, func: &mut Function, inst_data: InstData) {
        let inst = self.expect_inst();
        func.dfg.replace_inst(inst, inst_data);
    }

    fn make_result(&mut self, func: &mut Function, inst: InstId) -> Option<ValueId> {
        let value_data = func.dfg.make_result(inst)?;
        Some(func.dfg.make_value(value_data))
    }

    fn attach_result(&mut self, func: &mut Function, inst: InstId, value: ValueId) {
        func.dfg.attach_result(inst, value)
    }

    fn make_block(&mut self, func: &mut Function) -> BlockId {
        func.dfg.make_block()
    }

    fn append_block(&mut self, func: &mut Function, block: BlockId) {
        func.layout.append_block(block);
    }

    fn inst(&self) -> Option<InstId> {
        if let CursorLocation::At(inst) = self.loc() {
            Some(inst)
        } else {
            None
        }
    }

    fn expect_inst(&self) -> InstId {
        let Some(inst) = self.inst() else {
            panic!("current cursor location doesn't point to inst");
        };
        inst
    }

    fn block(&self, func: &Function) -> Option<BlockId> {
        match self.loc() {
            CursorLocation::At(inst) => Some(func.layout.inst_block(inst)),
            CursorLocation::BlockTop(block) | CursorLocation::BlockBottom(block) => Some(block),
            CursorLocation::NoWhere => None,
        }
    }

    fn expect_block(&self, func: &Function) -> BlockId {
        let Some(block) = self.block(func) else {
            panic!("cursor loc points to `NoWhere`");
        };
        block
    }

    fn next_loc(&self, func: &Function) -> CursorLocation {
        match self.loc() {
            CursorLocation::At(inst) => func.layout.next_inst_of(inst).map_or_else(
                || CursorLocation::BlockBottom(func.layout.inst_block(inst)),
                CursorLocation::At,
            ),
            CursorLocation::BlockTop(block) => func
                .layout
                .first_inst_of(block)
                .map_or_else(|| CursorLocation::BlockBottom(block), CursorLocation::At),
            CursorLocation::BlockBottom(block) => func
                .layout
                .next_block_of(block)
                .map_or(CursorLocation::NoWhere, CursorLocation::BlockTop),
            CursorLocation::NoWhere => CursorLocation::NoWhere,
        }
    }

    /// Returns the location just before the current one inside the same
    /// block. Inserting there places an instruction before the current one.
    fn prev_loc(&self, func: &Function) -> CursorLocation {
        match self.loc() {
            CursorLocation::At(inst) => func.layout.prev_inst_of(inst).map_or_else(
                || CursorLocation::BlockTop(func.layout.inst_block(inst)),
                CursorLocation::At,
            ),
            CursorLocation::BlockBottom(block) => func
                .layout
                .last_inst_of(block)
                .map_or_else(|| CursorLocation::BlockTop(block), CursorLocation::At),
            CursorLocation::BlockTop(_) | CursorLocation::NoWhere => CursorLocation::NoWhere,
        }
    }

    fn proceed(&mut self, func: &Function) {
        self.set_location(self.next_loc(func));
    }

    fn back(&mut self, func: &Function) {
        self.set_location(self.prev_loc(func));
    }
}

#[derive(Debug, Default)]
pub struct InstInserter {
    loc: CursorLocation,
}

impl InstInserter {
    /// Makes an inserter whose next insertion lands right before `inst`.
    pub fn before(func: &Function, inst: InstId) -> Self {
        let mut inserter = Self::at_location(CursorLocation::At(inst));
        inserter.back(func);
        inserter
    }

    /// Makes an inserter whose next insertion lands right after `inst`.
    pub fn after(inst: InstId) -> Self {
        Self::at_location(CursorLocation::At(inst))
    }
}

impl FuncCursor for InstInserter {
    fn at_location(loc: CursorLocation) -> Self {
        Self { loc }
    }

    fn set_location(&mut self, loc: CursorLocation) {
        self.loc = loc;
    }

    fn loc(&self) -> CursorLocation {
        self.loc
    }
}
