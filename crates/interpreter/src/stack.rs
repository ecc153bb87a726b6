use std::sync::Arc;

use primitives::{EngineHandle, ObjectId, StackValue, Tag};

use crate::error::InterpreterError;

/// The typed operand stack shared by the VM and the saved-state codec.
///
/// Every slot is one [`StackValue`] cell; a `Vector` is a convention of
/// three consecutive `Float` cells, never pushed or popped as a unit except
/// through [`StackMachine::push_vector`]/[`StackMachine::pop_vector`]. All
/// offsets and sizes in this API are measured in cells, not bytes — the VM
/// divides the byte-denominated bytecode operands by
/// [`primitives::CELL_SIZE`] before calling in, the same way
/// `revm-interpreter::Stack` indexes in words rather than bytes.
#[derive(Clone, Debug, Default)]
pub struct StackMachine {
    data: Vec<StackValue>,
    bp: u32,
}

impl StackMachine {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            bp: 0,
        }
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bp(&self) -> u32 {
        self.bp
    }

    pub fn as_slice(&self) -> &[StackValue] {
        &self.data
    }

    fn push(&mut self, v: StackValue) {
        self.data.push(v);
    }

    fn pop(&mut self) -> Result<StackValue, InterpreterError> {
        self.data.pop().ok_or(InterpreterError::StackUnderflow)
    }

    pub fn push_int(&mut self, v: i32) {
        self.push(StackValue::Int(v));
    }

    pub fn push_float(&mut self, v: f32) {
        self.push(StackValue::Float(v));
    }

    pub fn push_string(&mut self, v: Arc<[u8]>) {
        self.push(StackValue::String(v));
    }

    pub fn push_object(&mut self, v: ObjectId) {
        self.push(StackValue::Object(v));
    }

    pub fn push_engine(&mut self, handle: EngineHandle) {
        self.push(StackValue::Engine(handle));
    }

    pub fn push_vector(&mut self, x: f32, y: f32, z: f32) {
        self.push_float(x);
        self.push_float(y);
        self.push_float(z);
    }

    pub fn pop_int(&mut self) -> Result<i32, InterpreterError> {
        match self.pop()? {
            StackValue::Int(v) => Ok(v),
            other => Err(mismatch(Tag::Int, other.tag())),
        }
    }

    pub fn pop_float(&mut self) -> Result<f32, InterpreterError> {
        match self.pop()? {
            StackValue::Float(v) => Ok(v),
            other => Err(mismatch(Tag::Float, other.tag())),
        }
    }

    pub fn pop_string(&mut self) -> Result<Arc<[u8]>, InterpreterError> {
        match self.pop()? {
            StackValue::String(v) => Ok(v),
            other => Err(mismatch(Tag::String, other.tag())),
        }
    }

    pub fn pop_object(&mut self) -> Result<ObjectId, InterpreterError> {
        match self.pop()? {
            StackValue::Object(v) => Ok(v),
            other => Err(mismatch(Tag::Object, other.tag())),
        }
    }

    pub fn pop_engine(&mut self, expected: primitives::EngineTypeId) -> Result<EngineHandle, InterpreterError> {
        match self.pop()? {
            StackValue::Engine(h) if h.type_id() == expected => Ok(h),
            other => Err(mismatch(Tag::Engine(expected), other.tag())),
        }
    }

    /// Pops three `Float` cells, top-to-bottom `z, y, x`, returning `(x, y, z)`.
    pub fn pop_vector(&mut self) -> Result<(f32, f32, f32), InterpreterError> {
        let z = self.pop_float()?;
        let y = self.pop_float()?;
        let x = self.pop_float()?;
        Ok((x, y, z))
    }

    /// Deallocates `-delta` cells from the top. `delta` must be non-positive
    /// (spec §4.3: `MoveSP` never grows the stack).
    pub fn move_sp(&mut self, delta_cells: i32) -> Result<(), InterpreterError> {
        if delta_cells > 0 {
            return Err(InterpreterError::StackOverflow);
        }
        let shrink = (-delta_cells) as usize;
        if shrink > self.data.len() {
            return Err(InterpreterError::StackUnderflow);
        }
        self.data.truncate(self.data.len() - shrink);
        Ok(())
    }

    /// Copies `size_cells` cells from the top down to `SP + offset_cells`
    /// (spec §4.3: `CPDownSP`). Source and destination ranges must not
    /// overlap.
    pub fn cp_down_sp(&mut self, offset_cells: i32, size_cells: u32) -> Result<(), InterpreterError> {
        let top = self.data.len();
        let size = size_cells as usize;
        if size > top {
            return Err(InterpreterError::StackUnderflow);
        }
        let src_start = top - size;
        let dest_start = checked_index(top, offset_cells)?;
        let dest_end = dest_start
            .checked_add(size)
            .ok_or(InterpreterError::StackOverflow)?;
        if dest_end > top {
            return Err(InterpreterError::StackOverflow);
        }
        if ranges_overlap(src_start, src_start + size, dest_start, dest_end) {
            return Err(InterpreterError::StackOverflow);
        }
        for i in 0..size {
            self.data[dest_start + i] = self.data[src_start + i].clone();
        }
        Ok(())
    }

    /// Duplicates `size_cells` cells read from `SP + offset_cells` onto the
    /// top (spec §4.3: `CPTopSP`).
    pub fn cp_top_sp(&mut self, offset_cells: i32, size_cells: u32) -> Result<(), InterpreterError> {
        let top = self.data.len();
        let size = size_cells as usize;
        let src_start = checked_index(top, offset_cells)?;
        let src_end = src_start
            .checked_add(size)
            .ok_or(InterpreterError::StackOverflow)?;
        if src_end > top {
            return Err(InterpreterError::StackOverflow);
        }
        for i in 0..size {
            let cell = self.data[src_start + i].clone();
            self.data.push(cell);
        }
        Ok(())
    }

    /// Pops `size_cells` cells but retains the hole
    /// `[ex_offset, ex_offset + ex_size)` measured from the start of that
    /// block; the retained cells become the new top, in order
    /// (spec §4.3: `Destruct`).
    pub fn destruct(
        &mut self,
        size_cells: u32,
        ex_offset_cells: i32,
        ex_size_cells: u32,
    ) -> Result<(), InterpreterError> {
        let top = self.data.len();
        let size = size_cells as usize;
        if size > top {
            return Err(InterpreterError::StackUnderflow);
        }
        let block_start = top - size;
        let retain_start = checked_index(size, ex_offset_cells)?;
        let retain_end = retain_start
            .checked_add(ex_size_cells as usize)
            .ok_or(InterpreterError::StackOverflow)?;
        if retain_end > size {
            return Err(InterpreterError::StackOverflow);
        }
        let retained: Vec<StackValue> =
            self.data[block_start + retain_start..block_start + retain_end].to_vec();
        self.data.truncate(block_start);
        self.data.extend(retained);
        Ok(())
    }

    /// Pushes the current BP as a marked cell and sets `BP = SP`.
    pub fn save_bp(&mut self) {
        self.push(StackValue::BasePointer(self.bp));
        self.bp = self.data.len() as u32;
    }

    /// Pops the marked cell pushed by [`StackMachine::save_bp`] and restores
    /// the previous BP.
    pub fn restore_bp(&mut self) -> Result<(), InterpreterError> {
        match self.pop()? {
            StackValue::BasePointer(prev) => {
                self.bp = prev;
                Ok(())
            }
            other => Err(mismatch(Tag::BasePointer, other.tag())),
        }
    }

    /// Pushes `cells_to_copy` cells read from `SP + src_offset_cells` of
    /// `self` onto `sink` (spec §4.3: `AppendToOther`), used by situation
    /// capture and action-argument marshalling.
    pub fn append_to_other(
        &self,
        sink: &mut StackMachine,
        src_offset_cells: i32,
        cells_to_copy: u32,
    ) -> Result<(), InterpreterError> {
        let top = self.data.len();
        let src_start = checked_index(top, src_offset_cells)?;
        let src_end = src_start
            .checked_add(cells_to_copy as usize)
            .ok_or(InterpreterError::StackOverflow)?;
        if src_end > top {
            return Err(InterpreterError::StackOverflow);
        }
        for cell in &self.data[src_start..src_end] {
            sink.push(cell.clone());
        }
        Ok(())
    }

    /// Reads the `Int` cell at `SP + offset_cells` without popping it, for
    /// `DECISP`/`DECIBP`/`INCISP`/`INCIBP` (spec §4.4).
    pub fn read_int_at(&self, offset_cells: i32) -> Result<i32, InterpreterError> {
        let idx = checked_index(self.data.len(), offset_cells)?;
        match self.data.get(idx) {
            Some(StackValue::Int(v)) => Ok(*v),
            Some(other) => Err(mismatch(Tag::Int, other.tag())),
            None => Err(InterpreterError::StackOverflow),
        }
    }

    /// Overwrites the `Int` cell at `SP + offset_cells` in place.
    pub fn write_int_at(&mut self, offset_cells: i32, value: i32) -> Result<(), InterpreterError> {
        let idx = checked_index(self.data.len(), offset_cells)?;
        match self.data.get_mut(idx) {
            Some(cell @ StackValue::Int(_)) => {
                *cell = StackValue::Int(value);
                Ok(())
            }
            Some(other) => Err(mismatch(Tag::Int, other.tag())),
            None => Err(InterpreterError::StackOverflow),
        }
    }

    /// Low-level escape hatch for the situation codec, which needs to push
    /// fully-formed cells (e.g. a saved globals snapshot) without going
    /// through the typed `push_*` family.
    pub(crate) fn push_cell(&mut self, cell: StackValue) {
        self.push(cell);
    }

    pub(crate) fn pop_cell(&mut self) -> Result<StackValue, InterpreterError> {
        self.pop()
    }
}

fn mismatch(expected: Tag, found: Tag) -> InterpreterError {
    InterpreterError::TypeMismatch { expected, found }
}

fn checked_index(base: usize, offset: i32) -> Result<usize, InterpreterError> {
    let idx = base as i64 + offset as i64;
    if idx < 0 {
        return Err(InterpreterError::StackUnderflow);
    }
    Ok(idx as usize)
}

fn ranges_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_int_roundtrips() {
        let mut s = StackMachine::new();
        s.push_int(42);
        assert_eq!(s.pop_int().unwrap(), 42);
    }

    #[test]
    fn pop_type_mismatch() {
        let mut s = StackMachine::new();
        s.push_int(1);
        assert_eq!(
            s.pop_float(),
            Err(InterpreterError::TypeMismatch {
                expected: Tag::Float,
                found: Tag::Int
            })
        );
    }

    #[test]
    fn vector_roundtrips_in_xyz_order() {
        let mut s = StackMachine::new();
        s.push_vector(1.0, 2.0, 3.0);
        assert_eq!(s.pop_vector().unwrap(), (1.0, 2.0, 3.0));
    }

    #[test]
    fn move_sp_rejects_positive_delta() {
        let mut s = StackMachine::new();
        assert_eq!(s.move_sp(1), Err(InterpreterError::StackOverflow));
    }

    #[test]
    fn move_sp_shrinks_stack() {
        let mut s = StackMachine::new();
        s.push_int(1);
        s.push_int(2);
        s.move_sp(-1).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.pop_int().unwrap(), 1);
    }

    #[test]
    fn cp_down_sp_copies_top_block_downward() {
        let mut s = StackMachine::new();
        s.push_int(10);
        s.push_int(20);
        s.push_int(99); // to be overwritten
        // overwrite the single cell at SP-1 with the top cell (size=1)
        s.cp_down_sp(-2, 1).unwrap();
        assert_eq!(s.as_slice()[1], StackValue::Int(99));
    }

    #[test]
    fn cp_down_sp_rejects_overlap() {
        let mut s = StackMachine::new();
        s.push_int(1);
        s.push_int(2);
        // source = last 2 cells (offset 0..2), dest offset -1 overlaps.
        assert_eq!(s.cp_down_sp(-1, 2), Err(InterpreterError::StackOverflow));
    }

    #[test]
    fn cp_top_sp_duplicates_without_removing_source() {
        let mut s = StackMachine::new();
        s.push_int(7);
        s.push_int(8);
        s.cp_top_sp(-2, 2).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.pop_int().unwrap(), 8);
        assert_eq!(s.pop_int().unwrap(), 7);
        assert_eq!(s.pop_int().unwrap(), 8);
        assert_eq!(s.pop_int().unwrap(), 7);
    }

    #[test]
    fn destruct_retains_hole_as_new_top() {
        let mut s = StackMachine::new();
        s.push_int(1);
        s.push_int(2);
        s.push_int(3);
        // block of 3: retain the middle cell only.
        s.destruct(3, 1, 1).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.pop_int().unwrap(), 2);
    }

    #[test]
    fn save_and_restore_bp() {
        let mut s = StackMachine::new();
        assert_eq!(s.bp(), 0);
        s.push_int(1);
        s.save_bp();
        assert_eq!(s.bp(), 2);
        s.push_int(2);
        s.restore_bp().unwrap();
        assert_eq!(s.bp(), 0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn read_and_write_int_at_offset() {
        let mut s = StackMachine::new();
        s.push_int(1);
        s.push_int(2);
        assert_eq!(s.read_int_at(-1).unwrap(), 2);
        s.write_int_at(-2, 99).unwrap();
        assert_eq!(s.pop_int().unwrap(), 2);
        assert_eq!(s.pop_int().unwrap(), 99);
    }

    #[test]
    fn append_to_other_copies_without_mutating_source() {
        let mut src = StackMachine::new();
        src.push_int(1);
        src.push_int(2);
        let mut sink = StackMachine::new();
        src.append_to_other(&mut sink, -2, 2).unwrap();
        assert_eq!(src.len(), 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.pop_int().unwrap(), 2);
    }
}
