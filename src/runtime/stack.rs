use crate::runtime::error::{self, RuntimeError, RuntimeResult};
use crate::runtime::value::{Type, Variable};

/// Anything whose lifetime is tied to a lexical scope.
#[derive(Debug)]
pub enum StackItem {
    Variable(Variable),
    Type(Type),
}

impl StackItem {
    fn label(&self) -> &'static str {
        match self {
            StackItem::Variable(_) => "variable",
            StackItem::Type(_) => "type",
        }
    }
}

#[derive(Debug)]
struct Slot {
    stamp: u64,
    item: StackItem,
}

/// Handle to a variable living on the scope stack. The stamp ties it to one
/// particular allocation of its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId {
    index: usize,
    stamp: u64,
}

impl VarId {
    pub fn slot(&self) -> usize {
        self.index
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    index: usize,
    stamp: u64,
}

/// Stack height recorded on scope entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl Mark {
    pub fn height(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct ScopeStack {
    slots: Vec<Slot>,
    next_stamp: u64,
    trace: bool,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

impl ScopeStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.max(1)),
            next_stamp: 0,
            trace: false,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn push(&mut self, item: StackItem) -> (usize, u64) {
        if self.slots.len() == self.slots.capacity() {
            let grow_by = self.slots.capacity().max(1);
            self.slots.reserve_exact(grow_by);
            tracing::trace!(capacity = self.slots.capacity(), "scope stack grown");
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        let index = self.slots.len();
        if self.trace {
            tracing::debug!(index, kind = item.label(), "scope stack push");
        }
        self.slots.push(Slot { stamp, item });
        (index, stamp)
    }

    pub fn push_variable(&mut self, variable: Variable) -> VarId {
        let (index, stamp) = self.push(StackItem::Variable(variable));
        VarId { index, stamp }
    }

    pub fn push_type(&mut self, ty: Type) -> TypeHandle {
        let (index, stamp) = self.push(StackItem::Type(ty));
        TypeHandle { index, stamp }
    }

    pub fn save(&self) -> Mark {
        tracing::trace!(mark = self.slots.len(), "scope saved");
        Mark(self.slots.len())
    }

    /// Destroys everything above `mark`, newest first, handing each item to
    /// `visit` before it is dropped.
    pub fn restore_with(
        &mut self,
        mark: Mark,
        mut visit: impl FnMut(&StackItem),
    ) -> RuntimeResult<usize> {
        let len = self.slots.len();
        if mark.0 > len {
            return Err(RuntimeError::InvalidMark { mark: mark.0, len });
        }
        let mut destroyed = 0;
        while self.slots.len() > mark.0 {
            let Some(slot) = self.slots.pop() else {
                break;
            };
            if self.trace {
                tracing::debug!(
                    index = self.slots.len(),
                    kind = slot.item.label(),
                    "scope stack destroy"
                );
            }
            visit(&slot.item);
            drop(slot);
            destroyed += 1;
        }
        tracing::trace!(mark = mark.0, destroyed, "scope restored");
        Ok(destroyed)
    }

    pub fn try_restore(&mut self, mark: Mark) -> RuntimeResult<usize> {
        self.restore_with(mark, |_| {})
    }

    /// Restore for generated code. A bad mark is an upstream bug and ends the
    /// process.
    pub fn restore(&mut self, mark: Mark) {
        if let Err(err) = self.try_restore(mark) {
            error::abort(err);
        }
    }

    fn slot(&self, index: usize, stamp: u64) -> RuntimeResult<&StackItem> {
        match self.slots.get(index) {
            Some(slot) if slot.stamp == stamp => Ok(&slot.item),
            _ => Err(RuntimeError::DanglingHandle { slot: index }),
        }
    }

    fn slot_mut(&mut self, index: usize, stamp: u64) -> RuntimeResult<&mut StackItem> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.stamp == stamp => Ok(&mut slot.item),
            _ => Err(RuntimeError::DanglingHandle { slot: index }),
        }
    }

    pub fn get(&self, id: VarId) -> RuntimeResult<&Variable> {
        match self.slot(id.index, id.stamp)? {
            StackItem::Variable(variable) => Ok(variable),
            StackItem::Type(_) => Err(RuntimeError::internal("variable handle points at a type")),
        }
    }

    pub fn get_mut(&mut self, id: VarId) -> RuntimeResult<&mut Variable> {
        match self.slot_mut(id.index, id.stamp)? {
            StackItem::Variable(variable) => Ok(variable),
            StackItem::Type(_) => Err(RuntimeError::internal("variable handle points at a type")),
        }
    }

    pub fn get_type(&self, handle: TypeHandle) -> RuntimeResult<&Type> {
        match self.slot(handle.index, handle.stamp)? {
            StackItem::Type(ty) => Ok(ty),
            StackItem::Variable(_) => Err(RuntimeError::internal("type handle points at a variable")),
        }
    }

    /// Replaces the value behind `id`, returning the previous one.
    pub fn replace(&mut self, id: VarId, variable: Variable) -> RuntimeResult<Variable> {
        let slot = self.get_mut(id)?;
        Ok(std::mem::replace(slot, variable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(item: &StackItem) -> i32 {
        match item {
            StackItem::Variable(variable) => variable
                .scalar_value()
                .ok()
                .and_then(|value| value.as_integer())
                .unwrap_or(-1),
            StackItem::Type(_) => -1,
        }
    }

    #[test]
    fn restore_destroys_newest_first() {
        let mut stack = ScopeStack::default();
        stack.push_variable(Variable::integer(1));
        stack.push_variable(Variable::integer(2));
        let mark = stack.save();
        stack.push_variable(Variable::integer(3));
        stack.push_variable(Variable::integer(4));

        let mut destroyed = Vec::new();
        let count = stack
            .restore_with(mark, |item| destroyed.push(name_of(item)))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(destroyed, vec![4, 3]);
        assert_eq!(stack.save(), mark);
    }

    #[test]
    fn capacity_doubles_when_full() {
        let mut stack = ScopeStack::with_capacity(2);
        let before = stack.capacity();
        for value in 0..3 {
            stack.push_variable(Variable::integer(value));
        }
        assert!(stack.capacity() >= before * 2);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn restoring_above_top_is_rejected() {
        let mut stack = ScopeStack::default();
        let outer = stack.save();
        stack.push_variable(Variable::integer(1));
        let inner = stack.save();
        stack.try_restore(outer).unwrap();
        assert!(matches!(
            stack.try_restore(inner),
            Err(RuntimeError::InvalidMark { mark: 1, len: 0 })
        ));
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut stack = ScopeStack::default();
        let mark = stack.save();
        let old = stack.push_variable(Variable::integer(1));
        stack.try_restore(mark).unwrap();
        let new = stack.push_variable(Variable::integer(2));
        assert_eq!(old.slot(), new.slot());
        assert!(matches!(
            stack.get(old),
            Err(RuntimeError::DanglingHandle { slot: 0 })
        ));
        assert_eq!(stack.get(new).unwrap(), &Variable::integer(2));
    }

    #[test]
    fn loop_body_marks_nest_inside_loop_mark() {
        let mut stack = ScopeStack::default();
        let loop_mark = stack.save();
        stack.push_variable(Variable::integer(0));
        for _ in 0..3 {
            let body_mark = stack.save();
            stack.push_variable(Variable::integer(1));
            stack.push_type(Type::Unknown);
            stack.try_restore(body_mark).unwrap();
            assert_eq!(stack.len(), 1);
        }
        stack.try_restore(loop_mark).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn types_are_scoped_like_variables() {
        let mut stack = ScopeStack::default();
        let handle = stack.push_type(Type::StreamOut);
        assert_eq!(stack.get_type(handle).unwrap(), &Type::StreamOut);
        assert!(stack.get(VarId { index: 0, stamp: 0 }).is_err());
    }
}
