use crate::config::RuntimeConfig;
use crate::runtime::convert::{self, Conversion};
use crate::runtime::element::{BinaryOp, Element, ElementKind, UnaryOp};
use crate::runtime::error::{abort, RuntimeError, RuntimeResult};
use crate::runtime::ops;
use crate::runtime::printer;
use crate::runtime::reader::{Reader, StreamState};
use crate::runtime::stack::{Mark, ScopeStack, TypeHandle, VarId};
use crate::runtime::tuple;
use crate::runtime::value::{Type, Variable};
use crate::runtime::view::{self, IndexOperand};
use std::io::{self, Read, Write};

fn fatal<T>(result: RuntimeResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => abort(err),
    }
}

/// Entry surface for generated code. Every failure here is fatal; the
/// `try_` variants hand the error back instead.
pub struct Engine<R, W> {
    stack: ScopeStack,
    reader: Reader<R>,
    output: W,
    config: RuntimeConfig,
}

impl Engine<io::Stdin, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(RuntimeConfig::from_env(), io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> Engine<R, W> {
    pub fn new(config: RuntimeConfig, input: R, output: W) -> Self {
        let mut stack = ScopeStack::with_capacity(config.initial_stack_capacity);
        stack.set_trace(config.trace_scopes);
        tracing::debug!(
            read_buffer = config.read_buffer_capacity,
            stack_capacity = config.initial_stack_capacity,
            "runtime engine started"
        );
        Self {
            stack,
            reader: Reader::new(input, config.read_buffer_capacity),
            output,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stack(&self) -> &ScopeStack {
        &self.stack
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn allocate(&mut self, variable: Variable) -> VarId {
        self.stack.push_variable(variable)
    }

    pub fn allocate_type(&mut self, ty: Type) -> TypeHandle {
        self.stack.push_type(ty)
    }

    pub fn save(&self) -> Mark {
        self.stack.save()
    }

    pub fn restore(&mut self, mark: Mark) {
        self.stack.restore(mark)
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        fatal(self.stack.get(id))
    }

    pub fn declared_type(&self, handle: TypeHandle) -> &Type {
        fatal(self.stack.get_type(handle))
    }

    pub fn try_index(
        &self,
        base: IndexOperand<'_>,
        indices: &[IndexOperand<'_>],
    ) -> RuntimeResult<Variable> {
        view::index(&self.stack, base, indices)
    }

    pub fn index(&self, base: IndexOperand<'_>, indices: &[IndexOperand<'_>]) -> Variable {
        fatal(self.try_index(base, indices))
    }

    /// Owned copy of a value; views come back as the elements they select.
    pub fn deep_copy(&self, value: &Variable) -> Variable {
        fatal(view::materialize(&self.stack, value)).into_owned()
    }

    pub fn element(&self, value: &Variable, pos: usize) -> Element {
        fatal(view::element_at(&self.stack, value, pos))
    }

    pub fn try_assign(&mut self, target: VarId, value: &Variable) -> RuntimeResult<()> {
        let value = view::materialize(&self.stack, value)?.into_owned();
        let current = self.stack.get(target)?;
        if let Some(view) = current.as_view().cloned() {
            let len = current.len()?;
            let source_len = value.len()?;
            if source_len != 1 && source_len != len {
                return Err(RuntimeError::dimension(format!(
                    "cannot store {source_len} elements into a view of {len}"
                )));
            }
            for pos in 0..len {
                let element = value.element(if source_len == 1 { 0 } else { pos })?;
                view::store_element(&mut self.stack, &view, pos, element)?;
            }
            return Ok(());
        }
        let converted = convert::convert(current.ty(), &value, Conversion::Assignment)?;
        self.stack.replace(target, converted)?;
        Ok(())
    }

    pub fn assign(&mut self, target: VarId, value: &Variable) {
        fatal(self.try_assign(target, value))
    }

    pub fn try_unary(&self, op: UnaryOp, value: &Variable) -> RuntimeResult<Variable> {
        let value = view::materialize(&self.stack, value)?;
        ops::unary(op, &value)
    }

    pub fn unary(&self, op: UnaryOp, value: &Variable) -> Variable {
        fatal(self.try_unary(op, value))
    }

    pub fn try_binary(&self, op: BinaryOp, a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
        let a = view::materialize(&self.stack, a)?;
        let b = view::materialize(&self.stack, b)?;
        ops::binary(op, &a, &b)
    }

    pub fn binary(&self, op: BinaryOp, a: &Variable, b: &Variable) -> Variable {
        fatal(self.try_binary(op, a, b))
    }

    pub fn try_convert(
        &self,
        target: &Type,
        value: &Variable,
        mode: Conversion,
    ) -> RuntimeResult<Variable> {
        let value = view::materialize(&self.stack, value)?;
        convert::convert(target, &value, mode)
    }

    pub fn convert(&self, target: &Type, value: &Variable, mode: Conversion) -> Variable {
        fatal(self.try_convert(target, value, mode))
    }

    /// Tuple literal. Every field is deep-copied into the tuple.
    pub fn tuple(&self, fields: Vec<(Option<String>, &Variable)>) -> Variable {
        let copied = fields
            .into_iter()
            .map(|(name, value)| (name, self.deep_copy(value)))
            .collect();
        fatal(tuple::compose(copied))
    }

    pub fn length(&self, value: &Variable) -> Variable {
        fatal(view::materialize(&self.stack, value).and_then(|value| ops::length(&value)))
    }

    pub fn rows(&self, value: &Variable) -> Variable {
        fatal(view::materialize(&self.stack, value).and_then(|value| ops::rows(&value)))
    }

    pub fn columns(&self, value: &Variable) -> Variable {
        fatal(view::materialize(&self.stack, value).and_then(|value| ops::columns(&value)))
    }

    pub fn reverse(&self, value: &Variable) -> Variable {
        fatal(view::materialize(&self.stack, value).and_then(|value| ops::reverse(&value)))
    }

    pub fn try_read(&mut self, stream: &Variable, kind: ElementKind) -> RuntimeResult<Variable> {
        if stream.ty() != &Type::StreamIn {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot read from {}",
                stream.ty()
            )));
        }
        let value = match kind {
            ElementKind::Integer => Variable::integer(self.reader.read_integer()),
            ElementKind::Real => Variable::real(self.reader.read_real()),
            ElementKind::Boolean => Variable::boolean(self.reader.read_boolean()),
            ElementKind::Character => Variable::character(self.reader.read_character()),
            other => {
                return Err(RuntimeError::type_mismatch(format!(
                    "cannot read a {other} value"
                )))
            }
        };
        Ok(value)
    }

    pub fn read(&mut self, stream: &Variable, kind: ElementKind) -> Variable {
        fatal(self.try_read(stream, kind))
    }

    pub fn last_stream_state(&self) -> StreamState {
        self.reader.state()
    }

    pub fn stream_state(&self) -> Variable {
        Variable::integer(self.reader.state().code())
    }

    pub fn try_print(&mut self, stream: &Variable, value: &Variable) -> RuntimeResult<()> {
        let value = view::materialize(&self.stack, value)?;
        printer::print(&mut self.output, stream, &value)
    }

    pub fn print(&mut self, stream: &Variable, value: &Variable) {
        fatal(self.try_print(stream, value))
    }
}
