use crate::runtime::array::{ArrayBuffer, Rank, Shape};
use crate::runtime::element::{self, Element, ElementKind};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::stack::{ScopeStack, VarId};
use crate::runtime::value::{Payload, Type, Variable};
use std::borrow::Cow;

/// Resolved zero-based positions along one axis of the grounded array.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    Single(usize),
    Many(Vec<usize>),
}

impl Selector {
    pub fn len(&self) -> usize {
        match self {
            Selector::Single(_) => 1,
            Selector::Many(positions) => positions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn at(&self, pos: usize) -> RuntimeResult<usize> {
        match self {
            Selector::Single(position) if pos == 0 => Ok(*position),
            Selector::Many(positions) if pos < positions.len() => Ok(positions[pos]),
            _ => Err(RuntimeError::out_of_range(pos as i64 + 1, self.len())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewKind {
    /// `v[v]`: position `p` reads `root[root[p] - 1]`.
    SelfIndexed,
    Vector(Selector),
    Matrix(Selector, Selector),
}

/// Index computation over a concrete array on the scope stack. The root is
/// never itself a view.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    root: VarId,
    kind: ViewKind,
}

impl View {
    pub fn root(&self) -> VarId {
        self.root
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }
}

/// Base or index operand of an indexing expression. Only stack-resident
/// operands can be viewed; temporaries are copied out instead.
#[derive(Clone, Copy, Debug)]
pub enum IndexOperand<'a> {
    Anchored(VarId),
    Value(&'a Variable),
}

/// Raw one-based index values before bounds are known.
#[derive(Clone, Debug, PartialEq)]
enum IndexList {
    Single(i64),
    Many(Vec<i64>),
}

impl IndexList {
    fn is_empty_vector(&self) -> bool {
        matches!(self, IndexList::Many(values) if values.is_empty())
    }

    fn select(&self, bound: usize) -> RuntimeResult<Selector> {
        let check = |index: i64| {
            if index < 1 || index as usize > bound {
                Err(RuntimeError::out_of_range(index, bound))
            } else {
                Ok(index as usize - 1)
            }
        };
        match self {
            IndexList::Single(index) => check(*index).map(Selector::Single),
            IndexList::Many(indices) => indices
                .iter()
                .map(|index| check(*index))
                .collect::<RuntimeResult<Vec<_>>>()
                .map(Selector::Many),
        }
    }

    /// Selects through an existing list of root positions.
    fn select_through(&self, outer: &Selector) -> RuntimeResult<Selector> {
        match self.select(outer.len())? {
            Selector::Single(pos) => outer.at(pos).map(Selector::Single),
            Selector::Many(positions) => positions
                .into_iter()
                .map(|pos| outer.at(pos))
                .collect::<RuntimeResult<Vec<_>>>()
                .map(Selector::Many),
        }
    }
}

fn resolve<'a>(stack: &'a ScopeStack, operand: IndexOperand<'a>) -> RuntimeResult<&'a Variable> {
    match operand {
        IndexOperand::Anchored(id) => stack.get(id),
        IndexOperand::Value(value) => Ok(value),
    }
}

fn index_list(value: &Variable) -> RuntimeResult<IndexList> {
    if let Some(interval) = value.as_interval() {
        return Ok(IndexList::Many(
            interval.to_vec().into_iter().map(i64::from).collect(),
        ));
    }
    if value.is_mixed() {
        return index_list(&value.promote_mixed()?);
    }
    let Type::Array(shape) = value.ty() else {
        return Err(RuntimeError::type_mismatch(format!(
            "{} cannot be used as an index",
            value.ty()
        )));
    };
    let as_index = |element: Element| -> RuntimeResult<i64> {
        match element::promote(ElementKind::Integer, element) {
            Ok(Element::Integer(index)) => Ok(i64::from(index)),
            _ => Err(RuntimeError::type_mismatch(format!(
                "indices must be integers, found {}",
                element.kind()
            ))),
        }
    };
    match shape.rank() {
        Rank::Unspecified => Ok(IndexList::Many(Vec::new())),
        Rank::Scalar => as_index(value.element(0)?).map(IndexList::Single),
        Rank::Vector => value
            .elements()?
            .into_iter()
            .map(as_index)
            .collect::<RuntimeResult<Vec<_>>>()
            .map(IndexList::Many),
        Rank::Matrix => Err(RuntimeError::dimension("a matrix cannot be used as an index")),
    }
}

fn shape_of(root: &Shape, kind: &ViewKind, root_len: usize) -> Shape {
    let vector = |len: usize| Shape::new(root.element, &[Some(len)], root.is_string);
    match kind {
        ViewKind::SelfIndexed => vector(root_len),
        ViewKind::Vector(Selector::Single(_)) => Shape::scalar(root.element),
        ViewKind::Vector(many) => vector(many.len()),
        ViewKind::Matrix(Selector::Single(_), Selector::Single(_)) => Shape::scalar(root.element),
        ViewKind::Matrix(Selector::Single(_), cols) => Shape::vector(root.element, cols.len()),
        ViewKind::Matrix(rows, Selector::Single(_)) => Shape::vector(root.element, rows.len()),
        ViewKind::Matrix(rows, cols) => Shape::matrix(root.element, rows.len(), cols.len()),
    }
}

fn flat_position(root: &Variable, kind: &ViewKind, pos: usize) -> RuntimeResult<usize> {
    match kind {
        ViewKind::SelfIndexed => {
            let len = root.len()?;
            let index = match root.element(pos)? {
                Element::Integer(index) => i64::from(index),
                other => {
                    return Err(RuntimeError::type_mismatch(format!(
                        "self-indexed view over {} elements",
                        other.kind()
                    )))
                }
            };
            IndexList::Single(index).select(len).and_then(|selector| selector.at(0))
        }
        ViewKind::Vector(selector) => selector.at(pos),
        ViewKind::Matrix(rows, cols) => {
            let width = cols.len();
            if width == 0 {
                return Err(RuntimeError::out_of_range(pos as i64 + 1, 0));
            }
            let root_cols = root.shape().map(|shape| shape.extent(1)).unwrap_or(0);
            Ok(rows.at(pos / width)? * root_cols + cols.at(pos % width)?)
        }
    }
}

/// Copies the selected elements of a non-view array into a new concrete
/// value.
fn gather(root: &Variable, kind: &ViewKind) -> RuntimeResult<Variable> {
    let Some(root_shape) = root.shape() else {
        return Err(RuntimeError::internal("gather from a non-array root"));
    };
    let shape = shape_of(root_shape, kind, root.len()?);
    let len = crate::runtime::array::total_length(&shape);
    if root.is_sentinel() {
        for pos in 0..len {
            flat_position(root, kind, pos)?;
        }
        return Ok(Variable::sentinel(shape));
    }
    let mut elements = Vec::with_capacity(len);
    for pos in 0..len {
        elements.push(root.element(flat_position(root, kind, pos)?)?);
    }
    let buffer = ArrayBuffer::from_elements(shape.element, &elements)?;
    Variable::from_buffer(shape, buffer)
}

/// Validates the index lists against a non-view root and builds the view
/// kind they describe.
fn build_kind(root: &Variable, lists: &[IndexList]) -> RuntimeResult<ViewKind> {
    let Some(shape) = root.shape() else {
        return Err(RuntimeError::type_mismatch(format!(
            "{} cannot be indexed",
            root.ty()
        )));
    };
    match (shape.rank(), lists) {
        (Rank::Vector, [index]) => Ok(ViewKind::Vector(index.select(shape.extent(0))?)),
        (Rank::Matrix, [rows, cols]) => Ok(ViewKind::Matrix(
            rows.select(shape.extent(0))?,
            cols.select(shape.extent(1))?,
        )),
        (Rank::Scalar, _) => Err(RuntimeError::dimension("a scalar cannot be indexed")),
        (rank, lists) => Err(RuntimeError::dimension(format!(
            "{rank:?} indexed with {} indices",
            lists.len()
        ))),
    }
}

/// Folds a further index into an existing view so the result still points
/// straight at the grounded root.
fn compose(root: &Variable, base: &ViewKind, lists: &[IndexList]) -> RuntimeResult<ViewKind> {
    match (base, lists) {
        (ViewKind::SelfIndexed, [index]) => {
            let len = root.len()?;
            let through = (0..len)
                .map(|pos| flat_position(root, base, pos))
                .collect::<RuntimeResult<Vec<_>>>()?;
            Ok(ViewKind::Vector(index.select_through(&Selector::Many(through))?))
        }
        (ViewKind::Vector(rows @ Selector::Many(_)), [index]) => {
            Ok(ViewKind::Vector(index.select_through(rows)?))
        }
        (ViewKind::Matrix(row @ Selector::Single(_), cols @ Selector::Many(_)), [index]) => Ok(
            ViewKind::Matrix(row.clone(), index.select_through(cols)?),
        ),
        (ViewKind::Matrix(rows @ Selector::Many(_), col @ Selector::Single(_)), [index]) => Ok(
            ViewKind::Matrix(index.select_through(rows)?, col.clone()),
        ),
        (ViewKind::Matrix(rows @ Selector::Many(_), cols @ Selector::Many(_)), [i, j]) => Ok(
            ViewKind::Matrix(i.select_through(rows)?, j.select_through(cols)?),
        ),
        (_, lists) => Err(RuntimeError::dimension(format!(
            "view cannot take {} indices",
            lists.len()
        ))),
    }
}

/// Indexes `base` by one or two indices. Stack-resident concrete arrays
/// produce views; everything else produces a fresh concrete value.
pub fn index(
    stack: &ScopeStack,
    base: IndexOperand<'_>,
    indices: &[IndexOperand<'_>],
) -> RuntimeResult<Variable> {
    let base_value = resolve(stack, base)?;
    let mut lists = Vec::with_capacity(indices.len());
    for operand in indices {
        let value = materialize(stack, resolve(stack, *operand)?)?;
        lists.push(index_list(&value)?);
    }

    if base_value.is_empty_array() {
        return match lists.as_slice() {
            [index] if index.is_empty_vector() => Ok(Variable::empty_array()),
            _ => Err(RuntimeError::dimension(
                "an empty array can only be indexed by an empty index",
            )),
        };
    }

    if let (IndexOperand::Anchored(root), [IndexOperand::Anchored(by)]) = (base, indices) {
        if root == *by && is_integer_vector(base_value) {
            let len = base_value.len()?;
            for pos in 0..len {
                flat_position(base_value, &ViewKind::SelfIndexed, pos)?;
            }
            tracing::debug!(root = root.slot(), "self-indexed view");
            let shape = shape_of(shape_or_internal(base_value)?, &ViewKind::SelfIndexed, len);
            return Ok(Variable::from_view(
                shape,
                View {
                    root,
                    kind: ViewKind::SelfIndexed,
                },
            ));
        }
    }

    if let Some(view) = base_value.as_view() {
        let root = stack.get(view.root)?;
        let kind = compose(root, &view.kind, &lists)?;
        tracing::debug!(root = view.root.slot(), kind = ?kind, "view composed");
        let shape = shape_of(shape_or_internal(root)?, &kind, root.len()?);
        return Ok(Variable::from_view(
            shape,
            View {
                root: view.root,
                kind,
            },
        ));
    }

    match (base, base_value.payload()) {
        (IndexOperand::Anchored(root), Payload::Elements(_)) => {
            let kind = build_kind(base_value, &lists)?;
            tracing::debug!(root = root.slot(), kind = ?kind, "view created");
            let shape = shape_of(shape_or_internal(base_value)?, &kind, base_value.len()?);
            Ok(Variable::from_view(shape, View { root, kind }))
        }
        _ => {
            let grounded = ground(base_value)?;
            let kind = build_kind(&grounded, &lists)?;
            gather(&grounded, &kind)
        }
    }
}

fn is_integer_vector(value: &Variable) -> bool {
    matches!(value.payload(), Payload::Elements(ArrayBuffer::Integer(_)))
        && value.rank() == Some(Rank::Vector)
}

fn shape_or_internal(value: &Variable) -> RuntimeResult<&Shape> {
    value
        .shape()
        .ok_or_else(|| RuntimeError::internal("array value without a shape"))
}

/// Turns intervals and mixed literals into plain arrays so they can be
/// indexed like any other.
fn ground(value: &Variable) -> RuntimeResult<Cow<'_, Variable>> {
    if let Some(interval) = value.as_interval() {
        return Ok(Cow::Owned(Variable::interval_to_vector(&interval)));
    }
    if value.is_mixed() {
        return Ok(Cow::Owned(value.promote_mixed()?));
    }
    Ok(Cow::Borrowed(value))
}

/// The value with any view resolved to the elements it selects.
pub fn materialize<'a>(stack: &ScopeStack, value: &'a Variable) -> RuntimeResult<Cow<'a, Variable>> {
    match value.as_view() {
        Some(view) => Ok(Cow::Owned(gather(stack.get(view.root)?, &view.kind)?)),
        None => Ok(Cow::Borrowed(value)),
    }
}

/// Element `pos` of a value, following a view to its root.
pub fn element_at(stack: &ScopeStack, value: &Variable, pos: usize) -> RuntimeResult<Element> {
    match value.as_view() {
        Some(view) => {
            let len = value.len()?;
            if pos >= len {
                return Err(RuntimeError::out_of_range(pos as i64 + 1, len));
            }
            let root = stack.get(view.root)?;
            root.element(flat_position(root, &view.kind, pos)?)
        }
        None => value.element(pos),
    }
}

/// Writes element `pos` of a view into its grounded array.
pub fn store_element(
    stack: &mut ScopeStack,
    view: &View,
    pos: usize,
    value: Element,
) -> RuntimeResult<()> {
    let flat = {
        let root = stack.get(view.root)?;
        let shape = shape_of(shape_or_internal(root)?, &view.kind, root.len()?);
        let len = crate::runtime::array::total_length(&shape);
        if pos >= len {
            return Err(RuntimeError::out_of_range(pos as i64 + 1, len));
        }
        flat_position(root, &view.kind, pos)?
    };
    stack.get_mut(view.root)?.set_element(flat, value)
}
