use crate::runtime::element::{self, BinaryOp, Element, ElementKind, UnaryOp};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::rc::Rc;

/// One extent of a declared or concrete array. `None` is the `*` extent of a
/// declaration whose size is inferred from its initializer.
pub type Extent = Option<usize>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rank {
    Scalar,
    Vector,
    Matrix,
    Unspecified,
}

#[derive(Clone, Debug)]
pub enum Dims {
    Unspecified,
    Fixed(Rc<[Extent]>),
}

impl PartialEq for Dims {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dims::Unspecified, Dims::Unspecified) => true,
            (Dims::Fixed(a), Dims::Fixed(b)) => a[..] == b[..],
            _ => false,
        }
    }
}

/// Element kind plus dimensions. The dims buffer is shared between clones and
/// released with the last holder.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub element: ElementKind,
    pub dims: Dims,
    pub is_string: bool,
}

impl Shape {
    pub fn new(element: ElementKind, extents: &[Extent], is_string: bool) -> Self {
        Self {
            element,
            dims: Dims::Fixed(Rc::from(extents)),
            is_string,
        }
    }

    pub fn scalar(element: ElementKind) -> Self {
        Self::new(element, &[], false)
    }

    pub fn vector(element: ElementKind, len: usize) -> Self {
        Self::new(element, &[Some(len)], false)
    }

    pub fn matrix(element: ElementKind, rows: usize, cols: usize) -> Self {
        Self::new(element, &[Some(rows), Some(cols)], false)
    }

    pub fn string(len: usize) -> Self {
        Self::new(ElementKind::Character, &[Some(len)], true)
    }

    pub fn empty() -> Self {
        Self {
            element: ElementKind::Mixed,
            dims: Dims::Unspecified,
            is_string: false,
        }
    }

    /// Size-checked constructor for declared extents; `-1` is the `*` extent.
    pub fn sized(element: ElementKind, sizes: &[i64], is_string: bool) -> RuntimeResult<Self> {
        if sizes.len() > 2 {
            return Err(RuntimeError::size(format!(
                "arrays have at most two dimensions, found {}",
                sizes.len()
            )));
        }
        let mut extents = Vec::with_capacity(sizes.len());
        for &size in sizes {
            match size {
                -1 => extents.push(None),
                size if size < 0 => {
                    return Err(RuntimeError::size(format!("negative extent {size}")))
                }
                size => extents.push(Some(size as usize)),
            }
        }
        Ok(Self::new(element, &extents, is_string))
    }

    pub fn with_element(&self, element: ElementKind) -> Self {
        Self {
            element,
            dims: self.dims.clone(),
            is_string: self.is_string && element == ElementKind::Character,
        }
    }

    pub fn rank(&self) -> Rank {
        match &self.dims {
            Dims::Unspecified => Rank::Unspecified,
            Dims::Fixed(extents) => match extents.len() {
                0 => Rank::Scalar,
                1 => Rank::Vector,
                _ => Rank::Matrix,
            },
        }
    }

    pub fn extents(&self) -> &[Extent] {
        match &self.dims {
            Dims::Unspecified => &[],
            Dims::Fixed(extents) => extents,
        }
    }

    pub fn extent(&self, axis: usize) -> usize {
        self.extents().get(axis).copied().flatten().unwrap_or(0)
    }

    pub fn has_unknown_size(&self) -> bool {
        self.extents().iter().any(|extent| extent.is_none())
    }

    /// Number of holders of this shape's dims buffer.
    pub fn share_count(&self) -> usize {
        match &self.dims {
            Dims::Unspecified => 0,
            Dims::Fixed(extents) => Rc::strong_count(extents),
        }
    }

    pub fn shares_dims_with(&self, other: &Shape) -> bool {
        match (&self.dims, &other.dims) {
            (Dims::Fixed(a), Dims::Fixed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_empty_array(&self) -> bool {
        self.rank() == Rank::Unspecified
    }
}

pub fn total_length(shape: &Shape) -> usize {
    match shape.rank() {
        Rank::Unspecified => 0,
        Rank::Scalar => 1,
        Rank::Vector => shape.extent(0),
        Rank::Matrix => shape.extent(0) * shape.extent(1),
    }
}

/// How far an assignment may stretch a source array into a target shape.
/// Ordered from strictest to loosest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResizeRestriction {
    SameSize,
    NotLarger,
    AnySize,
}

pub fn minimum_compatible_resize_restriction(src: &Shape, target: &Shape) -> ResizeRestriction {
    let mut restriction = ResizeRestriction::SameSize;
    let rank = target.extents().len().min(src.extents().len());
    let mut axis = 0;
    while axis < rank {
        if target.extent(axis) != src.extent(axis) {
            restriction = ResizeRestriction::NotLarger;
            break;
        }
        axis += 1;
    }
    while axis < rank {
        if target.extent(axis) < src.extent(axis) {
            restriction = ResizeRestriction::AnySize;
            break;
        }
        axis += 1;
    }
    restriction
}

/// Flat element storage of a concrete array, row-major for matrices.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayBuffer {
    Boolean(Vec<bool>),
    Integer(Vec<i32>),
    Real(Vec<f32>),
    Character(Vec<u8>),
}

impl ArrayBuffer {
    pub fn filled(kind: ElementKind, len: usize, value: Element) -> RuntimeResult<Self> {
        let value = element::promote(kind, value)?;
        Ok(match value {
            Element::Boolean(v) => ArrayBuffer::Boolean(vec![v; len]),
            Element::Integer(v) => ArrayBuffer::Integer(vec![v; len]),
            Element::Real(v) => ArrayBuffer::Real(vec![v; len]),
            Element::Character(v) => ArrayBuffer::Character(vec![v; len]),
            _ => {
                return Err(RuntimeError::operand_kind(format!(
                    "{kind} arrays have no element storage"
                )))
            }
        })
    }

    pub fn zeroed(kind: ElementKind, len: usize) -> RuntimeResult<Self> {
        Self::filled(kind, len, Element::Null)
    }

    pub fn from_elements(kind: ElementKind, elements: &[Element]) -> RuntimeResult<Self> {
        let mut buffer = Self::zeroed(kind, elements.len())?;
        for (pos, value) in elements.iter().enumerate() {
            buffer.set(pos, *value)?;
        }
        Ok(buffer)
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ArrayBuffer::Boolean(_) => ElementKind::Boolean,
            ArrayBuffer::Integer(_) => ElementKind::Integer,
            ArrayBuffer::Real(_) => ElementKind::Real,
            ArrayBuffer::Character(_) => ElementKind::Character,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayBuffer::Boolean(v) => v.len(),
            ArrayBuffer::Integer(v) => v.len(),
            ArrayBuffer::Real(v) => v.len(),
            ArrayBuffer::Character(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, pos: usize) -> RuntimeResult<Element> {
        let value = match self {
            ArrayBuffer::Boolean(v) => v.get(pos).map(|x| Element::Boolean(*x)),
            ArrayBuffer::Integer(v) => v.get(pos).map(|x| Element::Integer(*x)),
            ArrayBuffer::Real(v) => v.get(pos).map(|x| Element::Real(*x)),
            ArrayBuffer::Character(v) => v.get(pos).map(|x| Element::Character(*x)),
        };
        value.ok_or_else(|| RuntimeError::out_of_range(pos as i64 + 1, self.len()))
    }

    /// Stores `value` at `pos`, promoting it to the buffer's kind.
    pub fn set(&mut self, pos: usize, value: Element) -> RuntimeResult<()> {
        let len = self.len();
        if pos >= len {
            return Err(RuntimeError::out_of_range(pos as i64 + 1, len));
        }
        let value = element::promote(self.kind(), value)?;
        match (self, value) {
            (ArrayBuffer::Boolean(v), Element::Boolean(x)) => v[pos] = x,
            (ArrayBuffer::Integer(v), Element::Integer(x)) => v[pos] = x,
            (ArrayBuffer::Real(v), Element::Real(x)) => v[pos] = x,
            (ArrayBuffer::Character(v), Element::Character(x)) => v[pos] = x,
            _ => return Err(RuntimeError::internal("promotion produced a foreign element")),
        }
        Ok(())
    }

    pub fn elements(&self) -> Vec<Element> {
        (0..self.len()).filter_map(|pos| self.get(pos).ok()).collect()
    }

    pub fn map_elements(
        &self,
        kind: ElementKind,
        mut f: impl FnMut(Element) -> RuntimeResult<Element>,
    ) -> RuntimeResult<ArrayBuffer> {
        let mut out = ArrayBuffer::zeroed(kind, self.len())?;
        for pos in 0..self.len() {
            out.set(pos, f(self.get(pos)?)?)?;
        }
        Ok(out)
    }

    pub fn promote_to(&self, kind: ElementKind) -> RuntimeResult<ArrayBuffer> {
        if kind == self.kind() {
            return Ok(self.clone());
        }
        self.map_elements(kind, |value| element::promote(kind, value))
    }

    pub fn cast_to(&self, kind: ElementKind) -> RuntimeResult<ArrayBuffer> {
        if kind == self.kind() {
            return Ok(self.clone());
        }
        self.map_elements(kind, |value| element::cast(kind, value))
    }
}

pub fn unary_map(op: UnaryOp, buffer: &ArrayBuffer) -> RuntimeResult<ArrayBuffer> {
    let kind = buffer.kind();
    if !element::can_use_unary(kind, op) {
        return Err(RuntimeError::operand_kind(format!(
            "unary operator {op:?} is not defined for {kind} arrays"
        )));
    }
    buffer.map_elements(kind, |value| element::unary_op(op, value))
}

/// Result kind of a whole-array binary operation and whether it collapses to
/// a scalar.
pub fn array_binary_result(kind: ElementKind, op: BinaryOp) -> Option<(ElementKind, bool)> {
    match (kind, op) {
        (ElementKind::Boolean, BinaryOp::Eq | BinaryOp::Ne) => Some((ElementKind::Boolean, true)),
        (ElementKind::Boolean, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Concat) => {
            Some((ElementKind::Boolean, false))
        }
        (ElementKind::Character, BinaryOp::Concat) => Some((ElementKind::Character, false)),
        (ElementKind::Integer | ElementKind::Real, BinaryOp::Eq | BinaryOp::Ne) => {
            Some((ElementKind::Boolean, true))
        }
        (ElementKind::Integer | ElementKind::Real, BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge) => {
            Some((ElementKind::Boolean, false))
        }
        (ElementKind::Integer | ElementKind::Real, BinaryOp::DotProduct) => Some((kind, true)),
        (
            ElementKind::Integer | ElementKind::Real,
            BinaryOp::Exponent
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Remainder
            | BinaryOp::Plus
            | BinaryOp::Minus
            | BinaryOp::Concat,
        ) => Some((kind, false)),
        _ => None,
    }
}

pub fn concat(a: &ArrayBuffer, b: &ArrayBuffer) -> RuntimeResult<ArrayBuffer> {
    Ok(match (a, b) {
        (ArrayBuffer::Boolean(x), ArrayBuffer::Boolean(y)) => {
            ArrayBuffer::Boolean(x.iter().chain(y).copied().collect())
        }
        (ArrayBuffer::Integer(x), ArrayBuffer::Integer(y)) => {
            ArrayBuffer::Integer(x.iter().chain(y).copied().collect())
        }
        (ArrayBuffer::Real(x), ArrayBuffer::Real(y)) => {
            ArrayBuffer::Real(x.iter().chain(y).copied().collect())
        }
        (ArrayBuffer::Character(x), ArrayBuffer::Character(y)) => {
            ArrayBuffer::Character(x.iter().chain(y).copied().collect())
        }
        _ => {
            return Err(RuntimeError::operand_kind(format!(
                "cannot concatenate {} with {}",
                a.kind(),
                b.kind()
            )))
        }
    })
}

pub fn dot_product(a: &ArrayBuffer, b: &ArrayBuffer) -> RuntimeResult<Element> {
    require_same_length(a, b, BinaryOp::DotProduct)?;
    match (a, b) {
        (ArrayBuffer::Integer(x), ArrayBuffer::Integer(y)) => Ok(Element::Integer(
            x.iter()
                .zip(y)
                .fold(0i32, |sum, (p, q)| sum.wrapping_add(p.wrapping_mul(*q))),
        )),
        (ArrayBuffer::Real(x), ArrayBuffer::Real(y)) => {
            Ok(Element::Real(x.iter().zip(y).map(|(p, q)| p * q).sum()))
        }
        _ => Err(RuntimeError::operand_kind(format!(
            "dot product needs integer or real operands, found {}",
            a.kind()
        ))),
    }
}

/// Whole-array equality over the stored bytes. Both buffers must share a
/// kind; reals compare by bit pattern.
pub fn buffers_equal(a: &ArrayBuffer, b: &ArrayBuffer) -> RuntimeResult<bool> {
    match (a, b) {
        (ArrayBuffer::Real(x), ArrayBuffer::Real(y)) => Ok(x.len() == y.len()
            && x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits())),
        _ if a.kind() == b.kind() => Ok(a == b),
        _ => Err(RuntimeError::operand_kind(format!(
            "cannot compare {} with {}",
            a.kind(),
            b.kind()
        ))),
    }
}

pub fn elementwise(op: BinaryOp, a: &ArrayBuffer, b: &ArrayBuffer) -> RuntimeResult<ArrayBuffer> {
    require_same_length(a, b, op)?;
    let kind = a.kind();
    let Some(result_kind) = element::binary_result_kind(kind, op) else {
        return Err(RuntimeError::operand_kind(format!(
            "operator {} is not defined for {kind} arrays",
            op.symbol()
        )));
    };
    let mut out = ArrayBuffer::zeroed(result_kind, a.len())?;
    for pos in 0..a.len() {
        out.set(pos, element::binary_op(op, a.get(pos)?, b.get(pos)?)?)?;
    }
    Ok(out)
}

fn require_same_length(a: &ArrayBuffer, b: &ArrayBuffer, op: BinaryOp) -> RuntimeResult<()> {
    if a.len() != b.len() {
        return Err(RuntimeError::dimension(format!(
            "operands of {} have lengths {} and {}",
            op.symbol(),
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// `n x m` by `m x k`.
pub fn matrix_multiply(
    a: &ArrayBuffer,
    b: &ArrayBuffer,
    n: usize,
    m: usize,
    k: usize,
) -> RuntimeResult<ArrayBuffer> {
    if a.len() != n * m || b.len() != m * k {
        return Err(RuntimeError::dimension(format!(
            "matrix product of {n}x{m} and {m}x{k} got buffers of {} and {}",
            a.len(),
            b.len()
        )));
    }
    match (a, b) {
        (ArrayBuffer::Integer(x), ArrayBuffer::Integer(y)) => {
            let mut out = vec![0i32; n * k];
            for i in 0..n {
                for j in 0..k {
                    let mut sum = 0i32;
                    for l in 0..m {
                        sum = sum.wrapping_add(x[i * m + l].wrapping_mul(y[l * k + j]));
                    }
                    out[i * k + j] = sum;
                }
            }
            Ok(ArrayBuffer::Integer(out))
        }
        (ArrayBuffer::Real(x), ArrayBuffer::Real(y)) => {
            let mut out = vec![0f32; n * k];
            for i in 0..n {
                for j in 0..k {
                    let mut sum = 0f32;
                    for l in 0..m {
                        sum += x[i * m + l] * y[l * k + j];
                    }
                    out[i * k + j] = sum;
                }
            }
            Ok(ArrayBuffer::Real(out))
        }
        _ => Err(RuntimeError::operand_kind(format!(
            "matrix multiplication needs integer or real operands, found {}",
            a.kind()
        ))),
    }
}

pub fn resize_vector(old: &ArrayBuffer, new_len: usize) -> RuntimeResult<ArrayBuffer> {
    let mut out = ArrayBuffer::zeroed(old.kind(), new_len)?;
    for pos in 0..old.len().min(new_len) {
        out.set(pos, old.get(pos)?)?;
    }
    Ok(out)
}

pub fn resize_matrix(
    old: &ArrayBuffer,
    old_rows: usize,
    old_cols: usize,
    new_rows: usize,
    new_cols: usize,
) -> RuntimeResult<ArrayBuffer> {
    let mut out = ArrayBuffer::zeroed(old.kind(), new_rows * new_cols)?;
    for row in 0..old_rows.min(new_rows) {
        for col in 0..old_cols.min(new_cols) {
            out.set(row * new_cols + col, old.get(row * old_cols + col)?)?;
        }
    }
    Ok(out)
}

/// Common kind of a mixed literal's boxed elements. Null and identity
/// entries take whatever kind the rest of the literal settles on; a literal
/// holding nothing else must be all-null or all-identity.
pub fn all_mixed_elements_share_one_promotable_kind(elements: &[Element]) -> Option<ElementKind> {
    let mut basic = elements
        .iter()
        .map(Element::kind)
        .filter(|kind| !kind.is_null_or_identity());
    match basic.next() {
        Some(first) => basic.try_fold(first, element::promote_between),
        None => {
            let (first, rest) = elements.split_first()?;
            let kind = first.kind();
            rest.iter().all(|value| value.kind() == kind).then_some(kind)
        }
    }
}
