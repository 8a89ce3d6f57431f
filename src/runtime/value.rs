use crate::runtime::array::{self, ArrayBuffer, Rank, Shape};
use crate::runtime::element::{Element, ElementKind};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::interval::Interval;
use crate::runtime::tuple::TupleType;
use crate::runtime::view::View;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalKind {
    Integer,
    Unspecified,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Array(Shape),
    Interval(IntervalKind),
    Tuple(Rc<TupleType>),
    StreamIn,
    StreamOut,
    Unknown,
}

impl Type {
    pub fn shape(&self) -> Option<&Shape> {
        match self {
            Type::Array(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Type::StreamIn | Type::StreamOut)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Type::Array(shape) => match shape.rank() {
                Rank::Scalar => "scalar",
                Rank::Vector if shape.is_string => "string",
                Rank::Vector => "vector",
                Rank::Matrix => "matrix",
                Rank::Unspecified => "empty array",
            },
            Type::Interval(_) => "interval",
            Type::Tuple(_) => "tuple",
            Type::StreamIn => "std_input",
            Type::StreamOut => "std_output",
            Type::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Array(shape) => {
                if shape.is_empty_array() {
                    return write!(f, "[]");
                }
                if shape.is_string {
                    write!(f, "string")?;
                } else {
                    write!(f, "{}", shape.element)?;
                }
                let extents = shape.extents();
                if extents.is_empty() {
                    return Ok(());
                }
                let rendered: Vec<String> = extents
                    .iter()
                    .map(|extent| match extent {
                        Some(size) => size.to_string(),
                        None => "*".to_string(),
                    })
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Type::Interval(IntervalKind::Integer) => write!(f, "integer interval"),
            Type::Interval(IntervalKind::Unspecified) => write!(f, "interval"),
            Type::Tuple(tuple) => {
                write!(f, "tuple(")?;
                for (pos, field) in tuple.field_types().iter().enumerate() {
                    if pos > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                    if let Some(name) = tuple.field_name(pos) {
                        write!(f, " {name}")?;
                    }
                }
                write!(f, ")")
            }
            other => f.write_str(other.type_name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Streams, the empty array, and null or identity arrays.
    None,
    Elements(ArrayBuffer),
    /// Boxed elements of a heterogeneous literal awaiting promotion.
    Mixed(Vec<Element>),
    View(View),
    Interval(Interval),
    Tuple(Vec<Variable>),
}

/// A runtime value: its type plus the payload that type implies.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    ty: Type,
    payload: Payload,
}

impl From<Vec<bool>> for ArrayBuffer {
    fn from(values: Vec<bool>) -> Self {
        ArrayBuffer::Boolean(values)
    }
}

impl From<Vec<i32>> for ArrayBuffer {
    fn from(values: Vec<i32>) -> Self {
        ArrayBuffer::Integer(values)
    }
}

impl From<Vec<f32>> for ArrayBuffer {
    fn from(values: Vec<f32>) -> Self {
        ArrayBuffer::Real(values)
    }
}

impl From<Vec<u8>> for ArrayBuffer {
    fn from(values: Vec<u8>) -> Self {
        ArrayBuffer::Character(values)
    }
}

impl Variable {
    fn concrete(shape: Shape, buffer: ArrayBuffer) -> Self {
        Self {
            ty: Type::Array(shape),
            payload: Payload::Elements(buffer),
        }
    }

    pub fn scalar(value: Element) -> Self {
        match value {
            Element::Boolean(v) => Self::boolean(v),
            Element::Integer(v) => Self::integer(v),
            Element::Real(v) => Self::real(v),
            Element::Character(v) => Self::character(v),
            Element::Null => Self::null(),
            Element::Identity => Self::identity(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::concrete(
            Shape::scalar(ElementKind::Boolean),
            ArrayBuffer::Boolean(vec![value]),
        )
    }

    pub fn integer(value: i32) -> Self {
        Self::concrete(
            Shape::scalar(ElementKind::Integer),
            ArrayBuffer::Integer(vec![value]),
        )
    }

    pub fn real(value: f32) -> Self {
        Self::concrete(Shape::scalar(ElementKind::Real), ArrayBuffer::Real(vec![value]))
    }

    pub fn character(value: u8) -> Self {
        Self::concrete(
            Shape::scalar(ElementKind::Character),
            ArrayBuffer::Character(vec![value]),
        )
    }

    pub fn null() -> Self {
        Self::sentinel(Shape::scalar(ElementKind::Null))
    }

    pub fn identity() -> Self {
        Self::sentinel(Shape::scalar(ElementKind::Identity))
    }

    /// Null or identity array of the given shape. Holds no element storage.
    pub fn sentinel(shape: Shape) -> Self {
        Self {
            ty: Type::Array(shape),
            payload: Payload::None,
        }
    }

    pub fn empty_array() -> Self {
        Self {
            ty: Type::Array(Shape::empty()),
            payload: Payload::None,
        }
    }

    pub fn vector(values: impl Into<ArrayBuffer>) -> Self {
        let buffer = values.into();
        let shape = Shape::vector(buffer.kind(), buffer.len());
        Self::concrete(shape, buffer)
    }

    pub fn matrix(values: impl Into<ArrayBuffer>, rows: usize, cols: usize) -> RuntimeResult<Self> {
        let buffer = values.into();
        Self::from_buffer(Shape::matrix(buffer.kind(), rows, cols), buffer)
    }

    pub fn string(text: impl AsRef<[u8]>) -> Self {
        let bytes = text.as_ref().to_vec();
        Self::concrete(Shape::string(bytes.len()), ArrayBuffer::Character(bytes))
    }

    pub fn from_buffer(shape: Shape, buffer: ArrayBuffer) -> RuntimeResult<Self> {
        if shape.element != buffer.kind() {
            return Err(RuntimeError::type_mismatch(format!(
                "{} buffer stored under a {} shape",
                buffer.kind(),
                shape.element
            )));
        }
        if shape.has_unknown_size() {
            return Err(RuntimeError::size("concrete arrays need known extents"));
        }
        let expected = array::total_length(&shape);
        if expected != buffer.len() {
            return Err(RuntimeError::size(format!(
                "shape holds {expected} elements but buffer has {}",
                buffer.len()
            )));
        }
        Ok(Self::concrete(shape, buffer))
    }

    pub fn interval(head: i32, tail: i32) -> RuntimeResult<Self> {
        Ok(Self::from_interval(Interval::new(head, tail)?))
    }

    pub fn from_interval(interval: Interval) -> Self {
        Self {
            ty: Type::Interval(IntervalKind::Integer),
            payload: Payload::Interval(interval),
        }
    }

    pub fn stream_in() -> Self {
        Self {
            ty: Type::StreamIn,
            payload: Payload::None,
        }
    }

    pub fn stream_out() -> Self {
        Self {
            ty: Type::StreamOut,
            payload: Payload::None,
        }
    }

    /// Vector literal. Elements of one basic kind produce a concrete vector;
    /// anything else is kept boxed as a mixed vector.
    pub fn literal(elements: Vec<Element>) -> RuntimeResult<Self> {
        if elements.is_empty() {
            return Ok(Self::empty_array());
        }
        let len = elements.len();
        Self::from_elements(&[Some(len)], elements)
    }

    /// Matrix literal from its rows. Short rows are padded with null up to
    /// the longest row.
    pub fn matrix_literal(rows: Vec<Vec<Element>>) -> RuntimeResult<Self> {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Ok(Self::empty_array());
        }
        let row_count = rows.len();
        let mut flat = Vec::with_capacity(row_count * cols);
        for mut row in rows {
            row.resize(cols, Element::Null);
            flat.extend(row);
        }
        Self::from_elements(&[Some(row_count), Some(cols)], flat)
    }

    fn from_elements(extents: &[Option<usize>], elements: Vec<Element>) -> RuntimeResult<Self> {
        let first = elements[0].kind();
        if first.is_basic() && elements.iter().all(|value| value.kind() == first) {
            let buffer = ArrayBuffer::from_elements(first, &elements)?;
            return Ok(Self::concrete(Shape::new(first, extents, false), buffer));
        }
        Ok(Self {
            ty: Type::Array(Shape::new(ElementKind::Mixed, extents, false)),
            payload: Payload::Mixed(elements),
        })
    }

    pub(crate) fn from_tuple_parts(ty: Rc<TupleType>, fields: Vec<Variable>) -> Self {
        Self {
            ty: Type::Tuple(ty),
            payload: Payload::Tuple(fields),
        }
    }

    pub(crate) fn from_view(shape: Shape, view: View) -> Self {
        Self {
            ty: Type::Array(shape),
            payload: Payload::View(view),
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub(crate) fn ty_mut(&mut self) -> &mut Type {
        &mut self.ty
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.ty.shape()
    }

    pub fn element_kind(&self) -> Option<ElementKind> {
        self.shape().map(|shape| shape.element)
    }

    pub fn rank(&self) -> Option<Rank> {
        self.shape().map(Shape::rank)
    }

    pub fn is_view(&self) -> bool {
        matches!(self.payload, Payload::View(_))
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self.payload, Payload::Mixed(_))
    }

    pub fn is_sentinel(&self) -> bool {
        self.element_kind()
            .map(ElementKind::is_null_or_identity)
            .unwrap_or(false)
    }

    pub fn is_empty_array(&self) -> bool {
        self.shape().map(Shape::is_empty_array).unwrap_or(false)
    }

    pub fn as_view(&self) -> Option<&View> {
        match &self.payload {
            Payload::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_interval(&self) -> Option<Interval> {
        match &self.payload {
            Payload::Interval(interval) => Some(*interval),
            _ => None,
        }
    }

    pub fn buffer(&self) -> Option<&ArrayBuffer> {
        match &self.payload {
            Payload::Elements(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn tuple_fields(&self) -> Option<&[Variable]> {
        match &self.payload {
            Payload::Tuple(fields) => Some(fields),
            _ => None,
        }
    }

    pub(crate) fn tuple_fields_mut(&mut self) -> Option<&mut Vec<Variable>> {
        match &mut self.payload {
            Payload::Tuple(fields) => Some(fields),
            _ => None,
        }
    }

    /// Number of elements held by a concrete array or interval.
    pub fn len(&self) -> RuntimeResult<usize> {
        match (&self.ty, &self.payload) {
            (_, Payload::Interval(interval)) => Ok(interval.len()),
            (Type::Array(shape), _) => Ok(array::total_length(shape)),
            (other, _) => Err(RuntimeError::type_mismatch(format!(
                "{} has no length",
                other.type_name()
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len().map(|len| len == 0).unwrap_or(true)
    }

    /// Element at a zero-based flat position. Views resolve through their
    /// root and are rejected here.
    pub fn element(&self, pos: usize) -> RuntimeResult<Element> {
        let len = self.len()?;
        if pos >= len {
            return Err(RuntimeError::out_of_range(pos as i64 + 1, len));
        }
        match &self.payload {
            Payload::Elements(buffer) => buffer.get(pos),
            Payload::Mixed(elements) => Ok(elements[pos]),
            Payload::Interval(interval) => interval.element_at(pos).map(Element::Integer),
            Payload::None => match self.element_kind() {
                Some(ElementKind::Null) => Ok(Element::Null),
                Some(ElementKind::Identity) => Ok(Element::Identity),
                _ => Err(RuntimeError::internal("element storage missing")),
            },
            Payload::View(_) => Err(RuntimeError::internal(
                "view elements must be read through the scope stack",
            )),
            Payload::Tuple(_) => Err(RuntimeError::type_mismatch("tuples have no elements")),
        }
    }

    pub fn elements(&self) -> RuntimeResult<Vec<Element>> {
        (0..self.len()?).map(|pos| self.element(pos)).collect()
    }

    pub fn scalar_value(&self) -> RuntimeResult<Element> {
        if self.rank() != Some(Rank::Scalar) {
            return Err(RuntimeError::type_mismatch(format!(
                "expected a scalar, found {}",
                self.ty
            )));
        }
        self.element(0)
    }

    /// Overwrites one element of a concrete array, promoting the value to the
    /// array's element kind.
    pub fn set_element(&mut self, pos: usize, value: Element) -> RuntimeResult<()> {
        match &mut self.payload {
            Payload::Elements(buffer) => buffer.set(pos, value),
            _ => Err(RuntimeError::type_mismatch(format!(
                "cannot store into {}",
                self.ty
            ))),
        }
    }

    /// Resolves a mixed literal to its single common kind. Values that are
    /// not mixed come back unchanged.
    pub fn promote_mixed(&self) -> RuntimeResult<Variable> {
        let Payload::Mixed(elements) = &self.payload else {
            return Ok(self.clone());
        };
        let Some(shape) = self.shape() else {
            return Err(RuntimeError::internal("mixed payload without a shape"));
        };
        let kind = array::all_mixed_elements_share_one_promotable_kind(elements).ok_or_else(
            || RuntimeError::type_mismatch("literal elements share no common type"),
        )?;
        let shape = shape.with_element(kind);
        if kind.is_null_or_identity() {
            return Ok(Self::sentinel(shape));
        }
        let buffer = ArrayBuffer::from_elements(kind, elements)?;
        Ok(Self::concrete(shape, buffer))
    }

    /// Concrete array of `kind` standing in for a null or identity array.
    pub fn fill_sentinel(&self, kind: ElementKind) -> RuntimeResult<Variable> {
        let (Some(shape), Payload::None) = (self.shape(), &self.payload) else {
            return Err(RuntimeError::internal("fill_sentinel on a non-sentinel value"));
        };
        let value = match shape.element {
            ElementKind::Null => Element::Null,
            ElementKind::Identity => Element::Identity,
            other => {
                return Err(RuntimeError::internal(format!(
                    "fill_sentinel on a {other} array"
                )))
            }
        };
        let shape = shape.with_element(kind);
        let buffer = ArrayBuffer::filled(kind, array::total_length(&shape), value)?;
        Ok(Self::concrete(shape, buffer))
    }

    /// Integer vector holding an interval's members.
    pub fn interval_to_vector(interval: &Interval) -> Variable {
        Self::vector(interval.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_constructors() {
        assert_eq!(Variable::integer(4).scalar_value().unwrap(), Element::Integer(4));
        assert_eq!(Variable::character(b'q').len().unwrap(), 1);
        assert!(Variable::null().is_sentinel());
        assert_eq!(Variable::null().element(0).unwrap(), Element::Null);
        assert!(Variable::stream_out().len().is_err());
    }

    #[test]
    fn homogeneous_literal_is_concrete() {
        let v = Variable::literal(vec![Element::Real(1.0), Element::Real(2.0)]).unwrap();
        assert!(!v.is_mixed());
        assert_eq!(v.ty().to_string(), "real[2]");
        assert!(Variable::literal(Vec::new()).unwrap().is_empty_array());
    }

    #[test]
    fn mixed_literal_promotes_to_common_kind() {
        let v = Variable::literal(vec![
            Element::Integer(1),
            Element::Real(2.5),
            Element::Identity,
        ])
        .unwrap();
        assert!(v.is_mixed());
        let promoted = v.promote_mixed().unwrap();
        assert_eq!(promoted, Variable::vector(vec![1.0f32, 2.5, 1.0]));

        let bad = Variable::literal(vec![Element::Boolean(true), Element::Real(1.0)]).unwrap();
        assert!(matches!(
            bad.promote_mixed(),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn ragged_matrix_rows_pad_with_null() {
        let m = Variable::matrix_literal(vec![
            vec![Element::Integer(1), Element::Integer(2), Element::Integer(3)],
            vec![Element::Integer(4)],
        ])
        .unwrap();
        assert!(m.is_mixed());
        let promoted = m.promote_mixed().unwrap();
        assert_eq!(
            promoted,
            Variable::matrix(vec![1, 2, 3, 4, 0, 0], 2, 3).unwrap()
        );

        let led_by_identity = Variable::matrix_literal(vec![
            vec![Element::Identity],
            vec![Element::Integer(1), Element::Integer(2)],
        ])
        .unwrap();
        assert_eq!(
            led_by_identity.promote_mixed().unwrap(),
            Variable::matrix(vec![1, 0, 1, 2], 2, 2).unwrap()
        );
    }

    #[test]
    fn sentinel_fills_with_zero_or_one() {
        let ones = Variable::sentinel(Shape::vector(ElementKind::Identity, 3));
        assert_eq!(
            ones.fill_sentinel(ElementKind::Integer).unwrap(),
            Variable::vector(vec![1, 1, 1])
        );
    }

    #[test]
    fn deep_copy_does_not_alias() {
        let original = Variable::vector(vec![1, 2, 3]);
        let mut copy = original.clone();
        copy.set_element(1, Element::Integer(20)).unwrap();
        assert_eq!(original.element(1).unwrap(), Element::Integer(2));
        assert_eq!(copy.element(1).unwrap(), Element::Integer(20));
    }

    #[test]
    fn from_buffer_checks_length() {
        assert!(matches!(
            Variable::matrix(vec![1, 2, 3], 2, 2),
            Err(RuntimeError::InvalidSize { .. })
        ));
    }
}
