use crate::runtime::array::{self, ArrayBuffer, Rank, Shape};
use crate::runtime::element::{self, BinaryOp, Element, ElementKind, UnaryOp};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::interval::Interval;
use crate::runtime::value::{Type, Variable};
use std::borrow::Cow;

/// Checks that a value may be an operand and resolves mixed literals.
fn operand<'a>(value: &'a Variable, what: &str) -> RuntimeResult<Cow<'a, Variable>> {
    if value.is_view() {
        return Err(RuntimeError::internal(format!(
            "views must be resolved before {what}"
        )));
    }
    match value.ty() {
        Type::StreamIn | Type::StreamOut | Type::Unknown => Err(RuntimeError::type_mismatch(
            format!("{} cannot be an operand of {what}", value.ty()),
        )),
        _ if value.is_mixed() => Ok(Cow::Owned(value.promote_mixed()?)),
        _ => Ok(Cow::Borrowed(value)),
    }
}

fn array_shape(value: &Variable) -> RuntimeResult<&Shape> {
    value.shape().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("expected an array, found {}", value.ty()))
    })
}

fn buffer_of(value: &Variable) -> RuntimeResult<&ArrayBuffer> {
    value.buffer().ok_or_else(|| {
        RuntimeError::operand_kind(format!("{} has no element storage", value.ty()))
    })
}

pub fn unary(op: UnaryOp, value: &Variable) -> RuntimeResult<Variable> {
    let value = operand(value, "a unary operator")?;
    if let Some(interval) = value.as_interval() {
        return Ok(Variable::from_interval(interval.unary(op)?));
    }
    if let Type::Tuple(_) = value.ty() {
        return Err(RuntimeError::type_mismatch("tuples have no unary operators"));
    }
    let shape = array_shape(&value)?;
    if value.is_sentinel() || shape.is_empty_array() {
        return Err(RuntimeError::operand_kind(format!(
            "unary operator {op:?} applied to {}",
            value.ty()
        )));
    }
    let buffer = array::unary_map(op, buffer_of(&value)?)?;
    Variable::from_buffer(shape.clone(), buffer)
}

pub fn binary(op: BinaryOp, a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let what = format!("`{}`", op.symbol());
    let a = operand(a, &what)?;
    let b = operand(b, &what)?;
    if matches!(a.ty(), Type::Tuple(_)) || matches!(b.ty(), Type::Tuple(_)) {
        return tuple_binary(op, &a, &b);
    }
    match op {
        BinaryOp::Range => return range(&a, &b),
        BinaryOp::By => return by(&a, &b),
        _ => {}
    }
    if a.as_interval().is_some() || b.as_interval().is_some() {
        return interval_binary(op, &a, &b);
    }
    array_binary(op, &a, &b)
}

fn tuple_binary(op: BinaryOp, a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let (Some(left), Some(right)) = (a.tuple_fields(), b.tuple_fields()) else {
        return Err(RuntimeError::type_mismatch(format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            a.ty(),
            b.ty()
        )));
    };
    if !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        return Err(RuntimeError::operand_kind(format!(
            "tuples only support == and !=, found `{}`",
            op.symbol()
        )));
    }
    if left.len() != right.len() {
        return Err(RuntimeError::type_mismatch(format!(
            "tuples of arity {} and {} cannot be compared",
            left.len(),
            right.len()
        )));
    }
    let mut equal = true;
    for (x, y) in left.iter().zip(right) {
        let field = binary(BinaryOp::Eq, x, y)?;
        equal &= field.scalar_value()?.as_bool().unwrap_or(false);
    }
    Ok(Variable::boolean(if op == BinaryOp::Eq { equal } else { !equal }))
}

/// Integer value of a scalar operand, with null and identity promoted.
fn scalar_integer(value: &Variable, role: &str) -> RuntimeResult<i32> {
    let invalid = || {
        RuntimeError::type_mismatch(format!(
            "{role} must be an integer scalar, found {}",
            value.ty()
        ))
    };
    if value.rank() != Some(Rank::Scalar) {
        return Err(invalid());
    }
    match element::promote(ElementKind::Integer, value.element(0)?) {
        Ok(Element::Integer(v)) => Ok(v),
        _ => Err(invalid()),
    }
}

fn range(a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let head = scalar_integer(a, "range head")?;
    let tail = scalar_integer(b, "range tail")?;
    Variable::interval(head, tail)
}

fn by(a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let step = scalar_integer(b, "`by` step")?;
    if let Some(interval) = a.as_interval() {
        return Ok(Variable::vector(interval.by(step)?));
    }
    let shape = array_shape(a)?;
    if shape.rank() != Rank::Vector {
        return Err(RuntimeError::type_mismatch(format!(
            "`by` applies to intervals and vectors, found {}",
            a.ty()
        )));
    }
    if step <= 0 {
        return Err(RuntimeError::size(format!(
            "`by` step must be positive, found {step}"
        )));
    }
    let picked: Vec<Element> = (0..shape.extent(0))
        .step_by(step as usize)
        .map(|pos| a.element(pos))
        .collect::<RuntimeResult<_>>()?;
    let result_shape = Shape::new(shape.element, &[Some(picked.len())], shape.is_string);
    if a.is_sentinel() {
        return Ok(Variable::sentinel(result_shape));
    }
    let buffer = ArrayBuffer::from_elements(shape.element, &picked)?;
    Variable::from_buffer(result_shape, buffer)
}

fn interval_operand(value: &Variable) -> RuntimeResult<Option<Interval>> {
    if let Some(interval) = value.as_interval() {
        return Ok(Some(interval));
    }
    let integer_like = matches!(
        value.element_kind(),
        Some(ElementKind::Integer | ElementKind::Null | ElementKind::Identity)
    );
    if value.rank() == Some(Rank::Scalar) && integer_like {
        let k = scalar_integer(value, "interval operand")?;
        return Interval::new(k, k).map(Some);
    }
    Ok(None)
}

fn interval_binary(op: BinaryOp, a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    if let (Some(x), Some(y)) = (interval_operand(a)?, interval_operand(b)?) {
        match op {
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply => {
                return Ok(Variable::from_interval(x.arithmetic(op, &y)?));
            }
            BinaryOp::Eq => return Ok(Variable::boolean(x == y)),
            BinaryOp::Ne => return Ok(Variable::boolean(x != y)),
            _ => {}
        }
    }
    let widen = |value: &Variable| match value.as_interval() {
        Some(interval) => Variable::interval_to_vector(&interval),
        None => value.clone(),
    };
    array_binary(op, &widen(a), &widen(b))
}

/// Gives null and identity operands the element kind of the other side.
fn resolve_sentinels<'a>(
    a: &'a Variable,
    b: &'a Variable,
) -> RuntimeResult<(Cow<'a, Variable>, Cow<'a, Variable>)> {
    match (a.is_sentinel(), b.is_sentinel()) {
        (true, true) => Err(RuntimeError::operand_kind(
            "null and identity operands need a typed partner",
        )),
        (true, false) => Ok((Cow::Owned(a.fill_sentinel(kind_of(b)?)?), Cow::Borrowed(b))),
        (false, true) => Ok((Cow::Borrowed(a), Cow::Owned(b.fill_sentinel(kind_of(a)?)?))),
        (false, false) => Ok((Cow::Borrowed(a), Cow::Borrowed(b))),
    }
}

fn kind_of(value: &Variable) -> RuntimeResult<ElementKind> {
    let shape = array_shape(value)?;
    if shape.is_empty_array() || !shape.element.is_basic() {
        return Err(RuntimeError::operand_kind(format!(
            "{} has no element type to lend",
            value.ty()
        )));
    }
    Ok(shape.element)
}

fn promote_to(value: &Variable, kind: ElementKind) -> RuntimeResult<Variable> {
    let shape = array_shape(value)?;
    if shape.element == kind {
        return Ok(value.clone());
    }
    let buffer = buffer_of(value)?.promote_to(kind)?;
    Variable::from_buffer(shape.with_element(kind), buffer)
}

/// Copies a scalar into every position of `shape`.
fn broadcast(scalar: &Variable, shape: &Shape) -> RuntimeResult<Variable> {
    let value = scalar.element(0)?;
    let buffer = ArrayBuffer::filled(value.kind(), array::total_length(shape), value)?;
    Variable::from_buffer(shape.with_element(value.kind()), buffer)
}

fn array_binary(op: BinaryOp, a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    array_shape(a)?;
    array_shape(b)?;
    let (a, b) = resolve_sentinels(a, b)?;
    let (a, b) = (a.as_ref(), b.as_ref());

    if a.is_empty_array() || b.is_empty_array() {
        if op == BinaryOp::Concat {
            return concat_with_empty(a, b);
        }
        return Err(RuntimeError::operand_kind(format!(
            "`{}` applied to an empty array",
            op.symbol()
        )));
    }

    let (ka, kb) = (kind_of(a)?, kind_of(b)?);
    let kind = element::promote_between(ka, kb).ok_or_else(|| {
        RuntimeError::type_mismatch(format!(
            "`{}` between {ka} and {kb}",
            op.symbol()
        ))
    })?;
    let a = promote_to(a, kind)?;
    let b = promote_to(b, kind)?;

    let Some((result_kind, collapses)) = array::array_binary_result(kind, op) else {
        return Err(RuntimeError::operand_kind(format!(
            "operator `{}` is not defined for {kind}",
            op.symbol()
        )));
    };

    match op {
        BinaryOp::Concat => return concat(&a, &b),
        BinaryOp::DotProduct => return dot_or_matmul(&a, &b),
        _ => {}
    }

    let (sa, sb) = (array_shape(&a)?, array_shape(&b)?);
    let (a, b) = match (sa.rank(), sb.rank()) {
        (Rank::Scalar, Rank::Scalar) => (a.clone(), b.clone()),
        (Rank::Scalar, _) => (broadcast(&a, sb)?, b.clone()),
        (_, Rank::Scalar) => (a.clone(), broadcast(&b, sa)?),
        _ if sa.extents() == sb.extents() => (a.clone(), b.clone()),
        _ => {
            return Err(RuntimeError::dimension(format!(
                "`{}` between {} and {}",
                op.symbol(),
                a.ty(),
                b.ty()
            )))
        }
    };

    let (x, y) = (buffer_of(&a)?, buffer_of(&b)?);
    if collapses {
        let equal = array::buffers_equal(x, y)?;
        return Ok(Variable::boolean(if op == BinaryOp::Eq { equal } else { !equal }));
    }
    let buffer = array::elementwise(op, x, y)?;
    Variable::from_buffer(array_shape(&a)?.with_element(result_kind), buffer)
}

fn concat_with_empty(a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let other = match (a.is_empty_array(), b.is_empty_array()) {
        (true, true) => return Ok(Variable::empty_array()),
        (true, false) => b,
        _ => a,
    };
    let shape = array_shape(other)?;
    match shape.rank() {
        Rank::Scalar => {
            let buffer = buffer_of(other)?.clone();
            Variable::from_buffer(Shape::vector(shape.element, 1), buffer)
        }
        Rank::Vector => Ok(other.clone()),
        _ => Err(RuntimeError::dimension("matrices cannot be concatenated")),
    }
}

fn concat(a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let (sa, sb) = (array_shape(a)?, array_shape(b)?);
    match (sa.rank(), sb.rank()) {
        (Rank::Matrix, _) | (_, Rank::Matrix) => {
            return Err(RuntimeError::dimension("matrices cannot be concatenated"))
        }
        (Rank::Scalar, Rank::Scalar) => {
            return Err(RuntimeError::dimension(
                "concatenation needs at least one vector operand",
            ))
        }
        _ => {}
    }
    let buffer = array::concat(buffer_of(a)?, buffer_of(b)?)?;
    let is_string = (sa.is_string || sb.is_string) && buffer.kind() == ElementKind::Character;
    let shape = Shape::new(buffer.kind(), &[Some(buffer.len())], is_string);
    Variable::from_buffer(shape, buffer)
}

fn dot_or_matmul(a: &Variable, b: &Variable) -> RuntimeResult<Variable> {
    let (sa, sb) = (array_shape(a)?, array_shape(b)?);
    match (sa.rank(), sb.rank()) {
        (Rank::Vector, Rank::Vector) => {
            let value = array::dot_product(buffer_of(a)?, buffer_of(b)?)?;
            Ok(Variable::scalar(value))
        }
        (Rank::Matrix, Rank::Matrix) => {
            let (n, m, m2, k) = (sa.extent(0), sa.extent(1), sb.extent(0), sb.extent(1));
            if m != m2 {
                return Err(RuntimeError::dimension(format!(
                    "cannot multiply {n}x{m} by {m2}x{k}"
                )));
            }
            let buffer = array::matrix_multiply(buffer_of(a)?, buffer_of(b)?, n, m, k)?;
            Variable::from_buffer(Shape::matrix(buffer.kind(), n, k), buffer)
        }
        _ => Err(RuntimeError::dimension(format!(
            "`**` between {} and {}",
            a.ty(),
            b.ty()
        ))),
    }
}

pub fn length(value: &Variable) -> RuntimeResult<Variable> {
    let value = operand(value, "length")?;
    if let Some(interval) = value.as_interval() {
        return Ok(Variable::integer(interval.len() as i32));
    }
    let shape = array_shape(&value)?;
    match shape.rank() {
        Rank::Unspecified => Ok(Variable::integer(0)),
        Rank::Vector => Ok(Variable::integer(shape.extent(0) as i32)),
        _ => Err(RuntimeError::dimension(format!(
            "length expects a vector, found {}",
            value.ty()
        ))),
    }
}

fn matrix_extent(value: &Variable, axis: usize, name: &str) -> RuntimeResult<Variable> {
    let value = operand(value, name)?;
    let shape = array_shape(&value)?;
    match shape.rank() {
        Rank::Unspecified => Ok(Variable::integer(0)),
        Rank::Matrix => Ok(Variable::integer(shape.extent(axis) as i32)),
        _ => Err(RuntimeError::dimension(format!(
            "{name} expects a matrix, found {}",
            value.ty()
        ))),
    }
}

pub fn rows(value: &Variable) -> RuntimeResult<Variable> {
    matrix_extent(value, 0, "rows")
}

pub fn columns(value: &Variable) -> RuntimeResult<Variable> {
    matrix_extent(value, 1, "columns")
}

pub fn reverse(value: &Variable) -> RuntimeResult<Variable> {
    let value = operand(value, "reverse")?;
    if let Some(interval) = value.as_interval() {
        return Ok(Variable::vector(interval.reversed()));
    }
    let shape = array_shape(&value)?;
    match shape.rank() {
        Rank::Unspecified => Ok(Variable::empty_array()),
        Rank::Vector if value.is_sentinel() => Ok(value.into_owned()),
        Rank::Vector => {
            let mut elements = value.elements()?;
            elements.reverse();
            let buffer = ArrayBuffer::from_elements(shape.element, &elements)?;
            Variable::from_buffer(shape.clone(), buffer)
        }
        _ => Err(RuntimeError::dimension(format!(
            "reverse expects a vector, found {}",
            value.ty()
        ))),
    }
}
