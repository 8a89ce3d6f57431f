use crate::runtime::array::{self, ArrayBuffer, Rank, ResizeRestriction, Shape};
use crate::runtime::element::{self, ElementKind};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::tuple::TupleType;
use crate::runtime::value::{IntervalKind, Type, Variable};
use std::rc::Rc;

/// Context a value is converted in when it meets a declared type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    Promotion,
    Cast,
    Declaration,
    Assignment,
    Parameter,
}

#[derive(Clone, Copy, Debug)]
struct Rules {
    unknown_type: bool,
    unknown_size: bool,
    restriction: ResizeRestriction,
    cast: bool,
}

impl Conversion {
    fn rules(self) -> Rules {
        match self {
            Conversion::Promotion => Rules {
                unknown_type: true,
                unknown_size: false,
                restriction: ResizeRestriction::SameSize,
                cast: false,
            },
            Conversion::Cast => Rules {
                unknown_type: false,
                unknown_size: true,
                restriction: ResizeRestriction::AnySize,
                cast: true,
            },
            Conversion::Declaration | Conversion::Parameter => Rules {
                unknown_type: true,
                unknown_size: true,
                restriction: ResizeRestriction::NotLarger,
                cast: false,
            },
            Conversion::Assignment => Rules {
                unknown_type: false,
                unknown_size: false,
                restriction: ResizeRestriction::SameSize,
                cast: false,
            },
        }
    }
}

fn mismatch(target: &Type, value: &Variable, mode: Conversion) -> RuntimeError {
    RuntimeError::type_mismatch(format!(
        "{mode:?} of {} into {target} is not allowed",
        value.ty()
    ))
}

/// Builds a value of `target` from a concrete `value` under the rules of
/// `mode`.
pub fn convert(target: &Type, value: &Variable, mode: Conversion) -> RuntimeResult<Variable> {
    let rules = mode.rules();
    if value.is_view() {
        return Err(RuntimeError::internal("views must be resolved before conversion"));
    }
    if value.ty().is_stream() || matches!(value.ty(), Type::Unknown) || target.is_stream() {
        return Err(mismatch(target, value, mode));
    }
    let value = value.promote_mixed()?;
    match target {
        Type::Unknown if rules.unknown_type => Ok(value),
        Type::Unknown => Err(mismatch(target, &value, mode)),
        Type::Tuple(fields) => convert_tuple(fields, &value, mode),
        Type::Interval(kind) => match value.as_interval() {
            Some(_) if *kind == IntervalKind::Integer || rules.unknown_type => Ok(value),
            _ => Err(mismatch(target, &value, mode)),
        },
        Type::Array(shape) => convert_array(target, shape, &value, mode),
        Type::StreamIn | Type::StreamOut => Err(mismatch(target, &value, mode)),
    }
}

fn convert_tuple(
    target: &Rc<TupleType>,
    value: &Variable,
    mode: Conversion,
) -> RuntimeResult<Variable> {
    let Some(fields) = value.tuple_fields() else {
        return Err(mismatch(&Type::Tuple(target.clone()), value, mode));
    };
    if fields.len() != target.arity() {
        return Err(RuntimeError::type_mismatch(format!(
            "tuple of arity {} cannot become arity {}",
            fields.len(),
            target.arity()
        )));
    }
    let converted = fields
        .iter()
        .zip(target.field_types())
        .map(|(field, ty)| convert(ty, field, mode))
        .collect::<RuntimeResult<Vec<_>>>()?;
    let ty = Rc::new(TupleType::new(
        target
            .names()
            .iter()
            .cloned()
            .zip(converted.iter().map(|field| field.ty().clone()))
            .collect(),
    ));
    Ok(Variable::from_tuple_parts(ty, converted))
}

fn convert_elements(
    buffer: &ArrayBuffer,
    kind: ElementKind,
    rules: Rules,
) -> RuntimeResult<ArrayBuffer> {
    if rules.cast {
        buffer.cast_to(kind)
    } else {
        buffer.promote_to(kind)
    }
}

/// Fills in `*` extents from the source, when the mode allows it.
fn resolve_extents(
    target: &Shape,
    source: &Shape,
    rules: Rules,
) -> RuntimeResult<Vec<Option<usize>>> {
    let mut extents = Vec::with_capacity(target.extents().len());
    for (axis, extent) in target.extents().iter().enumerate() {
        match extent {
            Some(size) => extents.push(Some(*size)),
            None if rules.unknown_size => extents.push(Some(source.extent(axis))),
            None => {
                return Err(RuntimeError::size(
                    "the declared size must be known in this context",
                ))
            }
        }
    }
    Ok(extents)
}

fn convert_array(
    target: &Type,
    shape: &Shape,
    value: &Variable,
    mode: Conversion,
) -> RuntimeResult<Variable> {
    let rules = mode.rules();
    let kind = shape.element;
    if !kind.is_basic() {
        return Err(mismatch(target, value, mode));
    }

    if let Some(interval) = value.as_interval() {
        if shape.rank() != Rank::Vector {
            return Err(mismatch(target, value, mode));
        }
        if !rules.cast && !kind.is_numeric() {
            return Err(mismatch(target, value, mode));
        }
        let widened = Variable::interval_to_vector(&interval);
        return convert_array(target, shape, &widened, mode);
    }

    let Some(source) = value.shape() else {
        return Err(mismatch(target, value, mode));
    };

    if shape.is_empty_array() {
        return retag(shape, value, rules);
    }

    if source.is_empty_array() {
        return from_empty(shape, rules);
    }

    if value.is_sentinel() {
        if rules.cast {
            return Err(mismatch(target, value, mode));
        }
        let filled = value.fill_sentinel(kind)?;
        return convert_array(target, shape, &filled, mode);
    }

    let Some(buffer) = value.buffer() else {
        return Err(mismatch(target, value, mode));
    };
    let buffer = convert_elements(buffer, kind, rules)?;

    match (source.rank(), shape.rank()) {
        (Rank::Scalar, Rank::Scalar) => Variable::from_buffer(Shape::scalar(kind), buffer),
        (Rank::Scalar, _) => {
            if shape.has_unknown_size() {
                return Err(RuntimeError::size(
                    "a scalar cannot size an array of unknown extent",
                ));
            }
            let fill = buffer.get(0)?;
            let buffer = ArrayBuffer::filled(kind, array::total_length(shape), fill)?;
            Variable::from_buffer(shape.clone(), buffer)
        }
        (Rank::Vector, Rank::Vector) | (Rank::Matrix, Rank::Matrix) => {
            let extents = resolve_extents(shape, source, rules)?;
            let resolved = Shape::new(kind, &extents, shape.is_string);
            let needed = array::minimum_compatible_resize_restriction(source, &resolved);
            if needed > rules.restriction {
                return Err(RuntimeError::dimension(format!(
                    "{} does not fit {} under {mode:?}",
                    value.ty(),
                    Type::Array(resolved)
                )));
            }
            let buffer = if source.rank() == Rank::Vector {
                array::resize_vector(&buffer, resolved.extent(0))?
            } else {
                array::resize_matrix(
                    &buffer,
                    source.extent(0),
                    source.extent(1),
                    resolved.extent(0),
                    resolved.extent(1),
                )?
            };
            Variable::from_buffer(resolved, buffer)
        }
        _ => Err(mismatch(target, value, mode)),
    }
}

/// Target without dimensions: only the element kind changes.
fn retag(shape: &Shape, value: &Variable, rules: Rules) -> RuntimeResult<Variable> {
    let Some(source) = value.shape() else {
        return Err(RuntimeError::internal("retag of a non-array value"));
    };
    if source.is_empty_array() {
        return Ok(value.clone());
    }
    let filled;
    let value = if value.is_sentinel() {
        filled = value.fill_sentinel(shape.element)?;
        &filled
    } else {
        value
    };
    let Some(buffer) = value.buffer() else {
        return Err(RuntimeError::internal("array value without storage"));
    };
    let buffer = convert_elements(buffer, shape.element, rules)?;
    Variable::from_buffer(source.with_element(shape.element), buffer)
}

fn from_empty(shape: &Shape, rules: Rules) -> RuntimeResult<Variable> {
    if shape.rank() == Rank::Scalar {
        return Err(RuntimeError::type_mismatch(
            "the empty array cannot become a scalar",
        ));
    }
    let mut extents = Vec::with_capacity(shape.extents().len());
    for extent in shape.extents() {
        match extent {
            None if rules.unknown_size => extents.push(Some(0)),
            None => {
                return Err(RuntimeError::size(
                    "the declared size must be known in this context",
                ))
            }
            Some(size) if *size > 0 && rules.restriction == ResizeRestriction::SameSize => {
                return Err(RuntimeError::dimension(format!(
                    "the empty array cannot fill {size} elements"
                )))
            }
            Some(size) => extents.push(Some(*size)),
        }
    }
    let resolved = Shape::new(shape.element, &extents, shape.is_string);
    let buffer = ArrayBuffer::zeroed(shape.element, array::total_length(&resolved))?;
    Variable::from_buffer(resolved, buffer)
}

/// Whether a value of `from` may be promoted or cast into `to` elementwise.
pub fn element_convertible(to: ElementKind, from: ElementKind, mode: Conversion) -> bool {
    if mode.rules().cast {
        element::can_cast(to, from)
    } else {
        element::can_promote(to, from)
    }
}
