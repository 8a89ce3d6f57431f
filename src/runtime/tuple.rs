use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{Type, Variable};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Field types of a tuple plus the optional identifier of each field.
pub struct TupleType {
    fields: Vec<Type>,
    names: Vec<Option<String>>,
    lookup: OnceCell<HashMap<String, usize>>,
}

impl TupleType {
    pub fn new(fields: Vec<(Option<String>, Type)>) -> Self {
        let (names, fields) = fields.into_iter().unzip();
        Self {
            fields,
            names,
            lookup: OnceCell::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn field_types(&self) -> &[Type] {
        &self.fields
    }

    pub fn field_type(&self, position: usize) -> Option<&Type> {
        self.fields.get(position)
    }

    pub fn field_name(&self, position: usize) -> Option<&str> {
        self.names.get(position).and_then(|name| name.as_deref())
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    /// Position of a named field. The name table is built on first lookup and
    /// reused for every later one.
    pub fn resolve_field(&self, name: &str) -> Option<usize> {
        self.lookup
            .get_or_init(|| {
                tracing::trace!(arity = self.arity(), "building tuple field table");
                self.names
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, name)| name.as_ref().map(|name| (name.clone(), pos)))
                    .collect()
            })
            .get(name)
            .copied()
    }

    pub fn lookup_built(&self) -> bool {
        self.lookup.get().is_some()
    }
}

impl PartialEq for TupleType {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.names == other.names
    }
}

impl fmt::Debug for TupleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("tuple");
        for (name, ty) in self.names.iter().zip(&self.fields) {
            match name {
                Some(name) => tuple.field(&format_args!("{ty:?} {name}")),
                None => tuple.field(ty),
            };
        }
        tuple.finish()
    }
}

/// Builds a tuple from already evaluated, concrete field values. The fields
/// are owned by the tuple from here on.
pub fn compose(fields: Vec<(Option<String>, Variable)>) -> RuntimeResult<Variable> {
    if fields.is_empty() {
        return Err(RuntimeError::size("tuples have at least one field"));
    }
    let mut types = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        if value.is_view() {
            return Err(RuntimeError::internal(
                "tuple fields must be resolved before composition",
            ));
        }
        types.push((name, value.ty().clone()));
        values.push(value);
    }
    Ok(Variable::from_tuple_parts(
        Rc::new(TupleType::new(types)),
        values,
    ))
}

pub fn field(tuple: &Variable, position: usize) -> RuntimeResult<&Variable> {
    let fields = tuple
        .tuple_fields()
        .ok_or_else(|| RuntimeError::type_mismatch("field access on a non-tuple value"))?;
    fields
        .get(position)
        .ok_or_else(|| RuntimeError::out_of_range(position as i64 + 1, fields.len()))
}

pub fn field_mut(tuple: &mut Variable, position: usize) -> RuntimeResult<&mut Variable> {
    let fields = tuple
        .tuple_fields_mut()
        .ok_or_else(|| RuntimeError::type_mismatch("field access on a non-tuple value"))?;
    let arity = fields.len();
    fields
        .get_mut(position)
        .ok_or_else(|| RuntimeError::out_of_range(position as i64 + 1, arity))
}

pub fn field_by_name<'a>(tuple: &'a Variable, name: &str) -> RuntimeResult<&'a Variable> {
    let Type::Tuple(ty) = tuple.ty() else {
        return Err(RuntimeError::type_mismatch("field access on a non-tuple value"));
    };
    let position = ty.resolve_field(name).ok_or_else(|| {
        RuntimeError::type_mismatch(format!("tuple has no field named `{name}`"))
    })?;
    field(tuple, position)
}

/// Exchanges the tuple types of two tuple values of equal arity. Anything
/// else is left untouched and reported as `false`.
pub fn swap_types(a: &mut Variable, b: &mut Variable) -> bool {
    let (Type::Tuple(x), Type::Tuple(y)) = (a.ty_mut(), b.ty_mut()) else {
        return false;
    };
    if x.arity() != y.arity() {
        return false;
    }
    std::mem::swap(x, y);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::element::ElementKind;

    fn point() -> Variable {
        compose(vec![
            (Some("x".to_string()), Variable::integer(3)),
            (Some("y".to_string()), Variable::real(1.5)),
            (None, Variable::boolean(true)),
        ])
        .unwrap()
    }

    #[test]
    fn positional_and_named_access() {
        let tuple = point();
        assert_eq!(field(&tuple, 1).unwrap(), &Variable::real(1.5));
        assert_eq!(field_by_name(&tuple, "x").unwrap(), &Variable::integer(3));
        assert!(field_by_name(&tuple, "z").is_err());
        assert!(matches!(
            field(&tuple, 3),
            Err(RuntimeError::IndexOutOfRange { index: 4, length: 3 })
        ));
    }

    #[test]
    fn field_table_is_built_once() {
        let tuple = point();
        let Type::Tuple(ty) = tuple.ty() else {
            panic!("expected tuple type");
        };
        assert!(!ty.lookup_built());
        assert_eq!(ty.resolve_field("y"), Some(1));
        assert!(ty.lookup_built());
        assert_eq!(ty.resolve_field("x"), Some(0));
    }

    #[test]
    fn composition_copies_fields() {
        let source = Variable::vector(vec![1, 2, 3]);
        let mut tuple = compose(vec![(None, source.clone())]).unwrap();
        field_mut(&mut tuple, 0)
            .unwrap()
            .set_element(0, crate::runtime::element::Element::Integer(9))
            .unwrap();
        assert_eq!(source, Variable::vector(vec![1, 2, 3]));
    }

    #[test]
    fn swapping_requires_matching_arity() {
        let mut a = point();
        let mut b = compose(vec![
            (Some("a".to_string()), Variable::integer(1)),
            (Some("b".to_string()), Variable::integer(2)),
            (Some("c".to_string()), Variable::integer(3)),
        ])
        .unwrap();
        assert!(swap_types(&mut a, &mut b));
        assert!(field_by_name(&a, "c").is_ok());

        let mut pair = compose(vec![
            (None, Variable::integer(1)),
            (None, Variable::integer(2)),
        ])
        .unwrap();
        assert!(!swap_types(&mut a, &mut pair));
        let mut scalar = Variable::integer(4);
        assert!(!swap_types(&mut scalar, &mut pair));
        assert_eq!(scalar.element_kind(), Some(ElementKind::Integer));
    }
}
