use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Boolean,
    Integer,
    Real,
    Character,
    Null,
    Identity,
    Mixed,
}

impl ElementKind {
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            ElementKind::Boolean | ElementKind::Integer | ElementKind::Real | ElementKind::Character
        )
    }

    pub fn is_null_or_identity(self) -> bool {
        matches!(self, ElementKind::Null | ElementKind::Identity)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ElementKind::Integer | ElementKind::Real)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Boolean => "boolean",
            ElementKind::Integer => "integer",
            ElementKind::Real => "real",
            ElementKind::Character => "character",
            ElementKind::Null => "null",
            ElementKind::Identity => "identity",
            ElementKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single scalar element. `Null` and `Identity` double as the boxed
/// entries of a not-yet-promoted mixed literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Element {
    Boolean(bool),
    Integer(i32),
    Real(f32),
    Character(u8),
    Null,
    Identity,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Boolean(_) => ElementKind::Boolean,
            Element::Integer(_) => ElementKind::Integer,
            Element::Real(_) => ElementKind::Real,
            Element::Character(_) => ElementKind::Character,
            Element::Null => ElementKind::Null,
            Element::Identity => ElementKind::Identity,
        }
    }

    pub fn zero(kind: ElementKind) -> RuntimeResult<Element> {
        match kind {
            ElementKind::Boolean => Ok(Element::Boolean(false)),
            ElementKind::Integer => Ok(Element::Integer(0)),
            ElementKind::Real => Ok(Element::Real(0.0)),
            ElementKind::Character => Ok(Element::Character(0)),
            other => Err(RuntimeError::operand_kind(format!(
                "{other} has no zero element"
            ))),
        }
    }

    pub fn one(kind: ElementKind) -> RuntimeResult<Element> {
        match kind {
            ElementKind::Boolean => Ok(Element::Boolean(true)),
            ElementKind::Integer => Ok(Element::Integer(1)),
            ElementKind::Real => Ok(Element::Real(1.0)),
            ElementKind::Character => Ok(Element::Character(1)),
            other => Err(RuntimeError::operand_kind(format!(
                "{other} has no identity element"
            ))),
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Element::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Element::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Range,
    Exponent,
    Multiply,
    Divide,
    Remainder,
    DotProduct,
    Plus,
    Minus,
    By,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Xor,
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Range => "..",
            BinaryOp::Exponent => "^",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::DotProduct => "**",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::By => "by",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Concat => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }
}

pub fn can_cast(to: ElementKind, from: ElementKind) -> bool {
    if !to.is_basic() || !from.is_basic() {
        return false;
    }
    !(from == ElementKind::Real && matches!(to, ElementKind::Boolean | ElementKind::Character))
}

pub fn can_promote(to: ElementKind, from: ElementKind) -> bool {
    if to == ElementKind::Mixed || from == ElementKind::Mixed {
        return false;
    }
    if to == from {
        return true;
    }
    to.is_basic()
        && (from.is_null_or_identity()
            || (from == ElementKind::Integer && to == ElementKind::Real))
}

/// Common kind two operands meet at, trying `b -> a` before `a -> b`.
pub fn promote_between(a: ElementKind, b: ElementKind) -> Option<ElementKind> {
    if can_promote(a, b) {
        Some(a)
    } else if can_promote(b, a) {
        Some(b)
    } else {
        None
    }
}

pub fn promote(to: ElementKind, value: Element) -> RuntimeResult<Element> {
    let from = value.kind();
    if !can_promote(to, from) {
        return Err(RuntimeError::type_mismatch(format!(
            "cannot promote {from} to {to}"
        )));
    }
    match (to, value) {
        (_, _) if to == from => Ok(value),
        (_, Element::Null) => Element::zero(to),
        (_, Element::Identity) => Element::one(to),
        (ElementKind::Real, Element::Integer(v)) => Ok(Element::Real(v as f32)),
        _ => Err(RuntimeError::internal(format!(
            "promotion from {from} to {to} has no conversion"
        ))),
    }
}

pub fn cast(to: ElementKind, value: Element) -> RuntimeResult<Element> {
    let from = value.kind();
    if !can_cast(to, from) {
        return Err(RuntimeError::InvalidCast {
            message: format!("cannot cast {from} to {to}"),
        });
    }
    let converted = match (to, value) {
        (_, _) if to == from => value,
        (ElementKind::Boolean, Element::Integer(v)) => Element::Boolean(v != 0),
        (ElementKind::Boolean, Element::Character(v)) => Element::Boolean(v != 0),
        (ElementKind::Character, Element::Boolean(v)) => Element::Character(v as u8),
        (ElementKind::Character, Element::Integer(v)) => Element::Character(v as u8),
        (ElementKind::Integer, Element::Boolean(v)) => Element::Integer(v as i32),
        (ElementKind::Integer, Element::Character(v)) => Element::Integer(v as i32),
        (ElementKind::Integer, Element::Real(v)) => Element::Integer(v as i32),
        (ElementKind::Real, Element::Boolean(v)) => Element::Real(if v { 1.0 } else { 0.0 }),
        (ElementKind::Real, Element::Character(v)) => Element::Real(v as f32),
        (ElementKind::Real, Element::Integer(v)) => Element::Real(v as f32),
        _ => {
            return Err(RuntimeError::internal(format!(
                "cast from {from} to {to} has no conversion"
            )))
        }
    };
    Ok(converted)
}

pub fn can_use_unary(kind: ElementKind, op: UnaryOp) -> bool {
    match kind {
        ElementKind::Boolean => op == UnaryOp::Not,
        ElementKind::Integer | ElementKind::Real => matches!(op, UnaryOp::Plus | UnaryOp::Minus),
        _ => false,
    }
}

/// Result kind of `op` applied to two elements of `kind`, or `None` when the
/// pairing is not an element-level operation.
pub fn binary_result_kind(kind: ElementKind, op: BinaryOp) -> Option<ElementKind> {
    match kind {
        ElementKind::Boolean => match op {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                Some(ElementKind::Boolean)
            }
            _ => None,
        },
        ElementKind::Integer | ElementKind::Real => match op {
            op if op.is_comparison() => Some(ElementKind::Boolean),
            BinaryOp::Exponent
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Remainder
            | BinaryOp::Plus
            | BinaryOp::Minus => Some(kind),
            _ => None,
        },
        _ => None,
    }
}

pub fn unary_op(op: UnaryOp, value: Element) -> RuntimeResult<Element> {
    if !can_use_unary(value.kind(), op) {
        return Err(RuntimeError::operand_kind(format!(
            "unary operator {op:?} is not defined for {}",
            value.kind()
        )));
    }
    Ok(match (op, value) {
        (UnaryOp::Not, Element::Boolean(v)) => Element::Boolean(!v),
        (UnaryOp::Minus, Element::Integer(v)) => Element::Integer(v.wrapping_neg()),
        (UnaryOp::Minus, Element::Real(v)) => Element::Real(-v),
        (_, other) => other,
    })
}

pub fn binary_op(op: BinaryOp, a: Element, b: Element) -> RuntimeResult<Element> {
    if a.kind() != b.kind() {
        return Err(RuntimeError::operand_kind(format!(
            "operands of {} must share a kind, found {} and {}",
            op.symbol(),
            a.kind(),
            b.kind()
        )));
    }
    if binary_result_kind(a.kind(), op).is_none() {
        return Err(RuntimeError::operand_kind(format!(
            "operator {} is not defined for {}",
            op.symbol(),
            a.kind()
        )));
    }
    match (a, b) {
        (Element::Boolean(x), Element::Boolean(y)) => Ok(Element::Boolean(match op {
            BinaryOp::Eq => x == y,
            BinaryOp::Ne => x != y,
            BinaryOp::And => x && y,
            BinaryOp::Or => x || y,
            _ => x ^ y,
        })),
        (Element::Integer(x), Element::Integer(y)) => integer_op(op, x, y),
        (Element::Real(x), Element::Real(y)) => Ok(real_op(op, x, y)),
        _ => Err(RuntimeError::internal("unreachable element pairing")),
    }
}

fn integer_op(op: BinaryOp, x: i32, y: i32) -> RuntimeResult<Element> {
    let value = match op {
        BinaryOp::Eq => return Ok(Element::Boolean(x == y)),
        BinaryOp::Ne => return Ok(Element::Boolean(x != y)),
        BinaryOp::Lt => return Ok(Element::Boolean(x < y)),
        BinaryOp::Gt => return Ok(Element::Boolean(x > y)),
        BinaryOp::Le => return Ok(Element::Boolean(x <= y)),
        BinaryOp::Ge => return Ok(Element::Boolean(x >= y)),
        BinaryOp::Exponent => integer_power(x, y)?,
        BinaryOp::Multiply => x.wrapping_mul(y),
        BinaryOp::Divide => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero {
                    message: format!("{x} / 0"),
                });
            }
            x.wrapping_div(y)
        }
        BinaryOp::Remainder => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero {
                    message: format!("{x} % 0"),
                });
            }
            x.wrapping_rem(y)
        }
        BinaryOp::Plus => x.wrapping_add(y),
        BinaryOp::Minus => x.wrapping_sub(y),
        _ => {
            return Err(RuntimeError::internal(format!(
                "integer operator {} slipped through",
                op.symbol()
            )))
        }
    };
    Ok(Element::Integer(value))
}

fn real_op(op: BinaryOp, x: f32, y: f32) -> Element {
    match op {
        BinaryOp::Eq => Element::Boolean(x == y),
        BinaryOp::Ne => Element::Boolean(x != y),
        BinaryOp::Lt => Element::Boolean(x < y),
        BinaryOp::Gt => Element::Boolean(x > y),
        BinaryOp::Le => Element::Boolean(x <= y),
        BinaryOp::Ge => Element::Boolean(x >= y),
        BinaryOp::Exponent => Element::Real(x.powf(y)),
        BinaryOp::Multiply => Element::Real(x * y),
        BinaryOp::Divide => Element::Real(x / y),
        BinaryOp::Remainder => Element::Real(x % y),
        BinaryOp::Plus => Element::Real(x + y),
        _ => Element::Real(x - y),
    }
}

/// Integer power by repeated squaring. Negative exponents truncate towards
/// zero except for bases 1 and -1.
pub fn integer_power(base: i32, exp: i32) -> RuntimeResult<i32> {
    if exp < 0 {
        return match base {
            0 => Err(RuntimeError::DivisionByZero {
                message: format!("0 ^ {exp}"),
            }),
            1 => Ok(1),
            -1 => Ok(if exp % 2 == 0 { 1 } else { -1 }),
            _ => Ok(0),
        };
    }
    if base == -1 {
        return Ok(if exp % 2 == 0 { 1 } else { -1 });
    }
    let mut result: i32 = 1;
    let mut base = base;
    let mut exp = exp;
    while exp != 0 {
        if exp % 2 == 1 {
            result = result.wrapping_mul(base);
        }
        exp /= 2;
        base = base.wrapping_mul(base);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: [ElementKind; 4] = [
        ElementKind::Boolean,
        ElementKind::Integer,
        ElementKind::Real,
        ElementKind::Character,
    ];

    fn sample(kind: ElementKind) -> Element {
        match kind {
            ElementKind::Boolean => Element::Boolean(true),
            ElementKind::Integer => Element::Integer(7),
            ElementKind::Real => Element::Real(2.5),
            ElementKind::Character => Element::Character(b'a'),
            ElementKind::Null => Element::Null,
            _ => Element::Identity,
        }
    }

    #[test]
    fn promotion_is_total_where_allowed() {
        let all = [
            ElementKind::Boolean,
            ElementKind::Integer,
            ElementKind::Real,
            ElementKind::Character,
            ElementKind::Null,
            ElementKind::Identity,
        ];
        for to in all {
            for from in all {
                if can_promote(to, from) {
                    let promoted = promote(to, sample(from)).expect("promotion succeeds");
                    assert_eq!(promoted.kind(), to, "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn only_integer_crosses_into_real() {
        assert!(can_promote(ElementKind::Real, ElementKind::Integer));
        assert!(!can_promote(ElementKind::Integer, ElementKind::Real));
        for kind in [ElementKind::Boolean, ElementKind::Character] {
            assert!(!can_promote(ElementKind::Real, kind));
            assert!(!can_promote(kind, ElementKind::Real));
        }
        assert!(!can_promote(ElementKind::Mixed, ElementKind::Mixed));
    }

    #[test]
    fn null_and_identity_promote_to_zero_and_one() {
        assert_eq!(
            promote(ElementKind::Boolean, Element::Null).unwrap(),
            Element::Boolean(false)
        );
        assert_eq!(
            promote(ElementKind::Real, Element::Identity).unwrap(),
            Element::Real(1.0)
        );
        assert_eq!(
            promote(ElementKind::Character, Element::Identity).unwrap(),
            Element::Character(1)
        );
    }

    #[test]
    fn real_cannot_cast_to_boolean_or_character() {
        for to in BASIC {
            for from in BASIC {
                let expected = !(from == ElementKind::Real
                    && matches!(to, ElementKind::Boolean | ElementKind::Character));
                assert_eq!(can_cast(to, from), expected);
            }
        }
        assert!(matches!(
            cast(ElementKind::Boolean, Element::Real(1.0)),
            Err(RuntimeError::InvalidCast { .. })
        ));
        assert!(matches!(
            cast(ElementKind::Character, Element::Real(1.0)),
            Err(RuntimeError::InvalidCast { .. })
        ));
    }

    #[test]
    fn casts_truncate_and_test_zero() {
        assert_eq!(
            cast(ElementKind::Integer, Element::Real(-3.9)).unwrap(),
            Element::Integer(-3)
        );
        assert_eq!(
            cast(ElementKind::Character, Element::Integer(321)).unwrap(),
            Element::Character(65)
        );
        assert_eq!(
            cast(ElementKind::Boolean, Element::Integer(0)).unwrap(),
            Element::Boolean(false)
        );
        assert_eq!(
            cast(ElementKind::Real, Element::Boolean(true)).unwrap(),
            Element::Real(1.0)
        );
    }

    #[test]
    fn unary_operand_rules() {
        assert!(unary_op(UnaryOp::Not, Element::Boolean(true)).is_ok());
        assert!(unary_op(UnaryOp::Minus, Element::Boolean(true)).is_err());
        assert!(unary_op(UnaryOp::Not, Element::Integer(1)).is_err());
        assert!(unary_op(UnaryOp::Minus, Element::Character(b'x')).is_err());
        assert_eq!(
            unary_op(UnaryOp::Minus, Element::Real(2.0)).unwrap(),
            Element::Real(-2.0)
        );
    }

    #[test]
    fn boolean_operators_are_restricted() {
        assert_eq!(
            binary_op(BinaryOp::Xor, Element::Boolean(true), Element::Boolean(true)).unwrap(),
            Element::Boolean(false)
        );
        assert!(binary_op(BinaryOp::Plus, Element::Boolean(true), Element::Boolean(true)).is_err());
        assert!(binary_op(
            BinaryOp::Eq,
            Element::Character(b'a'),
            Element::Character(b'a')
        )
        .is_err());
    }

    #[test]
    fn integer_arithmetic_truncates() {
        let div = binary_op(BinaryOp::Divide, Element::Integer(-7), Element::Integer(2)).unwrap();
        assert_eq!(div, Element::Integer(-3));
        let rem =
            binary_op(BinaryOp::Remainder, Element::Integer(-7), Element::Integer(2)).unwrap();
        assert_eq!(rem, Element::Integer(-1));
        assert!(matches!(
            binary_op(BinaryOp::Divide, Element::Integer(1), Element::Integer(0)),
            Err(RuntimeError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn integer_exponentiation() {
        assert_eq!(integer_power(3, 4).unwrap(), 81);
        assert_eq!(integer_power(2, 0).unwrap(), 1);
        assert_eq!(integer_power(-1, 1_000_001).unwrap(), -1);
        assert_eq!(integer_power(-1, -4).unwrap(), 1);
        assert_eq!(integer_power(2, -3).unwrap(), 0);
        assert!(matches!(
            integer_power(0, -1),
            Err(RuntimeError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        assert!(matches!(
            binary_op(BinaryOp::Plus, Element::Integer(1), Element::Real(1.0)),
            Err(RuntimeError::InvalidOperandKind { .. })
        ));
        assert_eq!(
            promote_between(ElementKind::Integer, ElementKind::Real),
            Some(ElementKind::Real)
        );
        assert_eq!(
            promote_between(ElementKind::Null, ElementKind::Identity),
            None
        );
    }
}
