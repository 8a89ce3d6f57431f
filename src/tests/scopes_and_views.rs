use super::{engine_with_input, printed};
use crate::runtime::array::Shape;
use crate::runtime::convert::Conversion;
use crate::runtime::element::{BinaryOp, ElementKind, UnaryOp};
use crate::runtime::error::RuntimeError;
use crate::runtime::tuple;
use crate::runtime::value::{Type, Variable};
use crate::runtime::view::IndexOperand;

#[test]
fn block_scope_releases_its_locals() {
    let mut engine = engine_with_input("");
    let outer = engine.allocate(Variable::integer(1));
    let mark = engine.save();
    let inner = engine.allocate(Variable::vector(vec![1, 2, 3]));
    let handle = engine.allocate_type(Type::Array(Shape::vector(ElementKind::Integer, 3)));
    assert_eq!(engine.stack().len(), 3);
    assert_eq!(engine.declared_type(handle).to_string(), "integer[3]");

    engine.restore(mark);
    assert_eq!(engine.stack().len(), 1);
    assert_eq!(engine.variable(outer), &Variable::integer(1));
    assert!(matches!(
        engine.stack().get(inner),
        Err(RuntimeError::DanglingHandle { .. })
    ));
    assert!(engine.stack().get_type(handle).is_err());
}

#[test]
fn loop_bodies_restore_to_the_same_height() {
    let mut engine = engine_with_input("");
    let total = engine.allocate(Variable::integer(0));
    let base = engine.stack().len();
    for step in 1..=4 {
        let mark = engine.save();
        let local = engine.allocate(Variable::integer(step));
        let next = engine.binary(BinaryOp::Plus, engine.variable(total), engine.variable(local));
        engine.assign(total, &next);
        engine.restore(mark);
        assert_eq!(engine.stack().len(), base);
    }
    assert_eq!(engine.variable(total), &Variable::integer(10));
}

#[test]
fn nested_subroutine_frames_unwind_in_order() {
    let mut engine = engine_with_input("");
    let caller = engine.save();
    engine.allocate(Variable::integer(1));
    let callee = engine.save();
    engine.allocate(Variable::integer(2));
    engine.allocate(Variable::integer(3));

    engine.restore(callee);
    assert_eq!(engine.stack().len(), callee.height());
    engine.restore(caller);
    assert!(engine.stack().is_empty());
}

#[test]
fn views_of_views_write_through_to_the_root() {
    let mut engine = engine_with_input("");
    let v = engine.allocate(Variable::vector(vec![10, 20, 30, 40]));
    let middle = Variable::interval(2, 3).unwrap();
    let slice = engine.index(IndexOperand::Anchored(v), &[IndexOperand::Value(&middle)]);
    let slice = engine.allocate(slice);

    let second = Variable::integer(2);
    let cell = engine.index(IndexOperand::Anchored(slice), &[IndexOperand::Value(&second)]);
    assert_eq!(cell.as_view().unwrap().root(), v);
    assert_eq!(engine.deep_copy(&cell), Variable::integer(30));

    engine.assign(slice, &Variable::integer(0));
    assert_eq!(engine.variable(v), &Variable::vector(vec![10, 0, 0, 40]));

    engine.assign(slice, &Variable::vector(vec![7, 8]));
    assert_eq!(engine.variable(v), &Variable::vector(vec![10, 7, 8, 40]));
    assert!(matches!(
        engine.try_assign(slice, &Variable::vector(vec![1, 2, 3])),
        Err(RuntimeError::DimensionMismatch { .. })
    ));
}

#[test]
fn views_take_part_in_expressions() {
    let mut engine = engine_with_input("");
    let v = engine.allocate(Variable::vector(vec![1, 2, 3, 4]));
    let picks = Variable::vector(vec![4, 1]);
    let view = engine.index(IndexOperand::Anchored(v), &[IndexOperand::Value(&picks)]);

    let doubled = engine.binary(BinaryOp::Multiply, &view, &Variable::integer(2));
    assert_eq!(doubled, Variable::vector(vec![8, 2]));
    assert_eq!(
        engine.unary(UnaryOp::Minus, &view),
        Variable::vector(vec![-4, -1])
    );
    assert_eq!(engine.length(&view), Variable::integer(2));
    assert_eq!(engine.reverse(&view), Variable::vector(vec![1, 4]));
    assert_eq!(engine.element(&view, 0), crate::runtime::element::Element::Integer(4));
    assert_eq!(
        engine.convert(
            &Type::Array(Shape::vector(ElementKind::Real, 2)),
            &view,
            Conversion::Promotion
        ),
        Variable::vector(vec![4.0f32, 1.0])
    );
    assert!(matches!(
        engine.try_unary(UnaryOp::Not, &view),
        Err(RuntimeError::InvalidOperandKind { .. })
    ));

    engine.print(&Variable::stream_out(), &view);
    assert_eq!(printed(engine), "[4 1]");
}

#[test]
fn released_roots_invalidate_their_views() {
    let mut engine = engine_with_input("");
    let mark = engine.save();
    let v = engine.allocate(Variable::vector(vec![1, 2]));
    let view = engine.index(
        IndexOperand::Anchored(v),
        &[IndexOperand::Value(&Variable::integer(1))],
    );
    engine.restore(mark);
    assert!(matches!(
        engine.try_unary(UnaryOp::Plus, &view),
        Err(RuntimeError::DanglingHandle { .. })
    ));
}

#[test]
fn tuples_hold_copies_of_their_fields() {
    let mut engine = engine_with_input("");
    let v = engine.allocate(Variable::vector(vec![1, 2, 3]));
    let head = engine.index(
        IndexOperand::Anchored(v),
        &[IndexOperand::Value(&Variable::interval(1, 2).unwrap())],
    );
    let record = engine.tuple(vec![
        (Some("head".to_string()), &head),
        (None, &Variable::real(0.5)),
    ]);
    engine.assign(v, &Variable::vector(vec![9, 9, 9]));

    assert_eq!(
        tuple::field_by_name(&record, "head").unwrap(),
        &Variable::vector(vec![1, 2])
    );
    assert_eq!(tuple::field(&record, 1).unwrap(), &Variable::real(0.5));

    let same = engine.tuple(vec![
        (None, &Variable::vector(vec![1, 2])),
        (None, &Variable::real(0.5)),
    ]);
    assert_eq!(
        engine.binary(BinaryOp::Eq, &record, &same),
        Variable::boolean(true)
    );
}

#[test]
fn concatenation_adds_lengths() {
    let engine = engine_with_input("");
    let a = Variable::vector(vec![1, 2, 3]);
    let b = Variable::vector(vec![4.0f32, 5.0]);
    let joined = engine.binary(BinaryOp::Concat, &a, &b);
    let total = engine.binary(BinaryOp::Plus, &engine.length(&a), &engine.length(&b));
    assert_eq!(engine.length(&joined), total);
    assert_eq!(joined.element_kind(), Some(ElementKind::Real));
}
