use super::{engine_with_input, printed};
use crate::config::RuntimeConfig;
use crate::runtime::array::Shape;
use crate::runtime::convert::Conversion;
use crate::runtime::element::{BinaryOp, ElementKind};
use crate::runtime::error::RuntimeError;
use crate::runtime::reader::StreamState;
use crate::runtime::value::{Type, Variable};
use crate::runtime::Engine;
use std::io::Cursor;

#[test]
fn failed_read_keeps_the_token_for_the_next_read() {
    let mut engine = engine_with_input("42 notanumber");
    let stdin = Variable::stream_in();

    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(42));
    assert_eq!(engine.stream_state(), Variable::integer(0));

    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(0));
    assert_eq!(engine.stream_state(), Variable::integer(1));

    assert_eq!(
        engine.read(&stdin, ElementKind::Character),
        Variable::character(b'n')
    );
    assert_eq!(engine.last_stream_state(), StreamState::Success);
}

#[test]
fn reads_every_scalar_kind_until_end_of_input() {
    let mut engine = engine_with_input("T 2.5 -7 x");
    let stdin = Variable::stream_in();
    assert_eq!(engine.read(&stdin, ElementKind::Boolean), Variable::boolean(true));
    assert_eq!(engine.read(&stdin, ElementKind::Real), Variable::real(2.5));
    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(-7));
    assert_eq!(engine.read(&stdin, ElementKind::Character), Variable::character(b' '));
    assert_eq!(engine.read(&stdin, ElementKind::Character), Variable::character(b'x'));
    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(0));
    assert_eq!(engine.stream_state(), Variable::integer(2));
}

#[test]
fn reading_needs_an_input_stream_and_a_scalar_kind() {
    let mut engine = engine_with_input("1");
    assert!(matches!(
        engine.try_read(&Variable::stream_out(), ElementKind::Integer),
        Err(RuntimeError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.try_read(&Variable::stream_in(), ElementKind::Null),
        Err(RuntimeError::TypeMismatch { .. })
    ));
    assert_eq!(
        engine.read(&Variable::stream_in(), ElementKind::Integer),
        Variable::integer(1)
    );
}

#[test]
fn read_values_flow_into_arithmetic_and_print() {
    let mut engine = engine_with_input("3 4");
    let stdin = Variable::stream_in();
    let stdout = Variable::stream_out();

    let a = engine.read(&stdin, ElementKind::Integer);
    let b = engine.read(&stdin, ElementKind::Integer);
    let sum = engine.binary(BinaryOp::Plus, &a, &b);
    engine.print(&stdout, &sum);
    engine.print(&stdout, &Variable::character(b'\n'));

    let real = Type::Array(Shape::scalar(ElementKind::Real));
    let ratio = engine.binary(
        BinaryOp::Divide,
        &engine.convert(&real, &a, Conversion::Promotion),
        &b,
    );
    engine.print(&stdout, &ratio);
    engine.print(&stdout, &Variable::character(b'\n'));

    let pair = engine.binary(BinaryOp::Concat, &a, &Variable::vector(vec![9]));
    engine.print(&stdout, &pair);

    assert_eq!(printed(engine), "7\n0.75\n[3 9]");
}

#[test]
fn print_needs_an_output_stream() {
    let mut engine = engine_with_input("");
    assert!(engine
        .try_print(&Variable::stream_in(), &Variable::integer(1))
        .is_err());
    engine.print(&Variable::stream_out(), &Variable::string("done"));
    assert_eq!(printed(engine), "done");
}

#[test]
fn tiny_read_buffer_reads_tokens_up_to_its_capacity() {
    let config = RuntimeConfig {
        read_buffer_capacity: 3,
        ..RuntimeConfig::default()
    };
    let mut engine = Engine::new(config, Cursor::new(b"12 345 6789 0".to_vec()), Vec::new());
    let stdin = Variable::stream_in();
    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(12));
    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(345));
    assert_eq!(engine.last_stream_state(), StreamState::Success);

    assert_eq!(engine.read(&stdin, ElementKind::Integer), Variable::integer(0));
    assert_eq!(engine.last_stream_state(), StreamState::ReadError);
    assert_eq!(
        engine.read(&stdin, ElementKind::Character),
        Variable::character(b'6')
    );
}
