use crate::runtime::array::Rank;
use crate::runtime::element::Element;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{Type, Variable};
use std::io::Write;

/// `%g` with six significant digits.
pub fn format_real(value: f32) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }
    if value == 0.0 {
        let text = if value.is_sign_negative() { "-0" } else { "0" };
        return text.to_string();
    }
    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        )
    }
}

fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

fn element_bytes(value: Element) -> Vec<u8> {
    match value {
        Element::Boolean(true) => b"T".to_vec(),
        Element::Boolean(false) => b"F".to_vec(),
        Element::Integer(v) => v.to_string().into_bytes(),
        Element::Real(v) => format_real(v).into_bytes(),
        Element::Character(v) => vec![v],
        Element::Null => vec![0],
        Element::Identity => vec![1],
    }
}

fn bracketed(elements: &[Element]) -> Vec<u8> {
    let mut out = vec![b'['];
    for (pos, value) in elements.iter().enumerate() {
        if pos > 0 {
            out.push(b' ');
        }
        out.extend(element_bytes(*value));
    }
    out.push(b']');
    out
}

/// Bytes a concrete value prints as.
pub fn render(value: &Variable) -> RuntimeResult<Vec<u8>> {
    if value.is_view() {
        return Err(RuntimeError::internal("views must be resolved before printing"));
    }
    if value.is_mixed() {
        return render(&value.promote_mixed()?);
    }
    if let Some(interval) = value.as_interval() {
        return render(&Variable::interval_to_vector(&interval));
    }
    let Type::Array(shape) = value.ty() else {
        return Err(RuntimeError::type_mismatch(format!(
            "{} cannot be printed",
            value.ty()
        )));
    };
    let elements = value.elements()?;
    Ok(match shape.rank() {
        Rank::Unspecified => b"[]".to_vec(),
        Rank::Scalar => element_bytes(elements[0]),
        Rank::Vector if shape.is_string => elements.into_iter().flat_map(element_bytes).collect(),
        Rank::Vector => bracketed(&elements),
        Rank::Matrix => {
            let cols = shape.extent(1);
            let mut out = vec![b'['];
            for row in 0..shape.extent(0) {
                if row > 0 {
                    out.push(b' ');
                }
                out.extend(bracketed(&elements[row * cols..(row + 1) * cols]));
            }
            out.push(b']');
            out
        }
    })
}

pub fn print<W: Write>(out: &mut W, stream: &Variable, value: &Variable) -> RuntimeResult<()> {
    if stream.ty() != &Type::StreamOut {
        return Err(RuntimeError::type_mismatch(format!(
            "cannot print to {}",
            stream.ty()
        )));
    }
    let bytes = render(value)?;
    out.write_all(&bytes)
        .and_then(|_| out.flush())
        .map_err(|err| RuntimeError::internal(format!("output stream write failed: {err}")))
}
