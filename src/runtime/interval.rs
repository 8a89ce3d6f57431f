use crate::runtime::element::{BinaryOp, UnaryOp};
use crate::runtime::error::{RuntimeError, RuntimeResult};

/// Inclusive integer interval. `head <= tail` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    head: i32,
    tail: i32,
}

impl Interval {
    pub fn new(head: i32, tail: i32) -> RuntimeResult<Self> {
        if head > tail {
            return Err(RuntimeError::InvalidInterval { head, tail });
        }
        Ok(Self { head, tail })
    }

    pub fn head(&self) -> i32 {
        self.head
    }

    pub fn tail(&self) -> i32 {
        self.tail
    }

    pub fn len(&self) -> usize {
        (self.tail as i64 - self.head as i64 + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Zero-based element access.
    pub fn element_at(&self, pos: usize) -> RuntimeResult<i32> {
        if pos >= self.len() {
            return Err(RuntimeError::out_of_range(pos as i64 + 1, self.len()));
        }
        Ok((self.head as i64 + pos as i64) as i32)
    }

    pub fn to_vec(&self) -> Vec<i32> {
        (self.head..=self.tail).collect()
    }

    pub fn reversed(&self) -> Vec<i32> {
        (self.head..=self.tail).rev().collect()
    }

    pub fn by(&self, step: i32) -> RuntimeResult<Vec<i32>> {
        if step <= 0 {
            return Err(RuntimeError::size(format!(
                "interval step must be positive, found {step}"
            )));
        }
        Ok((self.head..=self.tail).step_by(step as usize).collect())
    }

    pub fn unary(&self, op: UnaryOp) -> RuntimeResult<Interval> {
        match op {
            UnaryOp::Plus => Ok(*self),
            UnaryOp::Minus => Interval::new(self.tail.wrapping_neg(), self.head.wrapping_neg()),
            UnaryOp::Not => Err(RuntimeError::operand_kind("intervals have no `not`")),
        }
    }

    pub fn arithmetic(&self, op: BinaryOp, other: &Interval) -> RuntimeResult<Interval> {
        let (a, b, c, d) = (self.head, self.tail, other.head, other.tail);
        match op {
            BinaryOp::Plus => Interval::new(a.wrapping_add(c), b.wrapping_add(d)),
            BinaryOp::Minus => Interval::new(a.wrapping_sub(d), b.wrapping_sub(c)),
            BinaryOp::Multiply => {
                let corners = [
                    a.wrapping_mul(c),
                    a.wrapping_mul(d),
                    b.wrapping_mul(c),
                    b.wrapping_mul(d),
                ];
                let low = corners.iter().copied().min().unwrap_or(0);
                let high = corners.iter().copied().max().unwrap_or(0);
                Interval::new(low, high)
            }
            other => Err(RuntimeError::operand_kind(format!(
                "operator {} is not defined between intervals",
                other.symbol()
            ))),
        }
    }
}
