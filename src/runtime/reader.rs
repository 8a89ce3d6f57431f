use nom::{
    IResult, Parser as NomParser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, one_of},
    combinator::{all_consuming, map_res, opt, recognize, value},
    sequence::pair,
};
use std::io::{self, Read};

/// Outcome of the most recent stream read, as reported by `stream_state`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Success = 0,
    ReadError = 1,
    EndOfInput = 2,
}

impl StreamState {
    pub fn code(self) -> i32 {
        self as i32
    }
}

enum Peek {
    Byte(u8),
    EndOfInput,
    Full,
    Failed,
}

enum Scan {
    Token(Vec<u8>),
    EndOfInput,
    Overflow,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RealState {
    Start,
    Sign,
    Integer,
    Dot,
    Fraction,
    Exponent,
    ExponentSign,
    ExponentDigits,
}

/// Whitespace-delimited scalar reader over a fixed ring buffer. `start` is
/// the last committed position; a failed parse moves `cursor` back to it.
/// `stash` holds the byte read past a full buffer until there is room for it.
pub struct Reader<R> {
    source: R,
    buffer: Box<[u8]>,
    stash: Option<u8>,
    start: usize,
    cursor: usize,
    end: usize,
    exhausted: bool,
    state: StreamState,
}

impl<R: Read> Reader<R> {
    pub fn new(source: R, capacity: usize) -> Self {
        Self {
            source,
            buffer: vec![0; capacity.max(2)].into_boxed_slice(),
            stash: None,
            start: 0,
            cursor: 0,
            end: 0,
            exhausted: false,
            state: StreamState::Success,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn fill(&mut self) -> Peek {
        let capacity = self.buffer.len();
        let free = capacity - (self.end - self.start);
        if free == 0 {
            return Peek::Full;
        }
        let pos = self.end % capacity;
        if let Some(byte) = self.stash.take() {
            self.buffer[pos] = byte;
            self.end += 1;
            return Peek::Byte(self.buffer[self.cursor % capacity]);
        }
        if self.exhausted {
            return Peek::EndOfInput;
        }
        let contiguous = free.min(capacity - pos);
        loop {
            match self.source.read(&mut self.buffer[pos..pos + contiguous]) {
                Ok(0) => {
                    self.exhausted = true;
                    return Peek::EndOfInput;
                }
                Ok(read) => {
                    self.end += read;
                    return Peek::Byte(self.buffer[self.cursor % capacity]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(%err, "input stream read failed");
                    return Peek::Failed;
                }
            }
        }
    }

    /// Looks one byte past a full buffer without consuming it.
    fn peek_beyond(&mut self) -> Peek {
        if let Some(byte) = self.stash {
            return Peek::Byte(byte);
        }
        if self.exhausted {
            return Peek::EndOfInput;
        }
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => {
                    self.exhausted = true;
                    return Peek::EndOfInput;
                }
                Ok(_) => {
                    self.stash = Some(byte[0]);
                    return Peek::Byte(byte[0]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(%err, "input stream read failed");
                    return Peek::Failed;
                }
            }
        }
    }

    fn peek(&mut self) -> Peek {
        if self.cursor < self.end {
            return Peek::Byte(self.buffer[self.cursor % self.buffer.len()]);
        }
        self.fill()
    }

    fn commit(&mut self) {
        self.start = self.cursor;
    }

    fn rewind(&mut self) {
        tracing::trace!(from = self.cursor, to = self.start, "reader rewind");
        self.cursor = self.start;
    }

    fn next_token(&mut self) -> Scan {
        loop {
            match self.peek() {
                Peek::Byte(byte) if byte.is_ascii_whitespace() => {
                    self.cursor += 1;
                    self.commit();
                }
                Peek::Byte(_) => break,
                Peek::EndOfInput => return Scan::EndOfInput,
                Peek::Full => return Scan::Overflow,
                Peek::Failed => return Scan::Failed,
            }
        }
        let mut token = Vec::new();
        loop {
            match self.peek() {
                Peek::Byte(byte) if !byte.is_ascii_whitespace() => {
                    token.push(byte);
                    self.cursor += 1;
                }
                Peek::Byte(_) | Peek::EndOfInput => return Scan::Token(token),
                Peek::Full => {
                    return match self.peek_beyond() {
                        Peek::Byte(byte) if !byte.is_ascii_whitespace() => Scan::Overflow,
                        Peek::Byte(_) | Peek::EndOfInput => Scan::Token(token),
                        Peek::Full => Scan::Overflow,
                        Peek::Failed => Scan::Failed,
                    }
                }
                Peek::Failed => return Scan::Failed,
            }
        }
    }

    fn finish(&mut self, state: StreamState) {
        if state == StreamState::Success {
            self.commit();
        } else {
            self.rewind();
        }
        if state != self.state {
            tracing::trace!(from = ?self.state, to = ?state, "stream state changed");
        }
        self.state = state;
    }

    fn read_token<T>(&mut self, parse: impl Fn(&[u8]) -> Option<T>, fallback: T) -> T {
        let (state, result) = match self.next_token() {
            Scan::Token(token) => match parse(&token) {
                Some(parsed) => (StreamState::Success, parsed),
                None => (StreamState::ReadError, fallback),
            },
            Scan::EndOfInput => (StreamState::EndOfInput, fallback),
            Scan::Overflow => {
                tracing::debug!(capacity = self.capacity(), "token exceeds read buffer");
                (StreamState::ReadError, fallback)
            }
            Scan::Failed => (StreamState::ReadError, fallback),
        };
        self.finish(state);
        result
    }

    pub fn read_integer(&mut self) -> i32 {
        self.read_token(|token| parse_whole(token, integer_token), 0)
    }

    pub fn read_boolean(&mut self) -> bool {
        self.read_token(|token| parse_whole(token, boolean_token), false)
    }

    pub fn read_real(&mut self) -> f32 {
        self.read_token(parse_real, 0.0)
    }

    /// One raw byte, whitespace included.
    pub fn read_character(&mut self) -> u8 {
        let (state, byte) = match self.peek() {
            Peek::Byte(byte) => {
                self.cursor += 1;
                (StreamState::Success, byte)
            }
            Peek::EndOfInput => (StreamState::EndOfInput, 0),
            Peek::Full | Peek::Failed => (StreamState::ReadError, 0),
        };
        self.finish(state);
        byte
    }
}

fn integer_token(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |digits: &str| {
        digits.parse::<i32>()
    })
    .parse(input)
}

fn boolean_token(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag("T")), value(false, tag("F")))).parse(input)
}

fn parse_whole<T>(token: &[u8], parser: fn(&str) -> IResult<&str, T>) -> Option<T> {
    let text = std::str::from_utf8(token).ok()?;
    all_consuming(parser)
        .parse(text)
        .ok()
        .map(|(_, parsed)| parsed)
}

fn is_real_literal(token: &[u8]) -> bool {
    use RealState::*;
    let mut state = Start;
    let mut digits = false;
    for &byte in token {
        state = match (state, byte) {
            (Start, b'+' | b'-') => Sign,
            (Start | Sign | Integer, b'0'..=b'9') => {
                digits = true;
                Integer
            }
            (Start | Sign | Integer, b'.') => Dot,
            (Dot | Fraction, b'0'..=b'9') => {
                digits = true;
                Fraction
            }
            (Integer | Dot | Fraction, b'e' | b'E') if digits => Exponent,
            (Exponent, b'+' | b'-') => ExponentSign,
            (Exponent | ExponentSign | ExponentDigits, b'0'..=b'9') => ExponentDigits,
            _ => return false,
        };
    }
    digits && matches!(state, Integer | Dot | Fraction | ExponentDigits)
}

fn parse_real(token: &[u8]) -> Option<f32> {
    if !is_real_literal(token) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str) -> Reader<Cursor<Vec<u8>>> {
        Reader::new(Cursor::new(input.as_bytes().to_vec()), 1024)
    }

    #[test]
    fn failed_integer_leaves_token_unread() {
        let mut input = reader("42 notanumber");
        assert_eq!(input.read_integer(), 42);
        assert_eq!(input.state(), StreamState::Success);
        assert_eq!(input.read_integer(), 0);
        assert_eq!(input.state(), StreamState::ReadError);
        assert_eq!(input.read_character(), b'n');
        assert_eq!(input.state(), StreamState::Success);
    }

    #[test]
    fn end_of_input_is_reported() {
        let mut input = reader("  7\n");
        assert_eq!(input.read_integer(), 7);
        assert_eq!(input.read_integer(), 0);
        assert_eq!(input.state(), StreamState::EndOfInput);
        assert_eq!(input.state().code(), 2);
    }

    #[test]
    fn signed_integers_and_overflow() {
        let mut input = reader("-12 +3 99999999999");
        assert_eq!(input.read_integer(), -12);
        assert_eq!(input.read_integer(), 3);
        assert_eq!(input.read_integer(), 0);
        assert_eq!(input.state(), StreamState::ReadError);
    }

    #[test]
    fn reals_follow_the_literal_grammar() {
        let mut input = reader("3.5 -2e3 .5 7. 1e");
        assert_eq!(input.read_real(), 3.5);
        assert_eq!(input.read_real(), -2000.0);
        assert_eq!(input.read_real(), 0.5);
        assert_eq!(input.read_real(), 7.0);
        assert_eq!(input.read_real(), 0.0);
        assert_eq!(input.state(), StreamState::ReadError);
        assert!(!is_real_literal(b"."));
        assert!(!is_real_literal(b"e5"));
        assert!(!is_real_literal(b"inf"));
        assert!(is_real_literal(b"1E+2"));
    }

    #[test]
    fn booleans_are_t_and_f() {
        let mut input = reader("T F X");
        assert!(input.read_boolean());
        assert!(!input.read_boolean());
        assert_eq!(input.state(), StreamState::Success);
        assert!(!input.read_boolean());
        assert_eq!(input.state(), StreamState::ReadError);
    }

    #[test]
    fn characters_include_whitespace() {
        let mut input = reader("a b");
        assert_eq!(input.read_character(), b'a');
        assert_eq!(input.read_character(), b' ');
        assert_eq!(input.read_character(), b'b');
        assert_eq!(input.read_character(), 0);
        assert_eq!(input.state(), StreamState::EndOfInput);
    }

    #[test]
    fn small_buffer_wraps_around() {
        let mut input = Reader::new(Cursor::new(b"12 34 56 78".to_vec()), 4);
        let values: Vec<i32> = (0..4).map(|_| input.read_integer()).collect();
        assert_eq!(values, vec![12, 34, 56, 78]);
        assert_eq!(input.state(), StreamState::Success);
    }

    #[test]
    fn oversized_token_is_a_read_error() {
        let mut input = Reader::new(Cursor::new(b"123456 7".to_vec()), 4);
        assert_eq!(input.read_integer(), 0);
        assert_eq!(input.state(), StreamState::ReadError);
        assert_eq!(input.read_character(), b'1');
    }

    #[test]
    fn token_filling_the_buffer_is_read() {
        let mut input = Reader::new(Cursor::new(b"1234".to_vec()), 4);
        assert_eq!(input.read_integer(), 1234);
        assert_eq!(input.state(), StreamState::Success);
        assert_eq!(input.read_integer(), 0);
        assert_eq!(input.state(), StreamState::EndOfInput);

        let mut input = Reader::new(Cursor::new(b"5678 9".to_vec()), 4);
        assert_eq!(input.read_integer(), 5678);
        assert_eq!(input.read_character(), b' ');
        assert_eq!(input.read_integer(), 9);
        assert_eq!(input.state(), StreamState::Success);
    }

    #[test]
    fn capacity_has_a_floor() {
        let input = Reader::new(Cursor::new(Vec::new()), 0);
        assert_eq!(input.capacity(), 2);
    }
}
