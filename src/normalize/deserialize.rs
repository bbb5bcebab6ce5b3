//! Reader for the PHP `serialize()` text format used by the legacy builder.
//!
//! Only null, booleans, integers, floats, strings and arrays are accepted.
//! Objects, custom-serialized classes, enums and back-references are refused
//! outright, which also makes shared or cyclic nodes impossible.

use indexmap::IndexMap;
use winnow::{
    Parser as _,
    error::{ContextError, ErrMode},
    token::{any, take, take_till, take_while},
};

use super::tree::{Scalar, TreeNode};

/// Deepest container nesting accepted, both when parsing and when walking.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unrecognized {
    #[error("payload does not look like serialized data")]
    NotSerialized,
    #[error("malformed serialized data near byte {offset}")]
    Malformed { offset: usize },
    #[error("serialized object refused")]
    OpaqueType,
    #[error("serialized reference refused")]
    Reference,
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("trailing bytes after serialized value")]
    TrailingData,
    #[error("top-level value is a scalar")]
    ScalarRoot,
}

type ParseResult<T> = Result<T, ErrMode<ContextError>>;

#[derive(Default)]
struct State {
    depth: usize,
    refusal: Option<Unrecognized>,
}

impl State {
    fn refuse<T>(&mut self, reason: Unrecognized) -> ParseResult<T> {
        self.refusal = Some(reason);
        Err(ErrMode::Cut(ContextError::new()))
    }
}

fn fail<T>() -> ParseResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn token(input: &mut &[u8]) -> ParseResult<u8> {
    any.parse_next(input)
}

fn expect(input: &mut &[u8], byte: u8) -> ParseResult<u8> {
    if token(input)? == byte { Ok(byte) } else { fail() }
}

fn digits<'i>(input: &mut &'i [u8]) -> ParseResult<&'i [u8]> {
    take_while(1.., |b: u8| b.is_ascii_digit()).parse_next(input)
}

fn bytes<'i>(input: &mut &'i [u8], len: usize) -> ParseResult<&'i [u8]> {
    take(len).parse_next(input)
}

fn till_semicolon<'i>(input: &mut &'i [u8]) -> ParseResult<&'i [u8]> {
    take_till(1.., b';').parse_next(input)
}

/// Text of a numeric scalar, consuming the terminating `;`.
fn number_text<'i>(input: &mut &'i [u8]) -> ParseResult<&'i str> {
    let text = till_semicolon(input)?;
    expect(input, b';')?;
    std::str::from_utf8(text).or_else(|_| fail())
}

fn parse_number<T: std::str::FromStr>(input: &mut &[u8]) -> ParseResult<T> {
    expect(input, b':')?;
    number_text(input)?.parse::<T>().or_else(|_| fail())
}

fn length(input: &mut &[u8]) -> ParseResult<usize> {
    let text = digits(input)?;
    std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or_else(fail, Ok)
}

/// Body of `s:<len>:"<bytes>";` after the tag byte.
fn string_body(input: &mut &[u8]) -> ParseResult<String> {
    expect(input, b':')?;
    let len = length(input)?;
    expect(input, b':')?;
    expect(input, b'"')?;
    let raw = bytes(input, len)?;
    expect(input, b'"')?;
    expect(input, b';')?;
    Ok(String::from_utf8_lossy(raw).into_owned())
}

fn array_key(input: &mut &[u8], state: &mut State) -> ParseResult<String> {
    match token(input)? {
        b'i' => parse_number::<i64>(input).map(|i| i.to_string()),
        b's' => string_body(input),
        b'O' | b'C' | b'E' => state.refuse(Unrecognized::OpaqueType),
        _ => fail(),
    }
}

/// Body of `a:<count>:{...}` after the tag byte.
fn array_body(input: &mut &[u8], state: &mut State) -> ParseResult<TreeNode> {
    expect(input, b':')?;
    let count = length(input)?;
    expect(input, b':')?;
    expect(input, b'{')?;

    state.depth += 1;
    if state.depth > MAX_DEPTH {
        return state.refuse(Unrecognized::TooDeep);
    }
    let mut entries = IndexMap::<String, TreeNode>::with_capacity(count.min(input.len()));
    let mut is_list = count > 0;
    for index in 0..count {
        let key = array_key(input, state)?;
        let node = value(input, state)?;
        is_list &= key == index.to_string();
        entries.insert(key, node);
    }
    state.depth -= 1;

    expect(input, b'}')?;
    // Duplicate keys collapse, so a list must also have kept every entry.
    if is_list && entries.len() == count {
        Ok(TreeNode::Sequence(entries.into_values().collect()))
    } else {
        Ok(TreeNode::Mapping(entries))
    }
}

fn value(input: &mut &[u8], state: &mut State) -> ParseResult<TreeNode> {
    let scalar = match token(input)? {
        b'N' => {
            expect(input, b';')?;
            Scalar::Null
        }
        b'b' => {
            expect(input, b':')?;
            let flag = match token(input)? {
                b'0' => false,
                b'1' => true,
                _ => return fail(),
            };
            expect(input, b';')?;
            Scalar::Bool(flag)
        }
        b'i' => Scalar::Int(parse_number(input)?),
        b'd' => Scalar::Float(parse_number(input)?),
        b's' => Scalar::String(string_body(input)?),
        b'a' => return array_body(input, state),
        b'O' | b'C' | b'E' => return state.refuse(Unrecognized::OpaqueType),
        b'r' | b'R' => return state.refuse(Unrecognized::Reference),
        _ => return fail(),
    };
    Ok(TreeNode::Scalar(scalar))
}

/// Cheap shape test run before a full parse.
pub fn looks_serialized(bytes: &[u8]) -> bool {
    let data = bytes.trim_ascii();
    if data == b"N;" {
        return true;
    }
    let [first, b':', .., second_last, last] = data else {
        return false;
    };
    if !matches!(*last, b';' | b'}') {
        return false;
    }
    match *first {
        b's' => *second_last == b'"',
        b'a' | b'O' | b'C' | b'E' | b'b' | b'i' | b'd' => true,
        _ => false,
    }
}

/// Parse decoded builder data into a tree.
///
/// Succeeds only for a well-formed sequence or mapping at the root; every
/// other input, including a lone scalar, is [`Unrecognized`].
pub fn deserialize(bytes: &[u8]) -> Result<TreeNode, Unrecognized> {
    if !looks_serialized(bytes) {
        return Err(Unrecognized::NotSerialized);
    }
    let start = bytes.trim_ascii();
    let mut input = start;
    let mut state = State::default();
    let root = value(&mut input, &mut state).map_err(|_| {
        state.refusal.take().unwrap_or(Unrecognized::Malformed {
            offset: start.len() - input.len(),
        })
    })?;
    if !input.is_empty() {
        return Err(Unrecognized::TrailingData);
    }
    if !root.is_container() {
        return Err(Unrecognized::ScalarRoot);
    }
    Ok(root)
}
