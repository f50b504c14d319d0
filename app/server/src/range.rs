//! Index range grammar for account and address selection
//!
//! Accepted forms: a single index (`7`), an inclusive span (`0-5`), or a
//! comma list (`1,3,5`). Whitespace around tokens is ignored.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRange {
    Single(u32),
    Span { start: u32, end: u32 },
    List(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeParseError(pub String);

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid index range: {}", self.0)
    }
}

impl std::error::Error for RangeParseError {}

impl IndexRange {
    pub fn len(&self) -> usize {
        match self {
            IndexRange::Single(_) => 1,
            IndexRange::Span { start, end } => ((*end - *start) as usize).saturating_add(1),
            IndexRange::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_index(token: &str, whole: &str) -> Result<u32, RangeParseError> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeParseError(whole.to_string()));
    }
    token
        .parse::<u32>()
        .map_err(|_| RangeParseError(whole.to_string()))
}

impl FromStr for IndexRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.contains(',') {
            let items = trimmed
                .split(',')
                .map(|t| parse_index(t, trimmed))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(IndexRange::List(items));
        }

        if let Some((start, end)) = trimmed.split_once('-') {
            let start = parse_index(start, trimmed)?;
            let end = parse_index(end, trimmed)?;
            if start > end {
                return Err(RangeParseError(trimmed.to_string()));
            }
            return Ok(IndexRange::Span { start, end });
        }

        parse_index(trimmed, trimmed).map(IndexRange::Single)
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRange::Single(i) => write!(f, "{}", i),
            IndexRange::Span { start, end } => write!(f, "{}-{}", start, end),
            IndexRange::List(items) => {
                let joined: Vec<String> = items.iter().map(u32::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}
