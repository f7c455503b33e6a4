//! Field paths: locators for a leaf or subtree inside a snapshot.
//!
//! A path is an ordered list of [`Segment`]s. The empty path is the root and
//! displays as `""`; it stands for "the whole snapshot". Paths display in the
//! dotted form (`a.b.1`) and parse from either dotted or bracketed text
//! (`a.b[1]`, `a[1].b`).

use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One step of a [`FieldPath`]: a record key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The index this segment addresses inside a sequence, if any.
    ///
    /// Keys made only of ASCII digits count as indices, so `"a.1"` and
    /// `"a[1]"` address the same slot.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Key(key) if is_digits(key) => key.parse().ok(),
            Segment::Key(_) => None,
        }
    }

    /// The key this segment addresses inside a record.
    pub fn to_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }

    fn from_token(token: String) -> Self {
        if is_digits(&token) {
            if let Ok(index) = token.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(token)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Key(s.to_owned())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Key(s)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// FieldPath
// ---------------------------------------------------------------------------

/// Locator of a leaf or subtree inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// The empty path, addressing the entire snapshot.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut next = self.clone();
        next.push(segment);
        next
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<FieldPath> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// Whether `self` equals `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

impl From<Vec<Segment>> for FieldPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl FromIterator<Segment> for FieldPath {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason| PathError::Parse {
            input: input.to_owned(),
            reason,
        };

        let mut segments = Vec::new();
        let mut token = String::new();
        // `pending_dot`: a separator was read and a segment must follow.
        // `closed`: the previous token was a bracketed index.
        let mut pending_dot = false;
        let mut closed = false;
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !token.is_empty() {
                        segments.push(Segment::from_token(std::mem::take(&mut token)));
                    } else if !closed {
                        return Err(err("empty segment"));
                    }
                    pending_dot = true;
                    closed = false;
                }
                '[' => {
                    if !token.is_empty() {
                        segments.push(Segment::from_token(std::mem::take(&mut token)));
                    } else if pending_dot {
                        return Err(err("empty segment"));
                    }
                    let mut digits = String::new();
                    let mut terminated = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            terminated = true;
                            break;
                        }
                        digits.push(c);
                    }
                    if !terminated {
                        return Err(err("unterminated bracket"));
                    }
                    if !is_digits(&digits) {
                        return Err(err("bracket index must be numeric"));
                    }
                    let index = digits
                        .parse()
                        .map_err(|_| err("bracket index out of range"))?;
                    segments.push(Segment::Index(index));
                    pending_dot = false;
                    closed = true;
                }
                ']' => return Err(err("unbalanced bracket")),
                _ => {
                    if closed {
                        return Err(err("expected separator after bracket"));
                    }
                    token.push(c);
                    pending_dot = false;
                }
            }
        }

        if !token.is_empty() {
            segments.push(Segment::from_token(token));
        } else if pending_dot {
            return Err(err("trailing separator"));
        }

        Ok(Self(segments))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
