use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use itertools::Itertools;
use nom::combinator::all_consuming;
use nom::error::Error;
use nom::{Finish, IResult};

mod parser;

/// Distinguished name, stored leaf first (`uid=alice` before `dc=com`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DN {
    rdns: Vec<RDN>,
}

/// Relative distinguished name, one or more assertions joined by `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RDN {
    avas: Vec<Ava>,
}

/// Attribute value assertion of an RDN.
///
/// Values compare ASCII case-insensitively.
#[derive(Debug, Clone, Eq)]
pub struct Ava {
    name: AttributeName,
    value: String,
}

/// Attribute type, either a descriptor like `cn` or a numeric OID like `2.5.4.3`.
///
/// Names compare ASCII case-insensitively but keep their spelling for display.
#[derive(Debug, Clone, Eq)]
pub struct AttributeName(Cow<'static, str>);

impl DN {
    pub const ROOT: Self = Self { rdns: Vec::new() };

    pub fn is_root(&self) -> bool {
        return self.rdns.is_empty();
    }

    /// The leftmost RDN, naming the entry itself
    pub fn rdn(&self) -> Option<&RDN> {
        return self.rdns.first();
    }

    /// The DN without its leftmost RDN. The parent of the root is the root.
    pub fn parent(&self) -> Self {
        return Self {
            rdns: self.rdns.get(1..).unwrap_or_default().to_vec(),
        };
    }

    /// Checks if `self` equals `ancestor` or lies below it
    pub fn is_descendant_of(&self, ancestor: &DN) -> bool {
        return self.rdns.ends_with(&ancestor.rdns);
    }
}

impl RDN {
    pub fn iter(&self) -> impl Iterator<Item=&Ava> {
        return self.avas.iter();
    }
}

impl Ava {
    pub fn name(&self) -> &AttributeName {
        return &self.name;
    }

    pub fn value(&self) -> &str {
        return &self.value;
    }
}

impl PartialEq for Ava {
    fn eq(&self, other: &Self) -> bool {
        return self.name == other.name && self.value.eq_ignore_ascii_case(&other.value);
    }
}

impl Hash for Ava {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.value.to_ascii_lowercase().hash(state);
    }
}

impl AttributeName {
    pub const fn from_static(name: &'static str) -> Self {
        return Self(Cow::Borrowed(name));
    }

    pub fn as_str(&self) -> &str {
        return &self.0;
    }
}

impl From<&'static str> for AttributeName {
    fn from(name: &'static str) -> Self {
        return Self::from_static(name);
    }
}

impl From<String> for AttributeName {
    fn from(name: String) -> Self {
        return Self(Cow::Owned(name));
    }
}

impl PartialEq for AttributeName {
    fn eq(&self, other: &Self) -> bool {
        return self.0.eq_ignore_ascii_case(&other.0);
    }
}

impl PartialEq<str> for AttributeName {
    fn eq(&self, other: &str) -> bool {
        return self.0.eq_ignore_ascii_case(other);
    }
}

impl Hash for AttributeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

fn parse_all<'i, O>(parser: impl FnMut(&'i str) -> IResult<&'i str, O, Error<&'i str>>,
                    s: &'i str) -> Result<O, Error<String>> {
    return all_consuming(parser)(s)
        .finish()
        .map(|(_, value)| value)
        .map_err(|Error { input, code }| Error { input: input.to_owned(), code });
}

impl FromStr for DN {
    type Err = Error<String>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return parse_all(parser::dn, s);
    }
}

impl FromStr for AttributeName {
    type Err = Error<String>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return parse_all(parser::attribute_name, s);
    }
}

impl fmt::Display for DN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.rdns.iter().join(","));
    }
}

impl fmt::Display for RDN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.avas.iter().join("+"));
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.name)?;

        for (i, c) in self.value.char_indices() {
            let leading = i == 0;
            let trailing = i + c.len_utf8() == self.value.len();

            match c {
                '"' | '+' | ',' | ';' | '<' | '>' | '\\' => write!(f, "\\{}", c)?,
                '#' if leading => write!(f, "\\#")?,
                ' ' if leading || trailing => write!(f, "\\ ")?,
                c if c.is_control() => {
                    let mut buffer = [0; 4];
                    for b in c.encode_utf8(&mut buffer).bytes() {
                        write!(f, "\\{:02X}", b)?;
                    }
                }
                c => write!(f, "{}", c)?,
            }
        }

        return Ok(());
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}
