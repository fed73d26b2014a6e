//! Reader for the LDAP Data Interchange Format (RFC 2849).
//!
//! Only content records are supported. A change record is accepted when its change type is `add`,
//! which is equivalent to a content record.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::space0;
use nom::combinator::{map, rest};
use nom::error::Error;
use nom::sequence::{pair, preceded};
use nom::{Finish, IResult};

use crate::ldap::dn::{AttributeName, DN};

use super::entry::Entry;

#[derive(Debug, PartialEq)]
enum Value<'a> {
    Text(&'a str),
    Base64(&'a str),
    Url(&'a str),
}

fn value_spec(i: &str) -> IResult<&str, Value, Error<&str>> {
    return alt((
        map(preceded(pair(tag("::"), space0), rest), Value::Base64),
        map(preceded(pair(tag(":<"), space0), rest), Value::Url),
        map(preceded(pair(tag(":"), space0), rest), Value::Text),
    ))(i);
}

fn attr_val_spec(i: &str) -> IResult<&str, (&str, Value), Error<&str>> {
    return pair(take_till1(|c: char| c == ':'), value_spec)(i);
}

/// A logical line after unfolding, tagged with the physical line it started on
struct Line {
    number: usize,
    text: String,
}

impl Line {
    fn parse(&self) -> Result<(&str, String)> {
        let (_, (name, value)) = attr_val_spec(&self.text)
            .finish()
            .map_err(|_| anyhow!("Line {}: expected '<attribute>: <value>'", self.number))?;

        let value = match value {
            Value::Text(value) => value.to_owned(),

            Value::Base64(value) => {
                let value = STANDARD.decode(value.trim())
                    .with_context(|| format!("Line {}: invalid base64 value", self.number))?;
                String::from_utf8(value)
                    .with_context(|| format!("Line {}: binary values are not supported", self.number))?
            }

            Value::Url(url) => bail!("Line {}: URL values are not supported: {}", self.number, url),
        };

        return Ok((name.trim(), value));
    }
}

/// Splits the input into records of unfolded lines, dropping comments
fn records(input: &str) -> Result<Vec<Vec<Line>>> {
    let mut records = Vec::new();
    let mut current: Vec<Line> = Vec::new();

    for (number, text) in input.lines().enumerate() {
        let number = number + 1;

        if text.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(continuation) = text.strip_prefix(' ') {
            match current.last_mut() {
                Some(line) => line.text.push_str(continuation),
                None => bail!("Line {}: continuation without a preceding line", number),
            }
            continue;
        }

        current.push(Line {
            number,
            text: text.to_owned(),
        });
    }

    if !current.is_empty() {
        records.push(current);
    }

    return Ok(records.into_iter()
        .map(|record| record.into_iter()
            .filter(|line| !line.text.starts_with('#'))
            .collect::<Vec<_>>())
        .filter(|record| !record.is_empty())
        .collect());
}

fn entry(record: &[Line]) -> Result<Entry> {
    let mut lines = record.iter();

    let first = lines.next()
        .ok_or_else(|| anyhow!("Empty record"))?;
    let (name, dn) = first.parse()?;
    if !name.eq_ignore_ascii_case("dn") {
        bail!("Line {}: record must start with 'dn:', found '{}'", first.number, name);
    }

    let dn = DN::from_str(dn.trim())
        .with_context(|| format!("Line {}: invalid DN '{}'", first.number, dn))?;
    if dn.is_root() {
        bail!("Line {}: entries with an empty DN can not be imported", first.number);
    }

    let mut entry = Entry::new(dn);

    for (index, line) in lines.enumerate() {
        let (name, value) = line.parse()?;

        if name.eq_ignore_ascii_case("control") {
            bail!("Line {}: controls are not supported", line.number);
        }

        if name.eq_ignore_ascii_case("changetype") {
            if index != 0 || !value.trim().eq_ignore_ascii_case("add") {
                bail!("Line {}: unsupported change record 'changetype: {}'", line.number, value);
            }
            continue;
        }

        let name = AttributeName::from_str(name)
            .with_context(|| format!("Line {}: invalid attribute name '{}'", line.number, name))?;
        entry.add(name, value);
    }

    return Ok(entry);
}

/// Parses all entries of an LDIF document.
pub fn parse(input: &str) -> Result<Vec<Entry>> {
    let mut records = records(input)?;

    // The version line is only allowed in front of the first record
    if let Some(first) = records.first_mut() {
        if let Some((name, version)) = first.first().map(Line::parse).transpose()? {
            if name.eq_ignore_ascii_case("version") {
                if version.trim() != "1" {
                    bail!("Line {}: unsupported LDIF version {}", first[0].number, version);
                }

                first.remove(0);
                if first.is_empty() {
                    records.remove(0);
                }
            }
        }
    }

    return records.iter()
        .map(|record| entry(record))
        .collect();
}
