use nom::branch::alt;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{alpha1, char, digit1, multispace0, none_of, one_of, satisfy};
use nom::combinator::{map, map_res, recognize};
use nom::error::Error;
use nom::IResult;
use nom::multi::{fold_many0, many0_count, many1, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair};

use super::{AttributeName, Ava, DN, RDN};

/// Characters that need escaping anywhere in a value
const SPECIAL: &str = "\"+,;<>\\ #=";

enum Piece {
    Char(char),
    Escaped(u8),
}

fn ws<'a, O>(inner: impl FnMut(&'a str) -> IResult<&'a str, O, Error<&'a str>>) -> impl FnMut(&'a str) -> IResult<&'a str, O, Error<&'a str>> {
    return delimited(multispace0, inner, multispace0);
}

fn hex_byte(i: &str) -> IResult<&str, u8, Error<&str>> {
    return map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
                   |s| u8::from_str_radix(s, 16))(i);
}

/// A backslash followed by a hex pair or by a special character
fn escape(i: &str) -> IResult<&str, u8, Error<&str>> {
    return preceded(char('\\'), alt((
        hex_byte,
        map(one_of(SPECIAL), |c| c as u8),
    )))(i);
}

/// Collects pieces as UTF-8 bytes, dropping unescaped trailing whitespace
fn collect<'a>(parser: impl FnMut(&'a str) -> IResult<&'a str, Piece, Error<&'a str>>,
               trim: bool) -> impl FnMut(&'a str) -> IResult<&'a str, String, Error<&'a str>> {
    let pieces = fold_many0(parser, || (Vec::new(), 0), move |(mut bytes, mut significant): (Vec<u8>, usize), piece| {
        match piece {
            Piece::Char(c) => {
                let mut buffer = [0; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
                if !trim || !c.is_whitespace() {
                    significant = bytes.len();
                }
            }
            Piece::Escaped(b) => {
                bytes.push(b);
                significant = bytes.len();
            }
        }
        return (bytes, significant);
    });

    return map_res(pieces, |(mut bytes, significant)| {
        bytes.truncate(significant);
        return String::from_utf8(bytes);
    });
}

pub fn attribute_name(i: &str) -> IResult<&str, AttributeName, Error<&str>> {
    let descr = recognize(pair(
        alpha1,
        many0_count(satisfy(|c| c.is_ascii_alphanumeric() || c == '-')),
    ));

    let numeric_oid = recognize(separated_list1(char('.'), digit1));

    return map(alt((descr, numeric_oid)),
               |name: &str| AttributeName::from(name.to_owned()))(i);
}

pub fn attribute_value(i: &str) -> IResult<&str, String, Error<&str>> {
    let hex_string = map_res(preceded(char('#'), many1(hex_byte)), String::from_utf8);

    let quoted = delimited(char('"'), collect(alt((
        map(escape, Piece::Escaped),
        map(none_of("\\\""), Piece::Char),
    )), false), char('"'));

    let string = collect(alt((
        map(escape, Piece::Escaped),
        map(none_of(",+;\"\\\0"), Piece::Char),
    )), true);

    return alt((hex_string, quoted, string))(i);
}

pub fn ava(i: &str) -> IResult<&str, Ava, Error<&str>> {
    return map(separated_pair(ws(attribute_name), char('='), ws(attribute_value)),
               |(name, value)| Ava { name, value })(i);
}

pub fn rdn(i: &str) -> IResult<&str, RDN, Error<&str>> {
    return map(separated_list1(char('+'), ava),
               |avas| RDN { avas })(i);
}

pub fn dn(i: &str) -> IResult<&str, DN, Error<&str>> {
    return map(separated_list0(one_of(",;"), rdn),
               |rdns| DN { rdns })(i);
}
