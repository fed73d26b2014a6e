//! LDAP message framing on top of the `ldap3_proto` codec.
//!
//! Requests `ldap3_proto` can not decode are still framed and reported with their message ID and
//! protocol op, so the session can answer them instead of dropping the connection. Compare
//! requests are decoded here.

use std::io;

use lber::common::TagClass;
use lber::parse::Parser;
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Integer, Sequence, Tag};
use lber::universal::Types;
use lber::{Consumer, ConsumerState, Input, Move};
use ldap3_proto::proto::{LdapMsg, LdapResult};
use ldap3_proto::{LdapCodec, LdapResultCode, ServerOps};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

pub const BIND_REQUEST: u64 = 0;
pub const ABANDON_REQUEST: u64 = 16;
pub const COMPARE_REQUEST: u64 = 14;
pub const COMPARE_RESPONSE: u64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    pub msgid: i32,
    pub dn: String,
    pub atype: String,
    pub val: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Operation(ServerOps),
    Compare(CompareRequest),

    /// A well-formed message carrying an operation that is not supported
    Unsupported {
        msgid: i32,
        op: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Message(LdapMsg),

    /// A bare LDAP result sent as the given protocol op
    Result {
        msgid: i32,
        op: u64,
        result: LdapResult,
    },
}

fn ldap_result(code: LdapResultCode, message: impl Into<String>) -> LdapResult {
    return LdapResult {
        code,
        matcheddn: String::new(),
        message: message.into(),
        referral: Vec::new(),
    };
}

impl CompareRequest {
    pub fn gen_result(&self, code: LdapResultCode, message: impl Into<String>) -> Response {
        return Response::Result {
            msgid: self.msgid,
            op: COMPARE_RESPONSE,
            result: ldap_result(code, message),
        };
    }
}

impl Response {
    /// A result answering a request of the given protocol op.
    ///
    /// Returns `None` for ops that have no response.
    pub fn result_for(msgid: i32, request: u64, code: LdapResultCode, message: impl Into<String>) -> Option<Self> {
        let op = match request {
            0 => 1,   // bind
            3 => 5,   // search
            6 => 7,   // modify
            8 => 9,   // add
            10 => 11, // delete
            12 => 13, // modify DN
            14 => 15, // compare
            23 => 24, // extended
            _ => return None,
        };

        return Some(Self::Result {
            msgid,
            op,
            result: ldap_result(code, message),
        });
    }
}

impl From<LdapMsg> for Response {
    fn from(msg: LdapMsg) -> Self {
        return Self::Message(msg);
    }
}

fn integer(bytes: &[u8]) -> Option<i32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    return Some(bytes.iter().fold(sign, |value, b| (value << 8) | i32::from(*b)));
}

fn octet_string(tag: StructureTag) -> Option<String> {
    let bytes = tag.match_class(TagClass::Universal)?
        .match_id(Types::OctetString as u64)?
        .expect_primitive()?;
    return String::from_utf8(bytes).ok();
}

/// Splits an LDAPMessage into its message ID and protocol op
fn envelope(tag: &StructureTag) -> Option<(i32, &StructureTag)> {
    if tag.class != TagClass::Universal || tag.id != Types::Sequence as u64 {
        return None;
    }

    let fields = if let PL::C(fields) = &tag.payload { fields } else {
        return None;
    };

    let msgid = match fields.first()? {
        StructureTag { class: TagClass::Universal, id, payload: PL::P(bytes) } if *id == Types::Integer as u64 => integer(bytes)?,
        _ => return None,
    };

    let op = fields.get(1)?;
    if op.class != TagClass::Application {
        return None;
    }

    return Some((msgid, op));
}

fn compare_request(msgid: i32, op: StructureTag) -> Option<CompareRequest> {
    let mut fields = op.expect_constructed()?.into_iter();
    let dn = octet_string(fields.next()?)?;

    let mut ava = fields.next()?
        .match_class(TagClass::Universal)?
        .match_id(Types::Sequence as u64)?
        .expect_constructed()?
        .into_iter();
    let atype = octet_string(ava.next()?)?;
    let val = octet_string(ava.next()?)?;

    return Some(CompareRequest { msgid, dn, atype, val });
}

fn invalid_data(message: &str) -> io::Error {
    return io::Error::new(io::ErrorKind::InvalidData, message.to_owned());
}

pub struct Codec;

impl Decoder for Codec {
    type Item = Request;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut parser = Parser::new();
        let (size, tag) = match *parser.handle(Input::Element(&buf[..])) {
            ConsumerState::Continue(_) => return Ok(None),
            ConsumerState::Error(_) => return Err(invalid_data("Malformed BER element")),
            ConsumerState::Done(Move::Consume(size), ref tag) => (size, tag.clone()),
            ConsumerState::Done(Move::Await(_), _) => return Ok(None),
            ConsumerState::Done(Move::Seek(_), _) => return Err(invalid_data("Unexpected seek in BER element")),
        };
        let _ = buf.split_to(size);

        let (msgid, op, compare) = {
            let (msgid, op) = envelope(&tag)
                .ok_or_else(|| invalid_data("Malformed LDAP message"))?;
            let compare = if op.id == COMPARE_REQUEST { Some(op.clone()) } else { None };
            (msgid, op.id, compare)
        };

        if let Some(compare) = compare {
            return Ok(Some(compare_request(msgid, compare)
                .map(Request::Compare)
                .unwrap_or(Request::Unsupported { msgid, op })));
        }

        let request = LdapMsg::try_from(tag).ok()
            .and_then(|msg| ServerOps::try_from(msg).ok())
            .map(Request::Operation)
            .unwrap_or(Request::Unsupported { msgid, op });

        return Ok(Some(request));
    }
}

impl Encoder<Response> for Codec {
    type Error = io::Error;

    fn encode(&mut self, response: Response, buf: &mut BytesMut) -> Result<(), Self::Error> {
        return match response {
            Response::Message(msg) => LdapCodec.encode(msg, buf),

            Response::Result { msgid, op, result } => {
                let tag = Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::Integer(Integer {
                            inner: i64::from(msgid),
                            ..Default::default()
                        }),
                        Tag::Sequence(Sequence {
                            class: TagClass::Application,
                            id: op,
                            inner: result.into(),
                        }),
                    ],
                    ..Default::default()
                });

                lber::write::encode_into(buf, tag.into_structure())
            }
        };
    }
}
