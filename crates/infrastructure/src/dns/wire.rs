//! Raw wire-format helpers for the forwarding hot path.
//!
//! Queries and replies are relayed as opaque bytes; only the header and
//! the first question are ever decoded.

use bypass_dns_domain::DomainError;

pub const HEADER_LEN: usize = 12;

const FLAG_QR: u8 = 0x80;
const FLAG_TC: u8 = 0x02;
const FLAG_RD: u8 = 0x01;
const FLAG_RA: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_FORMERR: u8 = 1;
pub const RCODE_SERVFAIL: u8 = 2;

/// The first question of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dot-terminated, case preserved.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    /// Offset just past the question in the original message.
    pub end: usize,
}

#[inline]
pub fn message_id(msg: &[u8]) -> Option<u16> {
    (msg.len() >= 2).then(|| u16::from_be_bytes([msg[0], msg[1]]))
}

#[inline]
pub fn is_response(msg: &[u8]) -> bool {
    msg.len() >= HEADER_LEN && msg[2] & FLAG_QR != 0
}

#[inline]
pub fn is_truncated(msg: &[u8]) -> bool {
    msg.len() >= HEADER_LEN && msg[2] & FLAG_TC != 0
}

#[inline]
pub fn rcode(msg: &[u8]) -> u8 {
    if msg.len() < HEADER_LEN {
        return RCODE_SERVFAIL;
    }
    msg[3] & 0x0F
}

#[inline]
fn qdcount(msg: &[u8]) -> u16 {
    u16::from_be_bytes([msg[4], msg[5]])
}

/// Decodes the first question. Compression pointers are not followed since a
/// first question has nothing earlier to point at.
pub fn parse_question(msg: &[u8]) -> Result<Question, DomainError> {
    if msg.len() < HEADER_LEN {
        return Err(DomainError::InvalidDnsMessage(format!(
            "message too short: {} bytes",
            msg.len()
        )));
    }
    if qdcount(msg) == 0 {
        return Err(DomainError::InvalidDnsMessage(
            "message has no question".to_string(),
        ));
    }

    let mut name = String::new();
    let mut pos = HEADER_LEN;
    loop {
        let len = *msg
            .get(pos)
            .ok_or_else(|| DomainError::InvalidDnsMessage("truncated question name".into()))?
            as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len & 0xC0 != 0 {
            return Err(DomainError::InvalidDnsMessage(
                "unexpected label pointer in question".into(),
            ));
        }
        let label = msg
            .get(pos..pos + len)
            .ok_or_else(|| DomainError::InvalidDnsMessage("truncated question label".into()))?;
        name.push_str(&String::from_utf8_lossy(label));
        name.push('.');
        pos += len;
    }
    if name.is_empty() {
        name.push('.');
    }

    let fixed = msg
        .get(pos..pos + 4)
        .ok_or_else(|| DomainError::InvalidDnsMessage("truncated question".into()))?;
    Ok(Question {
        name,
        qtype: u16::from_be_bytes([fixed[0], fixed[1]]),
        qclass: u16::from_be_bytes([fixed[2], fixed[3]]),
        end: pos + 4,
    })
}

/// True when `reply` answers `question`: response bit set, exactly one
/// question, same name (ignoring case), type and class.
pub fn matches_query(question: &Question, reply: &[u8]) -> bool {
    if !is_response(reply) || qdcount(reply) != 1 {
        return false;
    }
    match parse_question(reply) {
        Ok(q) => {
            q.qtype == question.qtype
                && q.qclass == question.qclass
                && q.name.eq_ignore_ascii_case(&question.name)
        }
        Err(_) => false,
    }
}

/// Builds a reply to `query` carrying only its question and `rcode`.
///
/// Falls back to a bare header when the question cannot be decoded.
pub fn error_response(query: &[u8], rcode: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(query.len().max(HEADER_LEN));
    let id = message_id(query).unwrap_or(0);
    out.extend_from_slice(&id.to_be_bytes());

    let flags_hi = query.get(2).copied().unwrap_or(0);
    out.push(FLAG_QR | (flags_hi & (OPCODE_MASK | FLAG_RD)));
    out.push(FLAG_RA | (rcode & 0x0F));

    match parse_question(query) {
        Ok(q) => {
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&[0; 6]);
            out.extend_from_slice(&query[HEADER_LEN..q.end]);
        }
        Err(_) => out.extend_from_slice(&[0; 8]),
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&id.to_be_bytes());
        msg.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
        for label in name.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&qtype.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg
    }

    fn as_reply(mut msg: Vec<u8>) -> Vec<u8> {
        msg[2] |= FLAG_QR;
        msg
    }

    #[test]
    fn parses_first_question() {
        let query = build_query(0x1234, "WWW.Example.com.", 1);
        let q = parse_question(&query).unwrap();
        assert_eq!(q.name, "WWW.Example.com.");
        assert_eq!(q.qtype, 1);
        assert_eq!(q.qclass, 1);
        assert_eq!(q.end, query.len());
        assert_eq!(message_id(&query), Some(0x1234));
    }

    #[test]
    fn root_question_parses_as_dot() {
        let query = build_query(1, ".", 2);
        assert_eq!(parse_question(&query).unwrap().name, ".");
    }

    #[test]
    fn short_or_truncated_messages_fail() {
        assert!(parse_question(&[0u8; 5]).is_err());
        let query = build_query(1, "example.com.", 1);
        assert!(parse_question(&query[..query.len() - 3]).is_err());
    }

    #[test]
    fn reply_matching_is_case_insensitive() {
        let query = build_query(7, "example.com.", 1);
        let q = parse_question(&query).unwrap();
        assert!(matches_query(&q, &as_reply(build_query(7, "EXAMPLE.com.", 1))));
        assert!(!matches_query(&q, &as_reply(build_query(7, "example.org.", 1))));
        assert!(!matches_query(&q, &as_reply(build_query(7, "example.com.", 28))));
        assert!(!matches_query(&q, &build_query(7, "example.com.", 1)));
    }

    #[test]
    fn error_response_echoes_question() {
        let query = build_query(0xBEEF, "example.com.", 1);
        let reply = error_response(&query, RCODE_SERVFAIL);
        assert_eq!(message_id(&reply), Some(0xBEEF));
        assert!(is_response(&reply));
        assert_eq!(rcode(&reply), RCODE_SERVFAIL);
        assert_eq!(reply[2] & FLAG_RD, FLAG_RD);
        assert_eq!(parse_question(&reply).unwrap().name, "example.com.");
    }

    #[test]
    fn error_response_for_garbage_is_bare_header() {
        let reply = error_response(&[0xAB, 0xCD, 0x00], RCODE_FORMERR);
        assert_eq!(reply.len(), HEADER_LEN);
        assert_eq!(rcode(&reply), RCODE_FORMERR);
        assert_eq!(message_id(&reply), Some(0xABCD));
    }

    #[test]
    fn truncation_flag_is_read() {
        let mut reply = as_reply(build_query(1, "a.com.", 1));
        assert!(!is_truncated(&reply));
        reply[2] |= FLAG_TC;
        assert!(is_truncated(&reply));
    }
}
