//! Health-probe messages, built and checked with `hickory-proto`.

use bypass_dns_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

pub struct MessageBuilder;

impl MessageBuilder {
    /// `. IN NS` with a random ID, the query every upstream can answer.
    pub fn build_probe(recursion_desired: bool) -> Result<Vec<u8>, DomainError> {
        let mut query = Query::new();
        query.set_name(Name::root());
        query.set_query_type(RecordType::NS);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
        message.set_recursion_desired(recursion_desired);
        message.add_query(query);

        Self::serialize_message(&message)
    }

    fn serialize_message(message: &Message) -> Result<Vec<u8>, DomainError> {
        let mut buffer = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buffer);
        message.emit(&mut encoder).map_err(|e| {
            DomainError::InvalidDnsMessage(format!("Failed to serialize DNS message: {}", e))
        })?;
        Ok(buffer)
    }

    /// A probe succeeds on any well-formed reply, whatever its rcode.
    pub fn is_well_formed_reply(bytes: &[u8]) -> bool {
        Message::from_vec(bytes)
            .map(|m| m.message_type() == MessageType::Response)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::wire;

    #[test]
    fn probe_asks_root_ns() {
        let bytes = MessageBuilder::build_probe(true).unwrap();
        let question = wire::parse_question(&bytes).unwrap();
        assert_eq!(question.name, ".");
        assert_eq!(question.qtype, 2);
        assert_eq!(question.qclass, 1);
        assert_eq!(bytes[2] & 0x01, 0x01);
    }

    #[test]
    fn probe_without_rd() {
        let bytes = MessageBuilder::build_probe(false).unwrap();
        assert_eq!(bytes[2] & 0x01, 0);
    }

    #[test]
    fn query_is_not_a_well_formed_reply() {
        let bytes = MessageBuilder::build_probe(true).unwrap();
        assert!(!MessageBuilder::is_well_formed_reply(&bytes));
        let mut reply = bytes.clone();
        reply[2] |= 0x80;
        reply[3] |= 0x05;
        assert!(MessageBuilder::is_well_formed_reply(&reply));
        assert!(!MessageBuilder::is_well_formed_reply(&bytes[..5]));
    }
}
