//! Pure functions for parsing inbound DNS datagrams and building outbound
//! replies. No I/O, no state — see RFC 1035 §4.1 for the wire format.

use crate::error::ServerError;
use crate::HEADER_BYTES;

/// `flags` value for an answering reply: QR=1, RA=1.
const FLAGS_ANSWER: u16 = 0x8400;
/// `flags` value for an NXDOMAIN reply: QR=1, RA=1, RCODE=3.
const FLAGS_NXDOMAIN: u16 = 0x8403;
/// Two-byte compression pointer to the first question's name, which always
/// sits at offset 12 (right after the header).
const NAME_POINTER: [u8; 2] = [0xc0, 0x0c];
const TYPE_A: [u8; 2] = [0x00, 0x01];
const CLASS_IN: [u8; 2] = [0x00, 0x01];

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// Reads the 12-byte header and slices out each question record verbatim.
///
/// A question record runs from its first label length byte through the
/// zero-length terminator plus the 4 trailing type/class bytes.
pub fn parse(datagram: &[u8]) -> Result<(u16, Vec<Vec<u8>>), ServerError> {
    if datagram.len() < HEADER_BYTES {
        return Err(ServerError::Malformed(format!(
            "datagram too short for a header: {} bytes",
            datagram.len()
        )));
    }

    let transaction_id = read_u16(datagram, 0);
    let num_queries = read_u16(datagram, 4);
    if num_queries == 0 {
        return Err(ServerError::Malformed("num_queries is zero".to_string()));
    }

    let mut questions = Vec::with_capacity(num_queries as usize);
    let mut offset = HEADER_BYTES;
    for _ in 0..num_queries {
        let payload = &datagram[offset..];
        let terminator = payload.iter().position(|&b| b == 0).ok_or_else(|| {
            ServerError::Malformed("no zero-length label terminator before end of buffer".into())
        })?;
        // inclusive of the terminator, plus the 4-byte type+class trailer
        let record_len = terminator + 1 + 4;
        if record_len > payload.len() {
            return Err(ServerError::Malformed(
                "advertised type/class trailer exceeds buffer".to_string(),
            ));
        }
        questions.push(payload[..record_len].to_vec());
        offset += record_len;
    }

    Ok((transaction_id, questions))
}

/// Decodes the dot-joined domain name from one question record's labels.
pub fn domain_of(question: &[u8]) -> Result<String, ServerError> {
    let mut labels = Vec::new();
    let mut offset = 0usize;
    loop {
        if offset >= question.len() {
            return Err(ServerError::Malformed(
                "truncated label while decoding name".to_string(),
            ));
        }
        let len = question[offset] as usize;
        if len == 0 {
            break;
        }
        if len > 63 {
            return Err(ServerError::Malformed(format!(
                "label length {len} exceeds 63"
            )));
        }
        let start = offset + 1;
        let end = start + len;
        if end > question.len() {
            return Err(ServerError::Malformed(
                "truncated label while decoding name".to_string(),
            ));
        }
        let label = std::str::from_utf8(&question[start..end])
            .map_err(|e| ServerError::Malformed(format!("non-ascii label: {e}")))?;
        labels.push(label);
        offset = end;
    }
    Ok(labels.join("."))
}

/// Builds an outbound reply datagram. `answer` is the 4-byte IPv4 address
/// to answer with, if any; its absence produces an NXDOMAIN reply.
pub fn build_reply(transaction_id: u16, questions: &[Vec<u8>], answer: Option<[u8; 4]>) -> Vec<u8> {
    build_reply_with_ttl(transaction_id, questions, answer, crate::DEFAULT_TTL)
}

/// As [`build_reply`] but with an explicit TTL for the answer record.
pub fn build_reply_with_ttl(
    transaction_id: u16,
    questions: &[Vec<u8>],
    answer: Option<[u8; 4]>,
    ttl: u32,
) -> Vec<u8> {
    let flags = if answer.is_some() {
        FLAGS_ANSWER
    } else {
        FLAGS_NXDOMAIN
    };
    let ancount: u16 = if answer.is_some() { 1 } else { 0 };

    let mut out = Vec::new();
    out.extend(transaction_id.to_be_bytes());
    out.extend(flags.to_be_bytes());
    out.extend((questions.len() as u16).to_be_bytes());
    out.extend(ancount.to_be_bytes());
    out.extend(0u16.to_be_bytes()); // nscount
    out.extend(0u16.to_be_bytes()); // arcount

    for question in questions {
        out.extend(question);
    }

    if let Some(address) = answer {
        out.extend(NAME_POINTER);
        out.extend(TYPE_A);
        out.extend(CLASS_IN);
        out.extend(ttl.to_be_bytes());
        out.extend(4u16.to_be_bytes()); // rdlength
        out.extend(address);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_bytes(name: &str) -> Vec<u8> {
        let mut q = Vec::new();
        for label in name.split('.') {
            q.push(label.len() as u8);
            q.extend(label.as_bytes());
        }
        q.push(0);
        q.extend(TYPE_A);
        q.extend(CLASS_IN);
        q
    }

    fn datagram(transaction_id: u16, question: &[u8]) -> Vec<u8> {
        let mut d = Vec::new();
        d.extend(transaction_id.to_be_bytes());
        d.extend(0u16.to_be_bytes());
        d.extend(1u16.to_be_bytes());
        d.extend([0u8; 6]);
        d.extend(question);
        d
    }

    #[test]
    fn parse_rejects_short_datagram() {
        let err = parse(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, ServerError::Malformed(_)));
    }

    #[test]
    fn parse_rejects_zero_queries() {
        let mut d = vec![0xab, 0xcd, 0x01, 0x00];
        d.extend(0u16.to_be_bytes());
        d.extend([0u8; 6]);
        let err = parse(&d).unwrap_err();
        assert!(matches!(err, ServerError::Malformed(_)));
    }

    #[test]
    fn codec_round_trip_nxdomain() {
        let q = question_bytes("example.com");
        let d = datagram(0xabcd, &q);

        let (transaction_id, questions) = parse(&d).unwrap();
        assert_eq!(transaction_id, 0xabcd);
        assert_eq!(questions.len(), 1);
        assert_eq!(domain_of(&questions[0]).unwrap(), "example.com");

        let reply = build_reply(transaction_id, &questions, None);
        let (reply_id, _) = parse(&reply).unwrap();
        assert_eq!(reply_id, 0xabcd);
        assert_eq!(read_u16(&reply, 2), FLAGS_NXDOMAIN);
    }

    #[test]
    fn answer_shape_matches_spec() {
        let q = question_bytes("example.com");
        let d = datagram(0x1234, &q);
        let (transaction_id, questions) = parse(&d).unwrap();

        let address = [0x5d, 0xb8, 0xd8, 0x22];
        let reply = build_reply(transaction_id, &questions, Some(address));

        let expected_len = HEADER_BYTES + questions[0].len() + 16;
        assert_eq!(reply.len(), expected_len);
        assert_eq!(&reply[reply.len() - 4..], &address);
    }

    #[test]
    fn s1_hit_literal_bytes() {
        let inbound: Vec<u8> = vec![
            0xab, 0xcd, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e',
            b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00,
            0x01,
        ];
        let (transaction_id, questions) = parse(&inbound).unwrap();
        assert_eq!(domain_of(&questions[0]).unwrap(), "example.com");

        let reply = build_reply(transaction_id, &questions, Some([0x5d, 0xb8, 0xd8, 0x22]));
        let mut expected = vec![0xab, 0xcd, 0x84, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        expected.extend(&questions[0]);
        expected.extend([
            0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x80, 0x00, 0x04, 0x5d, 0xb8,
            0xd8, 0x22,
        ]);
        assert_eq!(reply, expected);
    }

    #[test]
    fn s3_undotted_miss_is_nxdomain() {
        let q = question_bytes("localhost");
        let d = datagram(0x0102, &q);
        let (transaction_id, questions) = parse(&d).unwrap();
        assert!(!domain_of(&questions[0]).unwrap().contains('.'));

        let reply = build_reply(transaction_id, &questions, None);
        assert_eq!(read_u16(&reply, 2), FLAGS_NXDOMAIN);
        assert_eq!(read_u16(&reply, 4), 1); // qdcount
        assert_eq!(read_u16(&reply, 6), 0); // ancount
    }

    #[test]
    fn domain_of_rejects_overlong_label() {
        let mut q = vec![64u8];
        q.extend(std::iter::repeat(b'a').take(64));
        q.push(0);
        let err = domain_of(&q).unwrap_err();
        assert!(matches!(err, ServerError::Malformed(_)));
    }
}
