//! Request decoding.

use crate::error::ProtocolError;
use crate::storage::valid_key;

/// A decoded put line: `<key> <count> <time>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    /// Series key
    pub key: String,
    /// Count to accumulate
    pub count: u64,
    /// Wall-clock time of the point
    pub time: u64,
}

impl PutRequest {
    /// Decode one ingest line. Fields are separated by ASCII whitespace.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let line = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
        let mut fields = line.split_ascii_whitespace();

        let key = fields.next().ok_or(ProtocolError::MissingField("key"))?;
        if !valid_key(key) {
            return Err(ProtocolError::InvalidKey(key.to_string()));
        }
        let count = parse_u64(fields.next().ok_or(ProtocolError::MissingField("count"))?, false)?;
        let time = parse_u64(fields.next().ok_or(ProtocolError::MissingField("time"))?, true)?;
        if fields.next().is_some() {
            return Err(ProtocolError::TrailingFields);
        }

        Ok(PutRequest { key: key.to_string(), count, time })
    }
}

/// A decoded query line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// `get <key> <time> [hint]`
    Get {
        /// Series key
        key: String,
        /// Query time
        time: u64,
        /// Anchor cursor from a previous response
        hint: usize,
    },
    /// `diff <key> <from> <to> [hint]`
    Diff {
        /// Series key
        key: String,
        /// Window start
        from: u64,
        /// Window end
        to: u64,
        /// Anchor cursor from a previous response
        hint: usize,
    },
    /// `summary <key>`
    Summary {
        /// Series key
        key: String,
    },
}

impl QueryRequest {
    /// Decode one query line. The verb is case-insensitive.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let line = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
        let mut fields = line.split_ascii_whitespace();

        let verb = fields.next().ok_or(ProtocolError::MissingField("command"))?;
        let key = fields.next().ok_or(ProtocolError::MissingField("key"))?;
        if !valid_key(key) {
            return Err(ProtocolError::InvalidKey(key.to_string()));
        }
        let key = key.to_string();

        let request = if verb.eq_ignore_ascii_case("get") {
            let time = parse_u64(fields.next().ok_or(ProtocolError::MissingField("time"))?, true)?;
            let hint = parse_hint(fields.next())?;
            QueryRequest::Get { key, time, hint }
        } else if verb.eq_ignore_ascii_case("diff") {
            let from = parse_u64(fields.next().ok_or(ProtocolError::MissingField("from"))?, true)?;
            let to = parse_u64(fields.next().ok_or(ProtocolError::MissingField("to"))?, true)?;
            let hint = parse_hint(fields.next())?;
            QueryRequest::Diff { key, from, to, hint }
        } else if verb.eq_ignore_ascii_case("summary") {
            QueryRequest::Summary { key }
        } else {
            return Err(ProtocolError::UnknownCommand(verb.to_string()));
        };

        if fields.next().is_some() {
            return Err(ProtocolError::TrailingFields);
        }
        Ok(request)
    }
}

fn parse_u64(field: &str, is_time: bool) -> Result<u64, ProtocolError> {
    field.parse().map_err(|_| {
        if is_time {
            ProtocolError::InvalidTime(field.to_string())
        } else {
            ProtocolError::InvalidCount(field.to_string())
        }
    })
}

fn parse_hint(field: Option<&str>) -> Result<usize, ProtocolError> {
    match field {
        Some(raw) => raw.parse().map_err(|_| ProtocolError::InvalidHint(raw.to_string())),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_line() {
        let req = PutRequest::parse(b"cpu:web-01 5 1700000000").unwrap();
        assert_eq!(req, PutRequest { key: "cpu:web-01".to_string(), count: 5, time: 1_700_000_000 });
    }

    #[test]
    fn test_put_line_extra_whitespace() {
        let req = PutRequest::parse(b"  cpu   5   100  ").unwrap();
        assert_eq!(req.key, "cpu");
    }

    #[test]
    fn test_put_line_errors() {
        assert!(matches!(
            PutRequest::parse(b""),
            Err(ProtocolError::MissingField("key"))
        ));
        assert!(matches!(
            PutRequest::parse(b"cpu"),
            Err(ProtocolError::MissingField("count"))
        ));
        assert!(matches!(
            PutRequest::parse(b"cpu five 100"),
            Err(ProtocolError::InvalidCount(_))
        ));
        assert!(matches!(
            PutRequest::parse(b"cpu 5 100 extra"),
            Err(ProtocolError::TrailingFields)
        ));
        assert!(matches!(
            PutRequest::parse(b"../evil 5 100"),
            Err(ProtocolError::InvalidKey(_))
        ));
        assert!(matches!(
            PutRequest::parse(&[0xff, b' ', b'5', b' ', b'1'][..]),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_query_get() {
        let req = QueryRequest::parse(b"get cpu 100").unwrap();
        assert_eq!(req, QueryRequest::Get { key: "cpu".to_string(), time: 100, hint: 0 });

        let req = QueryRequest::parse(b"GET cpu 100 3").unwrap();
        assert_eq!(req, QueryRequest::Get { key: "cpu".to_string(), time: 100, hint: 3 });
    }

    #[test]
    fn test_query_diff() {
        let req = QueryRequest::parse(b"diff cpu 100 200").unwrap();
        assert_eq!(
            req,
            QueryRequest::Diff { key: "cpu".to_string(), from: 100, to: 200, hint: 0 }
        );
    }

    #[test]
    fn test_query_summary() {
        let req = QueryRequest::parse(b"summary cpu").unwrap();
        assert_eq!(req, QueryRequest::Summary { key: "cpu".to_string() });
    }

    #[test]
    fn test_query_errors() {
        assert!(matches!(
            QueryRequest::parse(b"frobnicate cpu"),
            Err(ProtocolError::UnknownCommand(_))
        ));
        assert!(matches!(
            QueryRequest::parse(b"get cpu"),
            Err(ProtocolError::MissingField("time"))
        ));
        assert!(matches!(
            QueryRequest::parse(b"diff cpu 100 200 0 9"),
            Err(ProtocolError::TrailingFields)
        ));
        assert!(matches!(
            QueryRequest::parse(b"get cpu 100 minus-one"),
            Err(ProtocolError::InvalidHint(_))
        ));
    }
}
