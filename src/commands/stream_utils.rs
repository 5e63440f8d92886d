use crate::{
    commands::command_error::CommandError,
    key_value_store::{StreamEntry, StreamId},
    resp::RespValue,
};

/// The error mainstream clients expect for malformed stream ids in query
/// commands.
const INVALID_STREAM_ID: &str = "Invalid stream ID specified as stream command argument";

fn invalid_stream_id() -> CommandError {
    CommandError::InvalidStreamId(INVALID_STREAM_ID.to_string())
}

/// Parses the start bound of a range query: `-` is the smallest possible id,
/// a bare `ms` stands for `ms-0`, and `ms-seq` is taken literally.
pub fn parse_range_start(token: &str) -> Result<StreamId, CommandError> {
    if token == "-" {
        return Ok(StreamId::MIN);
    }

    parse_query_id(token, 0)
}

/// Parses the end bound of a range query: `+` is the largest possible id and
/// a bare `ms` stands for the last entry within that millisecond.
pub fn parse_range_end(token: &str) -> Result<StreamId, CommandError> {
    if token == "+" {
        return Ok(StreamId::MAX);
    }

    parse_query_id(token, u64::MAX)
}

/// Parses `ms` or `ms-seq`, filling a missing sequence with `default_seq`.
pub fn parse_query_id(token: &str, default_seq: u64) -> Result<StreamId, CommandError> {
    if token.contains('-') {
        return token.parse().map_err(|_| invalid_stream_id());
    }

    let ms = token.parse().map_err(|_| invalid_stream_id())?;
    Ok(StreamId::new(ms, default_seq))
}

/// Formats stream entries as the nested reply shape shared by XRANGE and
/// XREAD: each entry is a two-element array of its id and a flat array of
/// field/value strings.
pub fn entries_to_resp<'a, I>(entries: I) -> RespValue
where
    I: IntoIterator<Item = (&'a StreamId, &'a StreamEntry)>,
{
    let encoded_entries = entries
        .into_iter()
        .map(|(id, fields)| {
            let mut flat_fields = Vec::with_capacity(fields.len() * 2);

            for (field, value) in fields {
                flat_fields.push(RespValue::BulkString(field.clone()));
                flat_fields.push(RespValue::BulkString(value.clone()));
            }

            RespValue::Array(vec![
                RespValue::BulkString(id.to_string()),
                RespValue::Array(flat_fields),
            ])
        })
        .collect();

    RespValue::Array(encoded_entries)
}
