//! Wire format of the three RPC envelopes.
//!
//! Requests are form-encoded: the serialized envelope goes under `f.req` and
//! the session token under `at`. Every response body starts with a 4-byte
//! anti-hijacking preamble that is stripped before JSON parsing.

use crate::consts::{BATCH_RESPONSE_TAG, RESPONSE_PREAMBLE_LEN};
use crate::errors::{APIError, Result};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Removes the fixed-width preamble from a response body.
///
/// # Errors
///
/// Returns [`APIError::MalformedResponse`] if the body is shorter than the preamble.
pub fn strip_preamble(body: &str) -> Result<&str> {
    body.get(RESPONSE_PREAMBLE_LEN..)
        .ok_or_else(|| APIError::malformed("response is shorter than the preamble"))
}

fn parse_body(body: &str) -> Result<Value> {
    let json = strip_preamble(body)?;
    serde_json::from_str(json).map_err(|e| APIError::malformed(format!("{e}: {json}")))
}

fn keyed_args(opcode: u32, args: Value) -> Value {
    let mut keyed = Map::new();
    keyed.insert(opcode.to_string(), args);
    Value::Object(keyed)
}

/// `[[[opcode, [{"<opcode>": args}], null, null, 0]]]`
#[must_use]
pub fn encode_data_query(opcode: u32, args: Value) -> String {
    json!([[[opcode, [keyed_args(opcode, args)], null, null, 0]]]).to_string()
}

/// Returns `[0][2]["<opcode>"]` of a data query response.
///
/// # Errors
///
/// Returns [`APIError::MalformedResponse`] if the body does not have that shape.
pub fn decode_data_response(body: &str, opcode: u32) -> Result<Value> {
    let mut value = parse_body(body)?;
    value
        .get_mut(0)
        .and_then(|v| v.get_mut(2))
        .and_then(|v| v.get_mut(opcode.to_string()))
        .map(Value::take)
        .ok_or_else(|| APIError::malformed(format!("data response has no result for {opcode}")))
}

/// `["af.maf", [["af.add", opcode, [{"<opcode>": args}]]]]`
#[must_use]
pub fn encode_mutate_query(opcode: u32, args: Value) -> String {
    json!(["af.maf", [["af.add", opcode, [keyed_args(opcode, args)]]]]).to_string()
}

/// Returns `[0][1]["<opcode>"]` of a mutate query response.
///
/// # Errors
///
/// Returns [`APIError::MalformedResponse`] if the body does not have that shape.
pub fn decode_mutate_response(body: &str, opcode: u32) -> Result<Value> {
    let mut value = parse_body(body)?;
    value
        .get_mut(0)
        .and_then(|v| v.get_mut(1))
        .and_then(|v| v.get_mut(opcode.to_string()))
        .map(Value::take)
        .ok_or_else(|| APIError::malformed(format!("mutate response has no result for {opcode}")))
}

/// Each call becomes `[key, JSON(args), null, null]`; the list is wrapped once
/// more and serialized as a whole.
#[must_use]
pub fn encode_batch<'a>(calls: impl IntoIterator<Item = (&'a str, &'a Value)>) -> String {
    let entries: Vec<Value> = calls
        .into_iter()
        .map(|(key, args)| json!([key, args.to_string(), null, null]))
        .collect();
    json!([entries]).to_string()
}

/// Keys every `wrb.fr` frame of a batch response by its RPC key and parses its
/// embedded JSON payload. Frames without a payload map to `null`.
///
/// # Errors
///
/// Returns [`APIError::BatchExecute`] if any frame carries an error array in
/// its second-to-last slot, or [`APIError::MalformedResponse`] if the body or a
/// payload cannot be parsed.
pub fn decode_batch(body: &str) -> Result<HashMap<String, Value>> {
    let value = parse_body(body)?;
    let frames = value
        .as_array()
        .ok_or_else(|| APIError::malformed("batch response is not an array"))?
        .iter()
        .filter_map(Value::as_array)
        .filter(|frame| frame.first().and_then(Value::as_str) == Some(BATCH_RESPONSE_TAG));

    let mut results = HashMap::new();
    for frame in frames {
        let key = frame
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| APIError::malformed("batch frame has no key"))?;

        if let Some(error) = frame
            .len()
            .checked_sub(2)
            .and_then(|i| frame.get(i))
            .and_then(Value::as_array)
        {
            return Err(APIError::BatchExecute {
                code: error.first().and_then(Value::as_i64).unwrap_or_default(),
                key: key.to_owned(),
            });
        }

        let payload = match frame.get(2) {
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| APIError::malformed(format!("payload of {key}: {e}")))?,
            _ => Value::Null,
        };
        results.insert(key.to_owned(), payload);
    }

    Ok(results)
}
