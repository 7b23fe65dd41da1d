// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The dot-and-bracket path language: reading (`get`) and writing (`set`)
//! into arbitrary JSON values using dot-separated segments with optional
//! multi-index / slice subscription.
//!

use crate::error::{Error, Result};
use serde_json::Value as Json;
use tracing::debug;

/// One subscription item inside a bracket group.
#[derive(Debug, Clone, PartialEq)]
enum Sub {
    Index(i64),
    Slice(Option<i64>, Option<i64>, Option<i64>),
}

/// One dot-separated segment of a path specifier, with its optional bracket
/// subscription.
#[derive(Debug, Clone)]
struct Segment {
    key: String,
    subs: Vec<Sub>,
}

/// Get a value out of `obj` addressed by `spec`. Always succeeds in
/// returning a JSON array of the flattened leaves unless `spec` ends with
/// `.$val`, in which case exactly one leaf is required and returned bare.
pub fn get(obj: &Json, spec: &str) -> Result<Json> {
    let mut segments = split_segments(spec)?;
    let value_parse = strip_val_terminator(&mut segments);
    let raw = get_recursive(obj, &segments)?;
    let mut flat = Vec::new();
    flatten_into(raw, &mut flat);
    if value_parse {
        if flat.len() != 1 {
            return Err(Error::DotNotation(
                format!(
                    "`.$val` requires exactly one scalar result, got {}.",
                    flat.len()
                )
                .into(),
            ));
        }
        Ok(flat.into_iter().next().unwrap())
    } else {
        Ok(Json::Array(flat))
    }
}

/// Set a value into a deep copy of `obj` addressed by `spec`, returning the
/// new root. `obj` is never mutated.
pub fn set(obj: &Json, spec: &str, value: &Json) -> Result<Json> {
    let segments = split_segments(spec)?;
    for seg in &segments {
        if seg.subs.len() > 1 {
            return Err(Error::Subscription(
                "set does not support comma-separated multi-subscription; use a single index or slice.".into(),
            ));
        }
    }
    let mut root = obj.clone();
    set_recursive(&mut root, &segments, value)?;
    Ok(root)
}

fn strip_val_terminator(segments: &mut Vec<Segment>) -> bool {
    if let Some(last) = segments.last() {
        if last.key == "$val" && last.subs.is_empty() {
            segments.pop();
            return true;
        }
    }
    false
}

fn split_segments(spec: &str) -> Result<Vec<Segment>> {
    if spec.is_empty() {
        return Err(Error::DotNotation("dot specifier cannot be empty.".into()));
    }
    let raw_segments = split_unescaped_dots(spec);
    let mut segments = Vec::with_capacity(raw_segments.len());
    for raw in raw_segments {
        segments.push(parse_segment(&raw)?);
    }
    Ok(segments)
}

/// Split on unescaped dots, then unescape `\.` into a literal `.` in each
/// piece.
fn split_unescaped_dots(spec: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                current.push(next);
                chars.next();
                continue;
            }
            current.push(c);
        } else if c == '.' {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    pieces.push(current);
    pieces
}

/// Split one segment into its key part and bracket subscription, if any.
fn parse_segment(raw: &str) -> Result<Segment> {
    match find_trailing_bracket(raw) {
        Some((key_part, inner)) => {
            let subs = inner
                .split(',')
                .map(|item| parse_sub(item.trim()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Segment {
                key: key_part.trim().to_owned(),
                subs,
            })
        }
        None => Ok(Segment {
            key: raw.to_owned(),
            subs: Vec::new(),
        }),
    }
}

/// Locate a trailing, unescaped `[...]` bracket group whose interior is
/// restricted to digits, `-`, `:`, `,` and whitespace, and return the key
/// part preceding it plus the bracket's interior.
fn find_trailing_bracket(seg: &str) -> Option<(&str, &str)> {
    let chars: Vec<(usize, char)> = seg.char_indices().collect();
    let n = chars.len();
    let mut end = n;
    while end > 0 && chars[end - 1].1.is_whitespace() {
        end -= 1;
    }
    if end == 0 || chars[end - 1].1 != ']' {
        return None;
    }
    if end >= 2 && chars[end - 2].1 == '\\' {
        return None;
    }
    let close_byte = chars[end - 1].0;
    let mut i = end - 1;
    while i > 0 {
        i -= 1;
        let (byte_idx, c) = chars[i];
        if c == '[' {
            let escaped = i > 0 && chars[i - 1].1 == '\\';
            if escaped {
                continue;
            }
            let inner = &seg[byte_idx + 1..close_byte];
            if inner
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '-' | ':' | ',' | ' ' | '\t'))
            {
                let key_part = &seg[..byte_idx];
                return Some((key_part, inner));
            }
            return None;
        }
    }
    None
}

fn parse_sub(s: &str) -> Result<Sub> {
    if s.is_empty() {
        return Err(Error::Subscription("empty subscription item.".into()));
    }
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        1 => {
            let n: i64 = parts[0]
                .trim()
                .parse()
                .map_err(|_| Error::Subscription(format!("`{s}` is not a valid index.").into()))?;
            Ok(Sub::Index(n))
        }
        2 => Ok(Sub::Slice(
            parse_opt_int(parts[0])?,
            parse_opt_int(parts[1])?,
            None,
        )),
        3 => Ok(Sub::Slice(
            parse_opt_int(parts[0])?,
            parse_opt_int(parts[1])?,
            parse_opt_int(parts[2])?,
        )),
        _ => Err(Error::Subscription(format!("syntax error on statement `{s}`.").into())),
    }
}

fn parse_opt_int(s: &str) -> Result<Option<i64>> {
    let s = s.trim();
    if s.is_empty() {
        Ok(None)
    } else {
        s.parse::<i64>()
            .map(Some)
            .map_err(|_| Error::Subscription(format!("`{s}` is not a valid bound.").into()))
    }
}

/// Flatten nested arrays into a single flat sequence of leaves (one level
/// of nesting recursively flattened to scalars; maps and scalars are
/// leaves).
fn flatten_into(value: Json, out: &mut Vec<Json>) {
    match value {
        Json::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other),
    }
}

fn get_recursive(attribute: &Json, segments: &[Segment]) -> Result<Json> {
    let Some(seg) = segments.first() else {
        return Ok(attribute.clone());
    };
    let rest = &segments[1..];

    if !seg.subs.is_empty() {
        let subscribe_target = if !seg.key.is_empty() {
            descend_by_key(attribute, &seg.key)?
        } else {
            attribute.clone()
        };
        let subscribed = apply_subscriptions(&subscribe_target, &seg.subs)?;
        let mut flat = Vec::new();
        flatten_into(subscribed, &mut flat);
        get_recursive(&Json::Array(flat), rest)
    } else {
        match attribute {
            Json::Object(map) => {
                let next = map.get(&seg.key).cloned().unwrap_or(Json::Null);
                get_recursive(&next, rest)
            }
            Json::Array(items) => {
                let mut all = Vec::with_capacity(items.len());
                for item in items {
                    let next = match item {
                        Json::Object(map) => map.get(&seg.key).cloned().unwrap_or(Json::Null),
                        other => {
                            return Err(Error::DotNotation(
                                format!("cannot access `{}` attribute of {other}.", seg.key).into(),
                            ));
                        }
                    };
                    all.push(get_recursive(&next, rest)?);
                }
                Ok(Json::Array(all))
            }
            other => Err(Error::DotNotation(
                format!("cannot access `{}` attribute of {other}.", seg.key).into(),
            )),
        }
    }
}

/// Handles both the single-mapping and list-of-mappings case for a segment
/// that carries a non-empty key part alongside a bracket.
fn descend_by_key(attribute: &Json, key: &str) -> Result<Json> {
    match attribute {
        Json::Object(map) => Ok(map.get(key).cloned().unwrap_or(Json::Null)),
        Json::Array(items) => {
            let mut all = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::Object(map) => all.push(map.get(key).cloned().unwrap_or(Json::Null)),
        other => {
                        debug!("path miss: `{key}` attribute not present on {other}.");
                        return Err(Error::DotNotation(
                            format!("cannot access `{key}` attribute of {other}.").into(),
                        ));
                    }
                }
            }
            Ok(Json::Array(all))
        }
        other => {
            debug!("path miss: `{key}` attribute not present on {other}.");
            Err(Error::DotNotation(
                format!("cannot access `{key}` attribute of {other}.").into(),
            ))
        }
    }
}

/// Apply every comma-separated subscription item independently to
/// `attribute` and concatenate the results.
fn apply_subscriptions(attribute: &Json, subs: &[Sub]) -> Result<Json> {
    if subs.is_empty() {
        return Ok(attribute.clone());
    }
    let items = match attribute {
        Json::Array(v) => v,
        other => {
            return Err(Error::Subscription(
                format!("{other} is not subscriptable.").into(),
            ));
        }
    };
    let mut results = Vec::new();
    for sub in subs {
        match sub {
            Sub::Index(i) => {
                let idx = normalize_index(*i, items.len())?;
                results.push(items[idx].clone());
            }
            Sub::Slice(a, b, c) => {
                let positions = slice_indices(items.len(), *a, *b, *c);
                results.extend(positions.into_iter().map(|i| items[i].clone()));
            }
        }
    }
    Ok(Json::Array(results))
}

fn normalize_index(i: i64, len: usize) -> Result<usize> {
    let len_i = len as i64;
    let idx = if i < 0 { i + len_i } else { i };
    if idx < 0 || idx >= len_i {
        return Err(Error::Subscription(
            format!("index {i} out of range for length {len}.").into(),
        ));
    }
    Ok(idx as usize)
}

/// Resolve a Python-style slice into a vector of concrete, in-bounds
/// positions, honoring negative indices and negative strides.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Vec<usize> {
    let len_i = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 || len == 0 {
        return Vec::new();
    }
    let clamp = |v: i64, lo: i64, hi: i64| v.clamp(lo, hi);
    let norm = |v: i64| if v < 0 { v + len_i } else { v };

    let (default_start, default_stop) = if step > 0 { (0, len_i) } else { (len_i - 1, -1) };
    let (lo, hi) = if step > 0 { (0, len_i) } else { (-1, len_i - 1) };

    let start = start.map(norm).map(|v| clamp(v, lo, hi)).unwrap_or(default_start);
    let stop = stop.map(norm).map(|v| clamp(v, lo, hi)).unwrap_or(default_stop);

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            if i >= 0 && i < len_i {
                out.push(i as usize);
            }
            i += step;
        }
    } else {
        while i > stop {
            if i >= 0 && i < len_i {
                out.push(i as usize);
            }
            i += step;
        }
    }
    out
}

fn set_recursive(attribute: &mut Json, segments: &[Segment], value: &Json) -> Result<()> {
    let Some(seg) = segments.first() else {
        *attribute = value.clone();
        return Ok(());
    };
    let rest = &segments[1..];

    if !seg.subs.is_empty() {
        if !seg.key.is_empty() {
            let target = entry_mut(attribute, &seg.key)?;
            set_subscription(target, &seg.subs[0], rest, value)
        } else {
            set_subscription(attribute, &seg.subs[0], rest, value)
        }
    } else {
        match attribute {
            Json::Object(map) => {
                if rest.is_empty() {
                    map.insert(seg.key.clone(), value.clone());
                    Ok(())
                } else {
                    let entry = map
                        .entry(seg.key.clone())
                        .or_insert(Json::Null);
                    set_recursive(entry, rest, value)
                }
            }
            Json::Array(items) => {
                for item in items.iter_mut() {
                    set_recursive(item, segments, value)?;
                }
                Ok(())
            }
            other => Err(Error::DotNotation(
                format!("cannot set `{}` attribute of {other}.", seg.key).into(),
            )),
        }
    }
}

fn entry_mut<'a>(attribute: &'a mut Json, key: &str) -> Result<&'a mut Json> {
    match attribute {
        Json::Object(map) => Ok(map.entry(key.to_owned()).or_insert(Json::Null)),
        other => Err(Error::DotNotation(
            format!("cannot set `{key}` attribute of {other}.").into(),
        )),
    }
}

fn set_subscription(attribute: &mut Json, sub: &Sub, rest: &[Segment], value: &Json) -> Result<()> {
    let items = match attribute {
        Json::Array(v) => v,
        other => {
            return Err(Error::Subscription(
                format!("{other} is not subscriptable.").into(),
            ));
        }
    };
    match sub {
        Sub::Index(i) => {
            let idx = normalize_index(*i, items.len())?;
            if !rest.is_empty() {
                set_recursive(&mut items[idx], rest, value)
            } else {
                items[idx] = value.clone();
                Ok(())
            }
        }
        Sub::Slice(a, b, c) => {
            let positions = slice_indices(items.len(), *a, *b, *c);
            if !rest.is_empty() {
                for &pos in &positions {
                    set_recursive(&mut items[pos], rest, value)?;
                }
                return Ok(());
            }
            match value {
                Json::Array(new_items) if c.is_none() => {
                    // contiguous (step-1) slice: splice in a differently
                    // sized replacement, mirroring Python slice assignment.
                    if positions.is_empty() {
                        let insert_at = if a.map(|v| v < 0).unwrap_or(false) {
                            items.len()
                        } else {
                            0
                        };
                        items.splice(insert_at..insert_at, new_items.iter().cloned());
                    } else {
                        let lo = *positions.first().unwrap();
                        let hi = *positions.last().unwrap() + 1;
                        items.splice(lo..hi, new_items.iter().cloned());
                    }
                    Ok(())
                }
                Json::Array(new_items) => {
                    if new_items.len() != positions.len() {
                        return Err(Error::Subscription(
                            "extended slice assignment requires matching lengths.".into(),
                        ));
                    }
                    for (pos, v) in positions.iter().zip(new_items.iter()) {
                        items[*pos] = v.clone();
                    }
                    Ok(())
                }
                scalar => {
                    for &pos in &positions {
                        items[pos] = scalar.clone();
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slice_get() {
        let obj = json!({"x": [10, 20, 30, 40]});
        let got = get(&obj, "x[1:3]").unwrap();
        assert_eq!(got, json!([20, 30]));
    }

    #[test]
    fn test_list_lift_get() {
        let obj = json!({"x": [{"k": 1}, {"k": 2}]});
        let got = get(&obj, "x.k").unwrap();
        assert_eq!(got, json!([1, 2]));
    }

    #[test]
    fn test_val_terminator() {
        let obj = json!({"x": [10, 20, 30]});
        let got = get(&obj, "x[0].$val").unwrap();
        assert_eq!(got, json!(10));
    }

    #[test]
    fn test_val_terminator_requires_single_leaf() {
        let obj = json!({"x": [10, 20, 30]});
        assert!(get(&obj, "x.$val").is_err());
    }

    #[test]
    fn test_set_scalar() {
        let obj = json!({"a": 1, "b": 2});
        let got = set(&obj, "a", &json!(99)).unwrap();
        assert_eq!(got, json!({"a": 99, "b": 2}));
        // original untouched
        assert_eq!(obj, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_set_nested() {
        let obj = json!({"a": {"b": 1}});
        let got = set(&obj, "a.b", &json!(42)).unwrap();
        assert_eq!(got, json!({"a": {"b": 42}}));
    }

    #[test]
    fn test_set_index() {
        let obj = json!({"x": [1, 2, 3]});
        let got = set(&obj, "x[1]", &json!(99)).unwrap();
        assert_eq!(got, json!({"x": [1, 99, 3]}));
    }

    #[test]
    fn test_set_slice_broadcast_scalar() {
        let obj = json!({"x": [1, 2, 3, 4]});
        let got = set(&obj, "x[1:3]", &json!(0)).unwrap();
        assert_eq!(got, json!({"x": [1, 0, 0, 4]}));
    }

    #[test]
    fn test_set_comma_rejected() {
        let obj = json!({"x": [1, 2, 3]});
        assert!(set(&obj, "x[0,1]", &json!(9)).is_err());
    }

    #[test]
    fn test_escaped_dot_in_key() {
        let obj = json!({"a.b": 7});
        let got = get(&obj, "a\\.b.$val").unwrap();
        assert_eq!(got, json!(7));
    }

    #[test]
    fn test_comma_subscription_concatenates() {
        let obj = json!({"x": [10, 20, 30, 40]});
        let got = get(&obj, "x[0,2]").unwrap();
        assert_eq!(got, json!([10, 30]));
    }
}
