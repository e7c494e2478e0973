use std::collections::HashSet;

use crate::error::HeaderError;
use crate::value::{FieldValue, Fields};

/// Terminal literal marking the start of the payload.
pub const PAYLOAD_MARKER: &str = "$";

/// Terminal literal marking a fixed-size header.
pub const FIXED_HEADER_MARKER: &str = "!";

/// Separator between items of `list` and `nums` fields.
pub const LIST_DELIMITER: char = ',';

/// Separator between items of `pairs` and `numPairs` fields.
pub const PAIR_DELIMITER: char = ';';

/// Field type declared in a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Num,
    Bool,
    List,
    Nums,
    Pairs,
    NumPairs,
}

impl FieldKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "num" => Some(Self::Num),
            "bool" => Some(Self::Bool),
            "list" => Some(Self::List),
            "nums" => Some(Self::Nums),
            "pairs" => Some(Self::Pairs),
            "numPairs" => Some(Self::NumPairs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Num => "num",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Nums => "nums",
            Self::Pairs => "pairs",
            Self::NumPairs => "numPairs",
        }
    }
}

/// One placeholder of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Fixed width in characters. For `list`/`nums` this is the width of each item.
    pub width: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Open,
    Payload,
    Fixed,
}

/// A compiled header pattern.
///
/// `literals` always holds one more entry than `fields`: `literals[i]` precedes
/// `fields[i]` and the last literal trails the final field.
#[derive(Debug, Clone)]
pub struct Header {
    pattern: String,
    literals: Vec<String>,
    fields: Vec<FieldSpec>,
    terminator: Terminator,
    fixed_len: Option<usize>,
}

impl Header {
    /// Compile a pattern, failing fast on anything the codec could not round-trip.
    pub fn new(pattern: &str) -> Result<Self, HeaderError> {
        let invalid = |reason: String| HeaderError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut literals = Vec::new();
        let mut fields: Vec<FieldSpec> = Vec::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('<') {
            let close = rest[open..]
                .find('>')
                .map(|i| open + i)
                .ok_or_else(|| invalid("unterminated placeholder".into()))?;
            literals.push(rest[..open].to_string());
            fields.push(parse_placeholder(&rest[open + 1..close]).map_err(invalid)?);
            rest = &rest[close + 1..];
        }
        literals.push(rest.to_string());

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name == "payload" {
                return Err(invalid("\"payload\" is reserved for the trailing payload".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field \"{}\"", field.name)));
            }
        }

        let last = literals.last().map(String::as_str).unwrap_or("");
        let terminator = if fields.is_empty() {
            Terminator::Open
        } else if last == FIXED_HEADER_MARKER {
            Terminator::Fixed
        } else if last == PAYLOAD_MARKER {
            Terminator::Payload
        } else {
            Terminator::Open
        };

        let fixed_len = if terminator == Terminator::Fixed {
            let mut len = literals[0].chars().count();
            for field in &fields {
                let width = field.width.ok_or_else(|| {
                    invalid(format!(
                        "fixed-size header requires a width for field \"{}\"",
                        field.name
                    ))
                })?;
                len += width;
            }
            if literals[1..literals.len() - 1].iter().any(|l| !l.is_empty()) {
                return Err(invalid("fixed-size header allows only a leading literal".into()));
            }
            Some(len)
        } else {
            for (i, literal) in literals.iter().enumerate().take(fields.len()).skip(1) {
                if literal.is_empty() {
                    return Err(invalid(format!(
                        "fields \"{}\" and \"{}\" need a delimiter between them",
                        fields[i - 1].name, fields[i].name
                    )));
                }
            }
            let interior = &literals[..literals.len() - 1];
            if interior.iter().any(|l| l.contains(PAYLOAD_MARKER))
                || (terminator == Terminator::Open && last.contains(PAYLOAD_MARKER))
            {
                return Err(invalid("\"$\" may only terminate the pattern".into()));
            }
            None
        };

        Ok(Self {
            pattern: pattern.to_string(),
            literals,
            fields,
            terminator,
            fixed_len,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Leading literal every encoded header starts with.
    pub fn prefix(&self) -> &str {
        &self.literals[0]
    }

    /// Header length in characters when the pattern ends with `!`.
    pub fn fixed_len(&self) -> Option<usize> {
        self.fixed_len
    }

    pub fn encode(&self, data: &Fields) -> Result<String, HeaderError> {
        let mut out = String::with_capacity(self.pattern.len() + 16);
        out.push_str(&self.literals[0]);

        for (i, spec) in self.fields.iter().enumerate() {
            let value = data.get(&spec.name).ok_or_else(|| HeaderError::MissingField {
                name: spec.name.clone(),
            })?;
            let formatted = format_value(spec, value)?;

            if self.terminator == Terminator::Fixed {
                // `fixed_len` exists only when every field has a width
                let width = spec.width.unwrap_or(0);
                out.push_str(&fit_slot(spec, formatted, width)?);
            } else {
                out.push_str(&formatted);
                out.push_str(&self.literals[i + 1]);
            }
        }

        if let Some(payload) = data.payload() {
            if self.terminator == Terminator::Open {
                out.push_str(PAYLOAD_MARKER);
            }
            out.push_str(payload);
        }

        Ok(out)
    }

    pub fn decode(&self, input: &str) -> Result<Fields, HeaderError> {
        match self.fixed_len {
            Some(len) => self.decode_fixed(input, len),
            None => self.decode_delimited(input),
        }
    }

    fn decode_fixed(&self, input: &str, header_len: usize) -> Result<Fields, HeaderError> {
        let prefix = &self.literals[0];
        let mut rest = input.strip_prefix(prefix.as_str()).ok_or_else(|| {
            HeaderError::PrefixMismatch {
                segment: prefix.clone(),
            }
        })?;

        let mut result = Fields::new();
        for spec in &self.fields {
            let width = spec.width.unwrap_or(0);
            let (raw, tail) = split_chars(rest, width).ok_or_else(|| HeaderError::Truncated {
                expected: header_len,
                actual: input.chars().count(),
            })?;
            result.set(&spec.name, parse_value(spec, raw)?);
            rest = tail;
        }

        result.set_payload(rest);
        Ok(result)
    }

    fn decode_delimited(&self, input: &str) -> Result<Fields, HeaderError> {
        let (head, payload) = match input.find(PAYLOAD_MARKER) {
            Some(at) => (&input[..at], Some(&input[at + PAYLOAD_MARKER.len()..])),
            None => (input, None),
        };

        let mut result = Fields::new();
        let mut remaining = head;

        if self.fields.is_empty() && !remaining.starts_with(self.literals[0].as_str()) {
            return Err(HeaderError::PrefixMismatch {
                segment: self.literals[0].clone(),
            });
        }

        for (i, spec) in self.fields.iter().enumerate() {
            let literal = &self.literals[i];
            let after = remaining.strip_prefix(literal.as_str()).ok_or_else(|| {
                HeaderError::PrefixMismatch {
                    segment: literal.clone(),
                }
            })?;

            let next = &self.literals[i + 1];
            let is_last = i + 1 == self.fields.len();
            let (raw, tail) = if is_last && (self.terminator == Terminator::Payload || next.is_empty()) {
                (after, "")
            } else {
                let end = after.find(next.as_str()).ok_or_else(|| HeaderError::MissingDelimiter {
                    delimiter: next.clone(),
                })?;
                after.split_at(end)
            };

            result.set(&spec.name, parse_value(spec, raw)?);
            remaining = tail;
        }

        if let Some(payload) = payload {
            result.set_payload(payload);
        }
        Ok(result)
    }
}

fn parse_placeholder(body: &str) -> Result<FieldSpec, String> {
    let (name, ty) = match body.split_once(':') {
        Some((name, ty)) => (name, Some(ty)),
        None => (body, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid field name \"{}\"", name));
    }

    let (kind, width) = match ty {
        None => (FieldKind::Text, None),
        Some(ty) => {
            let (base, width) = match ty.split_once('-') {
                Some((base, w)) => {
                    let width: usize = w
                        .parse()
                        .map_err(|_| format!("invalid width \"{}\" for field \"{}\"", w, name))?;
                    if width == 0 {
                        return Err(format!("zero width for field \"{}\"", name));
                    }
                    (base, Some(width))
                }
                None => (ty, None),
            };
            let kind = FieldKind::parse(base)
                .ok_or_else(|| format!("unknown type \"{}\" for field \"{}\"", base, name))?;
            (kind, width)
        }
    };

    Ok(FieldSpec {
        name: name.to_string(),
        kind,
        width,
    })
}

/// Split off the first `n` characters, or `None` if the input is shorter.
fn split_chars(s: &str, n: usize) -> Option<(&str, &str)> {
    if n == 0 {
        return Some(("", s));
    }
    let mut count = 0;
    for (i, c) in s.char_indices() {
        count += 1;
        if count == n {
            let at = i + c.len_utf8();
            return Some(s.split_at(at));
        }
    }
    None
}

fn type_mismatch(spec: &FieldSpec, value: &FieldValue) -> HeaderError {
    HeaderError::TypeMismatch {
        name: spec.name.clone(),
        expected: spec.kind.name(),
        actual: value.kind_name(),
    }
}

fn pad_text(s: &str, width: usize) -> Result<String, HeaderError> {
    let len = s.chars().count();
    if len > width {
        return Err(HeaderError::WidthOverflow {
            value: s.to_string(),
            width,
        });
    }
    let mut out = String::with_capacity(s.len() + width - len);
    out.push_str(s);
    out.extend(std::iter::repeat_n(' ', width - len));
    Ok(out)
}

fn pad_num(n: i64, width: usize) -> Result<String, HeaderError> {
    let plain = n.to_string();
    if plain.len() > width {
        return Err(HeaderError::WidthOverflow { value: plain, width });
    }
    Ok(format!("{:0width$}", n, width = width))
}

fn format_value(spec: &FieldSpec, value: &FieldValue) -> Result<String, HeaderError> {
    match (spec.kind, value) {
        (FieldKind::Text, FieldValue::Text(_) | FieldValue::Num(_) | FieldValue::Bool(_)) => {
            let s = value.to_string();
            match spec.width {
                Some(w) => pad_text(&s, w),
                None => Ok(s),
            }
        }
        (FieldKind::Num, FieldValue::Num(n)) => match spec.width {
            Some(w) => pad_num(*n, w),
            None => Ok(n.to_string()),
        },
        (FieldKind::Bool, FieldValue::Bool(b)) => match spec.width {
            Some(w) => pad_text(&b.to_string(), w),
            None => Ok(b.to_string()),
        },
        (FieldKind::List, FieldValue::List(items)) => match spec.width {
            Some(w) => items.iter().map(|item| pad_text(item, w)).collect(),
            None => Ok(value.to_string()),
        },
        (FieldKind::Nums, FieldValue::Nums(nums)) => match spec.width {
            Some(w) => nums.iter().map(|n| pad_num(*n, w)).collect(),
            None => Ok(value.to_string()),
        },
        (FieldKind::Pairs, FieldValue::Pairs(_)) | (FieldKind::NumPairs, FieldValue::NumPairs(_)) => {
            let s = value.to_string();
            match spec.width {
                Some(w) => pad_text(&s, w),
                None => Ok(s),
            }
        }
        _ => Err(type_mismatch(spec, value)),
    }
}

/// Fit an already formatted value into its fixed-header slot.
fn fit_slot(spec: &FieldSpec, formatted: String, width: usize) -> Result<String, HeaderError> {
    let len = formatted.chars().count();
    if len > width {
        return Err(HeaderError::WidthOverflow {
            value: formatted,
            width,
        });
    }
    if len == 0 && matches!(spec.kind, FieldKind::List | FieldKind::Nums) {
        return Err(HeaderError::EmptyFixedList {
            name: spec.name.clone(),
        });
    }
    if len == width {
        return Ok(formatted);
    }
    // only multi-item lists come out short of their slot
    match spec.kind {
        FieldKind::Nums => Ok(format!("{}{}", "0".repeat(width - len), formatted)),
        _ => pad_text(&formatted, width),
    }
}

fn parse_num(spec: &FieldSpec, raw: &str) -> Result<i64, HeaderError> {
    raw.trim().parse().map_err(|_| HeaderError::InvalidNumber {
        field: spec.name.clone(),
        value: raw.to_string(),
    })
}

/// Cut `raw` into items of exactly `width` characters, dropping a short tail.
fn fixed_items(raw: &str, width: usize) -> Vec<&str> {
    let mut items = Vec::new();
    let mut rest = raw;
    while let Some((item, tail)) = split_chars(rest, width) {
        if item.is_empty() {
            break;
        }
        items.push(item);
        rest = tail;
    }
    items
}

fn parse_value(spec: &FieldSpec, raw: &str) -> Result<FieldValue, HeaderError> {
    let value = match spec.kind {
        FieldKind::Text => match spec.width {
            // oversized input is truncated, never rejected
            Some(w) => {
                let cut = split_chars(raw, w).map(|(head, _)| head).unwrap_or(raw);
                FieldValue::Text(cut.trim_end_matches(' ').to_string())
            }
            None => FieldValue::Text(raw.to_string()),
        },
        FieldKind::Num => FieldValue::Num(parse_num(spec, raw)?),
        FieldKind::Bool => FieldValue::Bool(raw.trim().eq_ignore_ascii_case("true")),
        FieldKind::List => match spec.width {
            Some(w) => FieldValue::List(
                fixed_items(raw, w)
                    .into_iter()
                    .map(|item| item.trim_end_matches(' ').to_string())
                    .collect(),
            ),
            None if raw.is_empty() => FieldValue::List(Vec::new()),
            None => FieldValue::List(raw.split(LIST_DELIMITER).map(str::to_string).collect()),
        },
        FieldKind::Nums => match spec.width {
            Some(w) => FieldValue::Nums(
                fixed_items(raw, w)
                    .into_iter()
                    .map(|item| parse_num(spec, item))
                    .collect::<Result<_, _>>()?,
            ),
            None if raw.is_empty() => FieldValue::Nums(Vec::new()),
            None => FieldValue::Nums(
                raw.split(LIST_DELIMITER)
                    .map(|item| parse_num(spec, item))
                    .collect::<Result<_, _>>()?,
            ),
        },
        FieldKind::Pairs => {
            let raw = if spec.width.is_some() { raw.trim_end_matches(' ') } else { raw };
            let items: Vec<&str> = if raw.is_empty() {
                Vec::new()
            } else {
                raw.split(PAIR_DELIMITER).collect()
            };
            FieldValue::Pairs(
                items
                    .chunks_exact(2)
                    .map(|kv| (kv[0].to_string(), kv[1].to_string()))
                    .collect(),
            )
        }
        FieldKind::NumPairs => {
            let raw = if spec.width.is_some() { raw.trim_end_matches(' ') } else { raw };
            let items: Vec<&str> = if raw.is_empty() {
                Vec::new()
            } else {
                raw.split(PAIR_DELIMITER).collect()
            };
            let mut pairs = Vec::with_capacity(items.len() / 2);
            for kv in items.chunks_exact(2) {
                pairs.push((parse_num(spec, kv[0])?, parse_num(spec, kv[1])?));
            }
            FieldValue::NumPairs(pairs)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pattern: &str) -> Header {
        Header::new(pattern).unwrap()
    }

    #[test]
    fn test_variable_roundtrip_with_payload() {
        let h = header("QRTP<index:num>/<total:num>$");
        let fields = Fields::new()
            .with("index", 3i64)
            .with("total", 12i64)
            .with_payload("Hello: world $ still payload");
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "QRTP3/12$Hello: world $ still payload");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_empty_payload_is_omitted() {
        let h = header("QRTP<index:num>/<total:num>$");
        let fields = Fields::new().with("index", 0i64).with("total", 1i64);
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "QRTP0/1$");
        let decoded = h.decode(&encoded).unwrap();
        assert_eq!(decoded.payload(), None);
        assert_eq!(decoded, fields);
    }

    #[test]
    fn test_open_pattern_adds_payload_marker() {
        let h = header("ACK:<indices:nums>");
        let fields = Fields::new().with("indices", vec![0i64, 2, 5]).with_payload("extra");
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "ACK:0,2,5$extra");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_all_scalar_and_list_types_roundtrip() {
        let h = header("H<name>|<n:num>|<ok:bool>|<tags:list>|<ids:nums>|<kv:pairs>|<pts:numPairs>");
        let fields = Fields::new()
            .with("name", "alice")
            .with("n", -42i64)
            .with("ok", true)
            .with("tags", vec!["a", "b", "c"])
            .with("ids", vec![1i64, 20, 300])
            .with("kv", vec![("k1".to_string(), "v1".to_string()), ("k2".to_string(), "v2".to_string())])
            .with("pts", vec![(1i64, 2i64), (3, 4)]);
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "Halice|-42|true|a,b,c|1,20,300|k1;v1;k2;v2|1;2;3;4");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_empty_lists_roundtrip() {
        let h = header("L<tags:list>:<ids:nums>");
        let fields = Fields::new()
            .with("tags", Vec::<String>::new())
            .with("ids", Vec::<i64>::new());
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "L:");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_fixed_width_fields_in_variable_header() {
        let h = header("V<id:num-5>:<code:text-3>:<ids:nums-2>:<tags:list-2>");
        let fields = Fields::new()
            .with("id", 42i64)
            .with("code", "ab")
            .with("ids", vec![1i64, 23])
            .with("tags", vec!["x", "yz"]);
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "V00042:ab :0123:x yz");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_width_boundaries() {
        let h = header("W<n:num-3>:<t:text-3>");
        let exact = Fields::new().with("n", 999i64).with("t", "abc");
        let encoded = h.encode(&exact).unwrap();
        assert_eq!(encoded, "W999:abc");
        assert_eq!(h.decode(&encoded).unwrap(), exact);

        let too_big = Fields::new().with("n", 1000i64).with("t", "abc");
        assert_eq!(
            h.encode(&too_big),
            Err(HeaderError::WidthOverflow {
                value: "1000".into(),
                width: 3
            })
        );

        let too_long = Fields::new().with("n", 1i64).with("t", "abcd");
        let err = h.encode(&too_long).unwrap_err();
        assert!(matches!(err, HeaderError::WidthOverflow { width: 3, .. }));
        assert!(err.is_encode_error());
    }

    #[test]
    fn test_decode_truncates_oversized_fixed_text() {
        let h = header("T<t:text-3>;");
        let decoded = h.decode("Tabcdef;").unwrap();
        assert_eq!(decoded.text("t"), Some("abc"));
    }

    #[test]
    fn test_fixed_header_positional_decode() {
        let h = header("QR<seq:num-4><kind:text-2><ok:bool-5>!");
        assert_eq!(h.fixed_len(), Some(2 + 4 + 2 + 5));

        let fields = Fields::new()
            .with("seq", 17i64)
            .with("kind", "D")
            .with("ok", false)
            .with_payload("<payload>$with:delims");
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(encoded, "QR0017D false<payload>$with:delims");
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_fixed_header_rejects_empty_lists() {
        let h = header("E<ids:nums-2><tags:list-2>!");
        let one_each = Fields::new().with("ids", vec![7i64]).with("tags", vec!["a"]);
        let encoded = h.encode(&one_each).unwrap();
        assert_eq!(encoded, "E07a ");
        assert_eq!(h.decode(&encoded).unwrap(), one_each);

        let no_ids = Fields::new().with("ids", Vec::<i64>::new()).with("tags", vec!["a"]);
        let err = h.encode(&no_ids).unwrap_err();
        assert_eq!(err, HeaderError::EmptyFixedList { name: "ids".into() });
        assert!(err.is_encode_error());

        let no_tags = Fields::new().with("ids", vec![7i64]).with("tags", Vec::<String>::new());
        assert_eq!(
            h.encode(&no_tags),
            Err(HeaderError::EmptyFixedList { name: "tags".into() })
        );
    }

    #[test]
    fn test_fixed_header_without_payload() {
        let h = header("F<a:num-2>!");
        let decoded = h.decode("F07").unwrap();
        assert_eq!(decoded.num("a"), Some(7));
        assert_eq!(decoded.payload(), None);
    }

    #[test]
    fn test_fixed_header_rejects_wrong_prefix_and_short_input() {
        let h = header("QR<seq:num-4>!");
        assert_eq!(
            h.decode("XX0001"),
            Err(HeaderError::PrefixMismatch { segment: "QR".into() })
        );
        assert_eq!(
            h.decode("QR01"),
            Err(HeaderError::Truncated {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn test_decode_reports_mismatched_segment() {
        let h = header("QRTP<index:num>/<total:num>$");
        assert_eq!(
            h.decode("BAD0/3$x"),
            Err(HeaderError::PrefixMismatch { segment: "QRTP".into() })
        );
        assert_eq!(
            h.decode("QRTP3:invalid-hash$Test m"),
            Err(HeaderError::MissingDelimiter { delimiter: "/".into() })
        );
    }

    #[test]
    fn test_decode_rejects_bad_numbers() {
        let h = header("N<a:num>/<b:nums>");
        assert!(matches!(
            h.decode("Nx/1"),
            Err(HeaderError::InvalidNumber { .. })
        ));
        assert!(matches!(
            h.decode("N1/1,,2"),
            Err(HeaderError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_encode_missing_field_and_type_mismatch() {
        let h = header("M<a:num>:<b>");
        let err = h.encode(&Fields::new().with("a", 1i64)).unwrap_err();
        assert_eq!(err, HeaderError::MissingField { name: "b".into() });

        let err = h.encode(&Fields::new().with("a", "one").with("b", "x")).unwrap_err();
        assert!(matches!(err, HeaderError::TypeMismatch { expected: "num", actual: "text", .. }));
    }

    #[test]
    fn test_text_field_accepts_scalars() {
        let h = header("S<t>");
        assert_eq!(h.encode(&Fields::new().with("t", 12i64)).unwrap(), "S12");
    }

    #[test]
    fn test_bool_decode_is_lenient() {
        let h = header("B<b:bool>");
        assert_eq!(h.decode("BTRUE").unwrap().bool("b"), Some(true));
        assert_eq!(h.decode("Bnope").unwrap().bool("b"), Some(false));
    }

    #[test]
    fn test_pairs_drop_dangling_item() {
        let h = header("P<kv:pairs>");
        let decoded = h.decode("Pa;1;b").unwrap();
        assert_eq!(decoded.pairs("kv").unwrap(), &[("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_fixed_width_decode_counts_characters() {
        let h = header("U<t:text-2><n:num-1>!");
        let fields = Fields::new().with("t", "é✓").with("n", 5i64).with_payload("ü");
        let encoded = h.encode(&fields).unwrap();
        assert_eq!(h.decode(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_invalid_patterns_fail_fast() {
        for bad in [
            "A<a:num",
            "A<:num>",
            "A<a:float>",
            "A<a:num-0>",
            "A<a:num-x>",
            "A<a><b>",
            "A<a>:<a>",
            "A<payload>",
            "A<a:num>!",
            "A<a:num-2>:<b:num-2>!",
            "A<a>$<b>",
        ] {
            assert!(
                matches!(Header::new(bad), Err(HeaderError::InvalidPattern { .. })),
                "pattern {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_field_descriptors() {
        let h = header("X<a:num-3>:<b:list>:<c>");
        let kinds: Vec<_> = h.fields().iter().map(|f| (f.name.as_str(), f.kind, f.width)).collect();
        assert_eq!(
            kinds,
            vec![
                ("a", FieldKind::Num, Some(3)),
                ("b", FieldKind::List, None),
                ("c", FieldKind::Text, None),
            ]
        );
        assert_eq!(h.prefix(), "X");
        assert_eq!(h.fixed_len(), None);
    }
}
