//! Binary wire format of `numeric` and `uuid`, which have no `RowValues` counterpart.
//!
//! `numeric` travels as base-10000 digit groups: `ndigits`, `weight`, `sign`, `dscale`, then the
//! groups. Values are exchanged as decimal text so no precision is lost.

use std::error::Error;

use tokio_postgres::types::IsNull;
use tokio_util::bytes::{BufMut, BytesMut};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary `numeric` as decimal text, or `None` when `raw` is truncated.
pub(crate) fn decode_numeric(raw: &[u8]) -> Option<String> {
    let word = |at: usize| raw.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]));
    let ndigits = usize::from(word(0)?);
    #[allow(clippy::cast_possible_wrap)]
    let weight = i32::from(word(2)? as i16);
    let sign = word(4)?;
    let dscale = usize::from(word(6)?);

    match sign {
        NUMERIC_NAN => return Some("NaN".into()),
        NUMERIC_PINF => return Some("Infinity".into()),
        NUMERIC_NINF => return Some("-Infinity".into()),
        _ => {}
    }
    let groups: Vec<u16> = (0..ndigits)
        .map(|i| word(8 + 2 * i))
        .collect::<Option<_>>()?;
    let group_at = |pos: i32| {
        usize::try_from(pos)
            .ok()
            .and_then(|p| groups.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group_at(0).to_string());
        for pos in 1..=weight {
            out.push_str(&format!("{:04}", group_at(pos)));
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", group_at(pos)));
            pos += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

fn put_header(out: &mut BytesMut, ndigits: usize, weight: i16, sign: u16, dscale: usize) {
    #[allow(clippy::cast_possible_truncation)]
    out.put_u16(ndigits as u16);
    out.put_i16(weight);
    out.put_u16(sign);
    #[allow(clippy::cast_possible_truncation)]
    out.put_u16(dscale as u16);
}

/// Encode decimal `text` (`-12.50`, `NaN`, `Infinity`) as a binary `numeric`.
///
/// # Errors
/// Returns an error when `text` isn't a plain decimal number.
pub(crate) fn encode_numeric(
    text: &str,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    let text = text.trim();
    let special = match text {
        "NaN" => Some(NUMERIC_NAN),
        "Infinity" | "inf" => Some(NUMERIC_PINF),
        "-Infinity" | "-inf" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        put_header(out, 0, 0, sign, 0);
        return Ok(IsNull::No);
    }

    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(format!("'{text}' is not a decimal number").into());
    }
    if frac_part.len() > usize::from(u16::MAX >> 2) {
        return Err("numeric scale out of range".into());
    }

    let int_part = int_part.trim_start_matches('0');
    let mut digits = "0".repeat((4 - int_part.len() % 4) % 4);
    digits.push_str(int_part);
    let int_groups = digits.len() / 4;
    digits.push_str(frac_part);
    digits.push_str(&"0".repeat((4 - frac_part.len() % 4) % 4));

    let mut groups: Vec<u16> = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
        })
        .collect();
    let mut weight = i16::try_from(int_groups).map_err(|_| "numeric weight out of range")? - 1;
    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= i16::try_from(leading).map_err(|_| "numeric weight out of range")?;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    let sign = if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };
    put_header(out, groups.len(), weight, sign, frac_part.len());
    for group in groups {
        out.put_u16(group);
    }
    Ok(IsNull::No)
}

/// Render a 16-byte `uuid` in its hyphenated form.
pub(crate) fn decode_uuid(raw: &[u8]) -> Option<String> {
    if raw.len() != 16 {
        return None;
    }
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, dscale: u16, groups: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        for word in [ndigits, weight as u16, sign, dscale].into_iter().chain(groups.iter().copied()) {
            raw.extend_from_slice(&word.to_be_bytes());
        }
        raw
    }

    #[test]
    fn decodes_wire_numerics() {
        assert_eq!(decode_numeric(&numeric(1, 0, NUMERIC_POS, 0, &[3])).as_deref(), Some("3"));
        assert_eq!(
            decode_numeric(&numeric(3, 1, NUMERIC_NEG, 2, &[12, 3456, 5000])).as_deref(),
            Some("-123456.50")
        );
        assert_eq!(
            decode_numeric(&numeric(1, -2, NUMERIC_POS, 5, &[1000])).as_deref(),
            Some("0.00001")
        );
        assert_eq!(decode_numeric(&numeric(0, 0, NUMERIC_POS, 0, &[])).as_deref(), Some("0"));
        assert_eq!(decode_numeric(&numeric(0, 0, NUMERIC_NAN, 0, &[])).as_deref(), Some("NaN"));
        assert_eq!(decode_numeric(&[0, 1]), None);
    }

    #[test]
    fn encodes_the_same_layout_the_server_sends() {
        let mut out = BytesMut::new();
        encode_numeric("-123456.50", &mut out).unwrap();
        assert_eq!(&out[..], &numeric(3, 1, NUMERIC_NEG, 2, &[12, 3456, 5000])[..]);

        let mut out = BytesMut::new();
        encode_numeric("0.00001", &mut out).unwrap();
        assert_eq!(&out[..], &numeric(1, -2, NUMERIC_POS, 5, &[1000])[..]);

        let mut out = BytesMut::new();
        encode_numeric("-0", &mut out).unwrap();
        assert_eq!(&out[..], &numeric(0, 0, NUMERIC_POS, 0, &[])[..]);
    }

    #[test]
    fn rejects_non_decimal_text() {
        let mut out = BytesMut::new();
        assert!(encode_numeric("12e3", &mut out).is_err());
        assert!(encode_numeric(".", &mut out).is_err());
    }

    #[test]
    fn uuid_is_hyphenated() {
        let raw: Vec<u8> = (0u8..16).collect();
        assert_eq!(
            decode_uuid(&raw).as_deref(),
            Some("00010203-0405-0607-0809-0a0b0c0d0e0f")
        );
    }
}
