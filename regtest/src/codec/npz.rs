//! Compressed array archives (`.npz`): a zip of `.npy` members keyed by name.
//!
//! Writes npy format 1.0 members with deflate compression and a fixed
//! modification time, so the same arrays always produce the same bytes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use fs_err as fs;
use num_complex::Complex64;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::array::{ArrayData, NdArray};
use crate::error::{RegressError, Result};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const NPY_SUFFIX: &str = ".npy";
const HEADER_ALIGNMENT: usize = 64;
const MAX_HEADER_BYTES: usize = 1 << 16;

/// Decode/encode failures inside an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0}")]
    Format(String),
    #[error("member '{member}': {message}")]
    Member { member: String, message: String },
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_err(message: impl Into<String>) -> ArchiveError {
    ArchiveError::Format(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

/// Element types understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descr {
    Bool,
    Int(usize, Endian),
    UInt(usize, Endian),
    Float(usize, Endian),
    Complex(usize, Endian),
    Text(usize, Endian),
    DateTime(TimeUnit, Endian),
}

impl Descr {
    fn parse(descr: &str) -> std::result::Result<Self, ArchiveError> {
        let unsupported = || format_err(format!("unsupported dtype descriptor '{descr}'"));
        let mut chars = descr.chars();
        let endian = match chars.next() {
            Some('<') | Some('=') | Some('|') => Endian::Little,
            Some('>') => Endian::Big,
            _ => return Err(unsupported()),
        };
        let code = chars.next().ok_or_else(unsupported)?;
        let rest = chars.as_str();
        let size = || rest.parse::<usize>().map_err(|_| unsupported());
        Ok(match code {
            'b' if rest == "1" => Descr::Bool,
            'i' => match size()? {
                n @ (1 | 2 | 4 | 8) => Descr::Int(n, endian),
                _ => return Err(unsupported()),
            },
            'u' => match size()? {
                n @ (1 | 2 | 4 | 8) => Descr::UInt(n, endian),
                _ => return Err(unsupported()),
            },
            'f' => match size()? {
                n @ (4 | 8) => Descr::Float(n, endian),
                _ => return Err(unsupported()),
            },
            'c' => match size()? {
                n @ (8 | 16) => Descr::Complex(n, endian),
                _ => return Err(unsupported()),
            },
            'U' => Descr::Text(size()?, endian),
            'M' => {
                let unit = match rest {
                    "8[s]" => TimeUnit::Seconds,
                    "8[ms]" => TimeUnit::Millis,
                    "8[us]" => TimeUnit::Micros,
                    "8[ns]" => TimeUnit::Nanos,
                    _ => return Err(unsupported()),
                };
                Descr::DateTime(unit, endian)
            }
            _ => return Err(unsupported()),
        })
    }

    /// Bytes per element; `None` when a text width overflows.
    fn item_size(self) -> Option<usize> {
        match self {
            Descr::Bool => Some(1),
            Descr::Int(n, _) | Descr::UInt(n, _) | Descr::Float(n, _) | Descr::Complex(n, _) => {
                Some(n)
            }
            Descr::Text(chars, _) => chars.checked_mul(4),
            Descr::DateTime(..) => Some(8),
        }
    }
}

struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn format_shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        _ => {
            let joined = shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({joined})")
        }
    }
}

fn encode_header(descr: &str, shape: &[usize]) -> std::result::Result<Vec<u8>, ArchiveError> {
    let dict = format!(
        "{{'descr': '{descr}', 'fortran_order': False, 'shape': {}, }}",
        format_shape_tuple(shape)
    );
    let prefix_len = NPY_MAGIC.len() + 2 + 2;
    let unpadded = prefix_len + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;
    let header_len =
        u16::try_from(header_len).map_err(|_| format_err("npy header exceeds 65535 bytes"))?;

    let mut out = Vec::with_capacity(prefix_len + usize::from(header_len));
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    Ok(out)
}

fn datetime_micros(value: &NaiveDateTime) -> i64 {
    value.and_utc().timestamp_micros()
}

/// Serialize one array as an npy payload.
pub fn encode_npy(array: &NdArray) -> std::result::Result<Vec<u8>, ArchiveError> {
    let (descr, body): (String, Vec<u8>) = match array.data() {
        ArrayData::Bool(v) => ("|b1".into(), v.iter().map(|b| u8::from(*b)).collect()),
        ArrayData::Int(v) => ("<i8".into(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        ArrayData::UInt(v) => ("<u8".into(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        ArrayData::Float(v) => ("<f8".into(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        ArrayData::Complex(v) => (
            "<c16".into(),
            v.iter()
                .flat_map(|c| c.re.to_le_bytes().into_iter().chain(c.im.to_le_bytes()))
                .collect(),
        ),
        ArrayData::Text(v) => {
            let width = v.iter().map(|s| s.chars().count()).max().unwrap_or(0).max(1);
            let mut body = Vec::with_capacity(v.len() * width * 4);
            for s in v {
                let mut written = 0;
                for c in s.chars() {
                    body.extend_from_slice(&u32::from(c).to_le_bytes());
                    written += 1;
                }
                body.extend(std::iter::repeat(0u8).take((width - written) * 4));
            }
            (format!("<U{width}"), body)
        }
        ArrayData::DateTime(v) => (
            "<M8[us]".into(),
            v.iter()
                .flat_map(|d| datetime_micros(d).to_le_bytes())
                .collect(),
        ),
        other => {
            return Err(format_err(format!(
                "arrays of type {} cannot be archived",
                other.kind()
            )))
        }
    };
    let mut out = encode_header(&descr, array.shape())?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn quoted_after<'a>(dict: &'a str, key: &str) -> std::result::Result<&'a str, ArchiveError> {
    let rest = value_after(dict, key)?;
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| format_err(format!("header value for '{key}' is not a string")))?;
    let rest = &rest[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| format_err(format!("unterminated string for '{key}'")))?;
    Ok(&rest[..end])
}

fn value_after<'a>(dict: &'a str, key: &str) -> std::result::Result<&'a str, ArchiveError> {
    let single = format!("'{key}'");
    let double = format!("\"{key}\"");
    let start = dict
        .find(&single)
        .map(|i| i + single.len())
        .or_else(|| dict.find(&double).map(|i| i + double.len()))
        .ok_or_else(|| format_err(format!("header is missing '{key}'")))?;
    let rest = dict[start..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| format_err(format!("malformed header near '{key}'")))?;
    Ok(rest.trim_start())
}

fn parse_header(dict: &str) -> std::result::Result<Header, ArchiveError> {
    let descr = quoted_after(dict, "descr")?.to_string();
    let fortran = value_after(dict, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(format_err("fortran_order must be True or False"));
    };
    let shape_literal = value_after(dict, "shape")?;
    let close = shape_literal
        .find(')')
        .filter(|_| shape_literal.starts_with('('))
        .ok_or_else(|| format_err("shape must be a tuple"))?;
    let shape = shape_literal[1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| format_err(format!("invalid shape dimension '{s}'")))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Header {
        descr,
        fortran_order,
        shape,
    })
}

fn take<const N: usize>(chunk: &[u8], endian: Endian) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&chunk[..N]);
    if endian == Endian::Big {
        buf.reverse();
    }
    buf
}

fn decode_int(chunk: &[u8], size: usize, endian: Endian) -> i64 {
    match size {
        1 => i64::from(chunk[0] as i8),
        2 => i64::from(i16::from_le_bytes(take(chunk, endian))),
        4 => i64::from(i32::from_le_bytes(take(chunk, endian))),
        _ => i64::from_le_bytes(take(chunk, endian)),
    }
}

fn decode_uint(chunk: &[u8], size: usize, endian: Endian) -> u64 {
    match size {
        1 => u64::from(chunk[0]),
        2 => u64::from(u16::from_le_bytes(take(chunk, endian))),
        4 => u64::from(u32::from_le_bytes(take(chunk, endian))),
        _ => u64::from_le_bytes(take(chunk, endian)),
    }
}

fn decode_float(chunk: &[u8], size: usize, endian: Endian) -> f64 {
    match size {
        4 => f64::from(f32::from_le_bytes(take(chunk, endian))),
        _ => f64::from_le_bytes(take(chunk, endian)),
    }
}

fn decode_datetime(raw: i64, unit: TimeUnit) -> std::result::Result<NaiveDateTime, ArchiveError> {
    let parsed = match unit {
        TimeUnit::Seconds => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millis => DateTime::from_timestamp_millis(raw),
        TimeUnit::Micros => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanos => Some(DateTime::from_timestamp_nanos(raw)),
    };
    parsed
        .map(|d| d.naive_utc())
        .ok_or_else(|| format_err(format!("datetime value {raw} is out of range (NaT?)")))
}

fn decode_text(chunk: &[u8], endian: Endian) -> std::result::Result<String, ArchiveError> {
    let mut s = String::new();
    for code in chunk.chunks_exact(4) {
        let code = u32::from_le_bytes(take(code, endian));
        if code == 0 {
            break;
        }
        s.push(char::from_u32(code).ok_or_else(|| format_err("invalid code point in text array"))?);
    }
    Ok(s)
}

/// Parse one npy payload.
pub fn decode_npy(payload: &[u8]) -> std::result::Result<NdArray, ArchiveError> {
    if payload.len() < 10 || &payload[..6] != NPY_MAGIC {
        return Err(format_err("invalid npy magic"));
    }
    let (header_start, header_len) = match (payload[6], payload[7]) {
        (1, 0) => (10, usize::from(u16::from_le_bytes([payload[8], payload[9]]))),
        (2, 0) | (3, 0) => {
            if payload.len() < 12 {
                return Err(format_err("payload truncated before header length"));
            }
            let raw = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]);
            (12, raw as usize)
        }
        (major, minor) => {
            return Err(format_err(format!("unsupported npy version {major}.{minor}")))
        }
    };
    if header_len > MAX_HEADER_BYTES || payload.len() < header_start + header_len {
        return Err(format_err("payload truncated before end of header"));
    }
    let dict = std::str::from_utf8(&payload[header_start..header_start + header_len])
        .map_err(|_| format_err("header is not valid text"))?;
    let header = parse_header(dict)?;
    if header.fortran_order {
        return Err(format_err("fortran-ordered arrays are not supported"));
    }
    let descr = Descr::parse(&header.descr)?;
    let item = descr
        .item_size()
        .filter(|&n| n > 0)
        .ok_or_else(|| format_err(format!("invalid item size for '{}'", header.descr)))?;
    let expected = header
        .shape
        .iter()
        .try_fold(item, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            format_err(format!("shape {} overflows", format_shape_tuple(&header.shape)))
        })?;
    let body = &payload[header_start + header_len..];
    if body.len() != expected {
        return Err(format_err(format!(
            "payload has {} bytes, expected {expected} for shape {}",
            body.len(),
            format_shape_tuple(&header.shape)
        )));
    }
    let chunks = body.chunks_exact(item);
    let data = match descr {
        Descr::Bool => ArrayData::Bool(chunks.map(|c| c[0] != 0).collect()),
        Descr::Int(n, e) => ArrayData::Int(chunks.map(|c| decode_int(c, n, e)).collect()),
        Descr::UInt(n, e) => ArrayData::UInt(chunks.map(|c| decode_uint(c, n, e)).collect()),
        Descr::Float(n, e) => ArrayData::Float(chunks.map(|c| decode_float(c, n, e)).collect()),
        Descr::Complex(n, e) => ArrayData::Complex(
            chunks
                .map(|c| {
                    let half = n / 2;
                    Complex64::new(decode_float(c, half, e), decode_float(&c[half..], half, e))
                })
                .collect(),
        ),
        Descr::Text(_, e) => ArrayData::Text(
            chunks
                .map(|c| decode_text(c, e))
                .collect::<std::result::Result<_, _>>()?,
        ),
        Descr::DateTime(unit, e) => ArrayData::DateTime(
            chunks
                .map(|c| decode_datetime(i64::from_le_bytes(take(c, e)), unit))
                .collect::<std::result::Result<_, _>>()?,
        ),
    };
    NdArray::new(header.shape, data).map_err(|e| format_err(e.to_string()))
}

/// Build the archive bytes for a set of named arrays.
pub fn encode(arrays: &BTreeMap<String, NdArray>) -> std::result::Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    for (name, array) in arrays {
        let payload = encode_npy(array).map_err(|e| ArchiveError::Member {
            member: name.clone(),
            message: e.to_string(),
        })?;
        writer.start_file(format!("{name}{NPY_SUFFIX}"), options)?;
        writer.write_all(&payload)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Parse archive bytes into named arrays.
pub fn decode(bytes: &[u8]) -> std::result::Result<BTreeMap<String, NdArray>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut arrays = BTreeMap::new();
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        let name = member.name().to_string();
        let mut payload = Vec::new();
        member.read_to_end(&mut payload)?;
        let key = name.strip_suffix(NPY_SUFFIX).unwrap_or(&name).to_string();
        let array = decode_npy(&payload).map_err(|e| ArchiveError::Member {
            member: name.clone(),
            message: e.to_string(),
        })?;
        arrays.insert(key, array);
    }
    Ok(arrays)
}

pub fn write(path: &Path, arrays: &BTreeMap<String, NdArray>) -> Result<()> {
    let bytes = encode(arrays).map_err(|e| RegressError::serialize(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<BTreeMap<String, NdArray>> {
    let bytes = fs::read(path)?;
    decode(&bytes).map_err(|e| RegressError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> BTreeMap<String, NdArray> {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_micro_opt(9, 30, 0, 250)
            .unwrap();
        BTreeMap::from([
            ("arr0d".to_string(), NdArray::scalar(vec![1.0]).unwrap()),
            ("arr1d".to_string(), NdArray::from_vec(vec!["321", "1234"])),
            (
                "arr2d".to_string(),
                NdArray::new(vec![3, 2], vec![1i64, 2, 3, 4, 5, 6]).unwrap(),
            ),
            (
                "flags".to_string(),
                NdArray::from_vec(vec![true, false]),
            ),
            (
                "z".to_string(),
                NdArray::from_vec(vec![Complex64::new(1.0, -1.0)]),
            ),
            ("when".to_string(), NdArray::from_vec(vec![date])),
            ("u".to_string(), NdArray::from_vec(vec![u64::MAX])),
        ])
    }

    #[test]
    fn archive_preserves_names_kinds_and_values() {
        let arrays = sample();
        let decoded = decode(&encode(&arrays).unwrap()).unwrap();
        assert_eq!(decoded, arrays);
    }

    #[test]
    fn archive_bytes_are_reproducible() {
        let arrays = sample();
        assert_eq!(encode(&arrays).unwrap(), encode(&arrays).unwrap());
    }

    #[test]
    fn header_is_aligned_and_numpy_shaped() {
        let array = NdArray::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let payload = encode_npy(&array).unwrap();
        let header_len = usize::from(u16::from_le_bytes([payload[8], payload[9]]));
        assert_eq!((10 + header_len) % HEADER_ALIGNMENT, 0);
        let header = std::str::from_utf8(&payload[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 2), }"));
        assert!(header.ends_with('\n'));
    }

    #[test]
    fn reader_accepts_narrow_and_big_endian_types() {
        let mut payload = encode_header(">i4", &[2]).unwrap();
        payload.extend_from_slice(&7i32.to_be_bytes());
        payload.extend_from_slice(&(-1i32).to_be_bytes());
        let array = decode_npy(&payload).unwrap();
        assert_eq!(array.data(), &ArrayData::Int(vec![7, -1]));

        let mut payload = encode_header("<f4", &[1]).unwrap();
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        assert_eq!(decode_npy(&payload).unwrap().data(), &ArrayData::Float(vec![1.5]));
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        assert!(decode(b"not a zip archive").is_err());
        assert!(decode_npy(b"\x93NUMPY\x01\x00").is_err());

        let mut payload = encode_header("<f8", &[3]).unwrap();
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        assert!(decode_npy(&payload).unwrap_err().to_string().contains("expected 24"));

        let payload = encode_header("|O", &[1]).unwrap();
        assert!(decode_npy(&payload).unwrap_err().to_string().contains("unsupported"));
    }

    #[test]
    fn oversized_shapes_are_rejected_without_panicking() {
        let huge = 1usize << 32;
        let mut payload = encode_header("<f8", &[huge, huge, huge]).unwrap();
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        let err = decode_npy(&payload).unwrap_err();
        assert!(err.to_string().contains("overflows"));

        let payload = encode_header(&format!("<U{}", usize::MAX / 2), &[1]).unwrap();
        assert!(decode_npy(&payload).unwrap_err().to_string().contains("item size"));
    }

    #[test]
    fn unsupported_kinds_cannot_be_archived() {
        let array = NdArray::from_vec(ArrayData::Bytes(vec![b"x".to_vec()]));
        assert!(encode_npy(&array).is_err());
    }
}
