//! Key/value bag holding picture settings (V5 and later headers).
//!
//! Layout: `count u32`, then per entry `key_len u16`, key bytes, `type u8`
//! and the value:
//!
//! | Type | Value                    |
//! |------|--------------------------|
//! | 1    | i64                      |
//! | 2    | f64                      |
//! | 3    | bool (u8)                |
//! | 4    | string: len u32 + UTF-8  |
//! | 5    | bytes: len u32 + data    |
//! | 6    | f64 array: count u32 + f64s |

use super::{OutsideRef, PicEnd, PictureEnvelope};
use crate::common::binary::{ByteOrder, ByteReader, ByteWriter};
use crate::common::error::{Error, Result};
use crate::common::geometry::AffineTransform;
use bytes::Bytes;
use indexmap::IndexMap;
use std::path::PathBuf;

const TYPE_I64: u8 = 1;
const TYPE_F64: u8 = 2;
const TYPE_BOOL: u8 = 3;
const TYPE_STR: u8 = 4;
const TYPE_BYTES: u8 = 5;
const TYPE_F64S: u8 = 6;

const PIC_END_X: &str = "pic_end.x";
const PIC_END_Y: &str = "pic_end.y";
const PIC_END_MODE: &str = "pic_end.mode";
const MATRIX: &str = "matrix";
const SPLIT_ENABLED: &str = "split.enabled";
const SPLIT_ROWS: &str = "split.rows";
const SPLIT_COLS: &str = "split.cols";
const SOURCE_NAME: &str = "source_name";
const OUTSIDE_PATH: &str = "outside.path";
const OUTSIDE_RELATIVE: &str = "outside.relative";

/// Keys interpreted by this build, in write order.
const KNOWN_KEYS: [&str; 10] = [
    PIC_END_X,
    PIC_END_Y,
    PIC_END_MODE,
    MATRIX,
    SPLIT_ENABLED,
    SPLIT_ROWS,
    SPLIT_COLS,
    SOURCE_NAME,
    OUTSIDE_PATH,
    OUTSIDE_RELATIVE,
];

/// One typed bag value.
#[derive(Debug, Clone, PartialEq)]
pub enum BagValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    F64s(Vec<f64>),
}

impl BagValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            Self::F64(v) => Some(*v as i64),
            Self::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::I64(v) => Some(*v != 0),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Insertion-ordered settings bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bag {
    entries: IndexMap<String, BagValue>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: BagValue) -> Option<BagValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<BagValue> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a bag from exactly `data`.
    pub fn read(data: &[u8], order: ByteOrder) -> Result<Self> {
        let mut bag = Self::new();
        if data.is_empty() {
            return Ok(bag);
        }
        let mut reader = ByteReader::with_order(data, order);
        let count = reader.read_u32()?;
        for _ in 0..count {
            let key_len = reader.read_u16()? as usize;
            let key = utf8(reader.read_bytes(key_len)?)?;
            let value = match reader.read_u8()? {
                TYPE_I64 => BagValue::I64(reader.read_i64()?),
                TYPE_F64 => BagValue::F64(reader.read_f64()?),
                TYPE_BOOL => BagValue::Bool(reader.read_u8()? != 0),
                TYPE_STR => {
                    let len = reader.read_u32()? as usize;
                    BagValue::Str(utf8(reader.read_bytes(len)?)?)
                },
                TYPE_BYTES => {
                    let len = reader.read_u32()? as usize;
                    BagValue::Bytes(Bytes::copy_from_slice(reader.read_bytes(len)?))
                },
                TYPE_F64S => {
                    let n = reader.read_u32()? as usize;
                    if n > reader.remaining() / 8 {
                        return Err(Error::CorruptedData(format!("Bag array of {} values is truncated", n)));
                    }
                    let mut values = Vec::with_capacity(n);
                    for _ in 0..n {
                        values.push(reader.read_f64()?);
                    }
                    BagValue::F64s(values)
                },
                other => {
                    return Err(Error::CorruptedData(format!("Unknown bag value type {} for {}", other, key)));
                },
            };
            bag.entries.insert(key, value);
        }
        Ok(bag)
    }

    /// Encoded form; an empty bag encodes to nothing.
    pub fn write(&self, out: &mut ByteWriter) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        out.put_u32(self.entries.len() as u32);
        for (key, value) in &self.entries {
            let key_len = u16::try_from(key.len())
                .map_err(|_| Error::InvalidFormat(format!("Bag key too long: {}", key.len())))?;
            out.put_u16(key_len);
            out.put_bytes(key.as_bytes());
            match value {
                BagValue::I64(v) => {
                    out.put_u8(TYPE_I64);
                    out.put_i64(*v);
                },
                BagValue::F64(v) => {
                    out.put_u8(TYPE_F64);
                    out.put_f64(*v);
                },
                BagValue::Bool(v) => {
                    out.put_u8(TYPE_BOOL);
                    out.put_u8(*v as u8);
                },
                BagValue::Str(s) => {
                    out.put_u8(TYPE_STR);
                    out.put_u32(s.len() as u32);
                    out.put_bytes(s.as_bytes());
                },
                BagValue::Bytes(b) => {
                    out.put_u8(TYPE_BYTES);
                    out.put_u32(b.len() as u32);
                    out.put_bytes(b);
                },
                BagValue::F64s(values) => {
                    out.put_u8(TYPE_F64S);
                    out.put_u32(values.len() as u32);
                    for v in values {
                        out.put_f64(*v);
                    }
                },
            }
        }
        Ok(())
    }

    /// Bag describing `envelope`: interpreted keys first (only those that
    /// differ from their defaults), then the uninterpreted ones in their
    /// original order.
    pub fn from_envelope(envelope: &PictureEnvelope) -> Self {
        let mut bag = Self::new();
        let settings = &envelope.settings;
        let pic_end = settings.pic_end;
        if pic_end.x != 0 {
            bag.insert(PIC_END_X, BagValue::I64(pic_end.x as i64));
        }
        if pic_end.y != 0 {
            bag.insert(PIC_END_Y, BagValue::I64(pic_end.y as i64));
        }
        if pic_end.mode != 0 {
            bag.insert(PIC_END_MODE, BagValue::I64(pic_end.mode as i64));
        }
        if !settings.matrix.is_identity() {
            bag.insert(MATRIX, BagValue::F64s(settings.matrix.to_matrix3().to_vec()));
        }
        let split = settings.split;
        if split.enabled {
            bag.insert(SPLIT_ENABLED, BagValue::Bool(true));
        }
        if split.rows != 0 {
            bag.insert(SPLIT_ROWS, BagValue::I64(split.rows as i64));
        }
        if split.cols != 0 {
            bag.insert(SPLIT_COLS, BagValue::I64(split.cols as i64));
        }
        if let Some(name) = &envelope.source_name {
            bag.insert(SOURCE_NAME, BagValue::Str(name.clone()));
        }
        if let Some(outside) = &envelope.outside {
            bag.insert(OUTSIDE_PATH, BagValue::Str(outside.path.to_string_lossy().into_owned()));
            if outside.relative {
                bag.insert(OUTSIDE_RELATIVE, BagValue::Bool(true));
            }
        }
        for (key, value) in envelope.extra_bag.iter() {
            if !KNOWN_KEYS.contains(&key) {
                bag.insert(key, value.clone());
            }
        }
        bag
    }

    /// Move interpreted keys into `envelope`; the rest become its extra bag.
    ///
    /// A known key with an unexpected value type is kept as uninterpreted.
    pub fn apply_to(self, envelope: &mut PictureEnvelope) {
        let settings = &mut envelope.settings;
        let mut outside_path = None;
        let mut outside_relative = false;
        for (key, value) in self.entries {
            let used = match key.as_str() {
                PIC_END_X => value.as_i64().map(|v| settings.pic_end.x = v as i32).is_some(),
                PIC_END_Y => value.as_i64().map(|v| settings.pic_end.y = v as i32).is_some(),
                PIC_END_MODE => value.as_i64().map(|v| settings.pic_end.mode = v as u32).is_some(),
                MATRIX => match &value {
                    BagValue::F64s(m) if m.len() == 9 => {
                        let mut matrix = [0.0; 9];
                        matrix.copy_from_slice(m);
                        settings.matrix = AffineTransform::from_matrix3(&matrix);
                        true
                    },
                    _ => false,
                },
                SPLIT_ENABLED => value.as_bool().map(|v| settings.split.enabled = v).is_some(),
                SPLIT_ROWS => value.as_i64().map(|v| settings.split.rows = v as u32).is_some(),
                SPLIT_COLS => value.as_i64().map(|v| settings.split.cols = v as u32).is_some(),
                SOURCE_NAME => value
                    .as_str()
                    .map(|s| envelope.source_name = Some(s.to_string()))
                    .is_some(),
                OUTSIDE_PATH => value.as_str().map(|s| outside_path = Some(PathBuf::from(s))).is_some(),
                OUTSIDE_RELATIVE => value.as_bool().map(|v| outside_relative = v).is_some(),
                _ => false,
            };
            if !used {
                envelope.extra_bag.insert(key, value);
            }
        }
        envelope.outside = outside_path.map(|path| OutsideRef {
            path,
            relative: outside_relative,
        });
    }
}

/// Apply the fixed fields of a legacy (V2 to V4) header.
pub(super) fn apply_legacy(
    envelope: &mut PictureEnvelope,
    pic_end: Option<PicEnd>,
    matrix: Option<AffineTransform>,
    split: Option<crate::draw::SplitInfo>,
) {
    if let Some(pic_end) = pic_end {
        envelope.settings.pic_end = pic_end;
    }
    if let Some(matrix) = matrix {
        envelope.settings.matrix = matrix;
    }
    if let Some(split) = split {
        envelope.settings.split = split;
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::CorruptedData("Bag text is not valid UTF-8".into()))
}
