//! Composite of two child pictures.
//!
//! Payload: `op u32`, then two child slots. A slot is `0` (empty),
//! `1` followed by `len u32` and the nested picture bytes, or `2` followed by
//! an `index u32` into the accumulator of the current pass. The first
//! occurrence of a child instance is written inline and registered; later
//! occurrences are references.

use super::{Decoded, PictureData};
use crate::accumulator::Accumulator;
use crate::codec::PictureKind;
use crate::common::binary::{ByteOrder, ByteReader, ByteWriter};
use crate::common::error::{Error, Result};
use crate::common::geometry::{Rect, Size};
use crate::config::PictureConfig;
use crate::draw::{DrawSettings, DrawingSurface};
use crate::picture::Picture;
use crate::provider::{ByteRange, PictureDataProvider};
use std::sync::Arc;

const SLOT_EMPTY: u32 = 0;
const SLOT_INLINE: u32 = 1;
const SLOT_REFERENCE: u32 = 2;

/// How the two children of a composite are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOp {
    /// Left to right: widths add, the taller child sets the height
    SideBySide = 1,
    /// Top to bottom: heights add, the wider child sets the width
    Stacked = 2,
    /// Both children drawn over the same area
    Superimposed = 3,
}

impl MetaOp {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::SideBySide),
            2 => Some(Self::Stacked),
            3 => Some(Self::Superimposed),
            _ => None,
        }
    }

    /// Size of the composite from the sizes of its children.
    pub fn combine(&self, first: Size, second: Size) -> Size {
        match self {
            Self::SideBySide => Size::new(
                first.width.saturating_add(second.width),
                first.height.max(second.height),
            ),
            Self::Stacked => Size::new(
                first.width.max(second.width),
                first.height.saturating_add(second.height),
            ),
            Self::Superimposed => {
                Size::new(first.width.max(second.width), first.height.max(second.height))
            },
        }
    }

    /// Areas of `dest` given to each child, proportional to their sizes.
    pub fn split(&self, dest: Rect, first: Size, second: Size) -> (Rect, Rect) {
        match self {
            Self::SideBySide => {
                let total = first.width as f64 + second.width as f64;
                let ratio = if total > 0.0 { first.width as f64 / total } else { 0.5 };
                let w = dest.width * ratio;
                (
                    Rect::new(dest.x, dest.y, w, dest.height),
                    Rect::new(dest.x + w, dest.y, dest.width - w, dest.height),
                )
            },
            Self::Stacked => {
                let total = first.height as f64 + second.height as f64;
                let ratio = if total > 0.0 { first.height as f64 / total } else { 0.5 };
                let h = dest.height * ratio;
                (
                    Rect::new(dest.x, dest.y, dest.width, h),
                    Rect::new(dest.x, dest.y + h, dest.width, dest.height - h),
                )
            },
            Self::Superimposed => (dest, dest),
        }
    }
}

pub(crate) struct MetaComposite {
    op: MetaOp,
    first: Option<Arc<PictureData>>,
    second: Option<Arc<PictureData>>,
}

/// Wrap a child in a one-entry picture unless it already is one.
fn as_embedded(child: Arc<PictureData>) -> Arc<PictureData> {
    if child.kind() == PictureKind::Picture {
        return child;
    }
    let config = Arc::clone(child.config());
    let picture = Picture::from_picture_data_with(config, child);
    Arc::new(PictureData::from_picture(picture))
}

fn child_size(child: &Option<Arc<PictureData>>) -> Size {
    child.as_ref().map(|c| c.load().size()).unwrap_or_default()
}

fn child_hint(child: &Option<Arc<PictureData>>) -> Size {
    child.as_ref().map(|c| c.size_hint()).unwrap_or_default()
}

impl MetaComposite {
    pub(crate) fn new(
        op: MetaOp,
        first: Option<Arc<PictureData>>,
        second: Option<Arc<PictureData>>,
    ) -> Self {
        let shared = match (&first, &second) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        let first = first.map(as_embedded);
        let second = if shared {
            first.clone()
        } else {
            second.map(as_embedded)
        };
        Self { op, first, second }
    }

    pub(crate) fn op(&self) -> MetaOp {
        self.op
    }

    pub(crate) fn children(&self) -> (Option<&Arc<PictureData>>, Option<&Arc<PictureData>>) {
        (self.first.as_ref(), self.second.as_ref())
    }

    pub(crate) fn load(&self) -> Decoded {
        Decoded::Meta {
            size: self.op.combine(child_size(&self.first), child_size(&self.second)),
        }
    }

    pub(crate) fn size_hint(&self) -> Size {
        self.op.combine(child_hint(&self.first), child_hint(&self.second))
    }

    pub(crate) fn draw(
        &self,
        surface: &mut dyn DrawingSurface,
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()> {
        let (a, b) = self
            .op
            .split(dest, child_size(&self.first), child_size(&self.second));
        if let Some(first) = &self.first {
            first.draw(surface, a, settings)?;
        }
        if let Some(second) = &self.second {
            second.draw(surface, b, settings)?;
        }
        Ok(())
    }

    pub(crate) fn save(&self, out: &mut ByteWriter, acc: &mut Accumulator) -> Result<()> {
        out.put_u32(self.op as u32);
        for child in [&self.first, &self.second] {
            match child {
                None => out.put_u32(SLOT_EMPTY),
                Some(child) => match acc.find(child) {
                    Some(index) => {
                        out.put_u32(SLOT_REFERENCE);
                        out.put_u32(index as u32);
                    },
                    None => {
                        acc.add(child);
                        let bytes = child.embedded_bytes()?;
                        out.put_u32(SLOT_INLINE);
                        out.put_u32(bytes.len() as u32);
                        out.put_bytes(&bytes);
                    },
                },
            }
        }
        Ok(())
    }

    pub(crate) fn data_size(&self, acc: &mut Accumulator) -> Result<u64> {
        let mut size = 4u64;
        for child in [&self.first, &self.second] {
            size += match child {
                None => 4,
                Some(child) if acc.find(child).is_some() => 8,
                Some(child) => {
                    acc.add(child);
                    8 + child.embedded_bytes()?.len() as u64
                },
            };
        }
        Ok(size)
    }

    /// Deep copy; a child shared by both slots stays shared in the copy.
    pub(crate) fn duplicate(&self) -> Result<Self> {
        let first = match &self.first {
            Some(child) => Some(Arc::new(child.duplicate()?)),
            None => None,
        };
        let second = match (&self.first, &self.second) {
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => first.clone(),
            (_, Some(b)) => Some(Arc::new(b.duplicate()?)),
            (_, None) => None,
        };
        Ok(Self {
            op: self.op,
            first,
            second,
        })
    }
}

/// Read a composite payload. Inline children become embedded entries over a
/// window of `provider` and are registered in `acc`.
pub(crate) fn parse(
    config: &Arc<PictureConfig>,
    provider: &Arc<PictureDataProvider>,
    order: ByteOrder,
    acc: &mut Accumulator,
) -> Result<MetaComposite> {
    let bytes = provider.to_bytes()?;
    let mut reader = ByteReader::with_order(&bytes, order);
    let raw_op = reader.read_u32()?;
    let op = MetaOp::from_u32(raw_op)
        .ok_or_else(|| Error::CorruptedData(format!("Unknown composite operator {}", raw_op)))?;

    let mut slots = [None, None];
    for slot in &mut slots {
        *slot = match reader.read_u32()? {
            SLOT_EMPTY => None,
            SLOT_INLINE => {
                let len = reader.read_u32()? as u64;
                let start = reader.position() as u64;
                reader.skip(len as usize)?;
                let window = Arc::new(PictureDataProvider::sub_range(
                    provider,
                    ByteRange::new(start, len),
                ));
                let child = Arc::new(PictureData::from_provider(
                    Arc::clone(config),
                    PictureKind::Picture,
                    window,
                ));
                acc.add(&child);
                Some(child)
            },
            SLOT_REFERENCE => {
                let index = reader.read_u32()? as usize;
                let child = acc.get(index).ok_or_else(|| {
                    Error::CorruptedData(format!("Composite references unknown child {}", index))
                })?;
                Some(Arc::clone(child))
            },
            other => {
                return Err(Error::CorruptedData(format!("Unknown composite slot type {}", other)));
            },
        };
    }
    let [first, second] = slots;
    Ok(MetaComposite { op, first, second })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::{config, png_data};

    #[test]
    fn test_combine_sizes() {
        let a = Size::new(10, 20);
        let b = Size::new(30, 5);
        assert_eq!(MetaOp::SideBySide.combine(a, b), Size::new(40, 20));
        assert_eq!(MetaOp::Stacked.combine(a, b), Size::new(30, 25));
        assert_eq!(MetaOp::Superimposed.combine(a, b), Size::new(30, 20));
    }

    #[test]
    fn test_split_is_proportional() {
        let (a, b) = MetaOp::SideBySide.split(
            Rect::new(0.0, 0.0, 100.0, 10.0),
            Size::new(1, 1),
            Size::new(3, 1),
        );
        assert_eq!(a, Rect::new(0.0, 0.0, 25.0, 10.0));
        assert_eq!(b, Rect::new(25.0, 0.0, 75.0, 10.0));
        assert_eq!(MetaOp::from_u32(9), None);
    }

    #[test]
    fn test_shared_child_written_once() {
        let child = Arc::new(png_data(4, 4));
        let meta = PictureData::meta(config(), MetaOp::SideBySide, Some(Arc::clone(&child)), Some(child));
        assert_eq!(meta.width(), 8);

        let mut out = ByteWriter::new();
        let mut acc = Accumulator::new();
        meta.save(&mut out, &mut acc).unwrap();
        assert_eq!(acc.len(), 1);

        let bytes = out.into_inner();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), MetaOp::SideBySide as u32);
        assert_eq!(reader.read_u32().unwrap(), SLOT_INLINE);
        let len = reader.read_u32().unwrap() as usize;
        reader.skip(len).unwrap();
        assert_eq!(reader.read_u32().unwrap(), SLOT_REFERENCE);
        assert_eq!(reader.read_u32().unwrap(), 0);
        assert_eq!(reader.remaining(), 0);

        let mut sizing = Accumulator::new();
        assert_eq!(meta.data_size(&mut sizing).unwrap(), bytes.len() as u64);
    }

    #[test]
    fn test_parse_resolves_reference() {
        let child = Arc::new(png_data(2, 6));
        let meta = PictureData::meta(config(), MetaOp::Stacked, Some(Arc::clone(&child)), Some(child));
        let mut out = ByteWriter::new();
        meta.save(&mut out, &mut Accumulator::new()).unwrap();

        let provider = Arc::new(PictureDataProvider::from_slice(out.as_slice(), ByteRange::ALL));
        let mut acc = Accumulator::new();
        let parsed = parse(&config(), &provider, ByteOrder::Little, &mut acc).unwrap();
        let (a, b) = parsed.children();
        assert!(Arc::ptr_eq(a.unwrap(), b.unwrap()));
        assert_eq!(parsed.op(), MetaOp::Stacked);
        assert_eq!(parsed.size_hint(), Size::new(2, 12));
    }

    #[test]
    fn test_parse_rejects_dangling_reference() {
        let mut out = ByteWriter::new();
        out.put_u32(MetaOp::Superimposed as u32);
        out.put_u32(SLOT_REFERENCE);
        out.put_u32(3);
        out.put_u32(SLOT_EMPTY);
        let provider = Arc::new(PictureDataProvider::from_slice(out.as_slice(), ByteRange::ALL));
        assert!(parse(&config(), &provider, ByteOrder::Little, &mut Accumulator::new()).is_err());

        // Kept as opaque data instead of failing the entry
        let data = PictureData::from_provider(config(), PictureKind::Meta, provider);
        assert!(!data.is_renderable());
        assert_eq!(data.tag(), PictureKind::Meta.tag());
    }

    #[test]
    fn test_duplicate_keeps_sharing() {
        let child = Arc::new(png_data(1, 1));
        let meta = PictureData::meta(config(), MetaOp::Superimposed, Some(Arc::clone(&child)), Some(child));
        let copy = meta.duplicate().unwrap();
        match &copy.variant {
            super::super::Variant::Meta(composite) => {
                let (a, b) = composite.children();
                assert!(Arc::ptr_eq(a.unwrap(), b.unwrap()));
            },
            _ => panic!("expected a composite"),
        }
    }
}
