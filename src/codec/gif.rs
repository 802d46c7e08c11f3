// GIF block walker
//
// Walks the GIF89a block structure to build the frame timeline (frame count,
// per-frame delays, NETSCAPE2.0 loop count) and collect comment extensions.
// Image data sub-blocks are skipped; no LZW decoding happens here.

use crate::common::binary::read_u16_le;
use crate::common::error::{Error, Result};
use crate::common::geometry::Size;

/// Delay applied to frames declaring 0 or 1 centisecond, matching browsers
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Frame timeline of an animated picture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timeline {
    /// Display duration of each frame in milliseconds
    pub delays_ms: Vec<u32>,
    /// Number of loops; 0 or negative means forever
    pub loop_count: i32,
}

impl Timeline {
    /// Timeline with `frame_count` frames of the same delay.
    pub fn uniform(frame_count: usize, delay_ms: u32, loop_count: i32) -> Self {
        Self {
            delays_ms: vec![delay_ms.max(1); frame_count],
            loop_count,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.delays_ms.len()
    }

    pub fn is_animated(&self) -> bool {
        self.delays_ms.len() > 1
    }

    pub fn loops_forever(&self) -> bool {
        self.loop_count <= 0
    }

    /// Duration of one pass through all frames.
    pub fn cycle_ms(&self) -> u64 {
        self.delays_ms.iter().map(|&d| d as u64).sum()
    }
}

/// Result of a block walk.
#[derive(Debug, Clone, Default)]
pub struct GifInfo {
    /// Logical screen size
    pub size: Size,
    pub timeline: Timeline,
    pub comments: Vec<String>,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::CorruptedData("Unexpected end of GIF data".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        if self.pos + len > self.data.len() {
            return Err(Error::CorruptedData("GIF block extends past end".into()));
        }
        self.pos += len;
        Ok(())
    }

    /// Collect a chain of data sub-blocks (size byte + data, 0 terminates).
    fn sub_blocks(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<()> {
        loop {
            let len = self.byte()? as usize;
            if len == 0 {
                return Ok(());
            }
            let start = self.pos;
            self.skip(len)?;
            if let Some(out) = sink.as_deref_mut() {
                out.extend_from_slice(&self.data[start..start + len]);
            }
        }
    }
}

/// True for `GIF87a`/`GIF89a` signatures.
pub fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
}

/// Walk the blocks of a GIF stream.
///
/// A truncated stream still yields the frames seen before the cut, so a
/// partially downloaded animation keeps its first frames.
pub fn walk(data: &[u8]) -> Result<GifInfo> {
    if !is_gif(data) || data.len() < 13 {
        return Err(Error::InvalidFormat("Not a GIF stream".into()));
    }

    let width = read_u16_le(data, 6)? as u32;
    let height = read_u16_le(data, 8)? as u32;
    let packed = data[10];

    let mut cursor = Cursor { data, pos: 13 };
    if packed & 0x80 != 0 {
        cursor.skip(3 * (1usize << ((packed & 0x07) + 1)))?;
    }

    let mut info = GifInfo {
        size: Size::new(width, height),
        timeline: Timeline {
            delays_ms: Vec::new(),
            // No NETSCAPE extension: play once
            loop_count: 1,
        },
        comments: Vec::new(),
    };
    let mut pending_delay: Option<u32> = None;

    let walk_result: Result<()> = (|| {
        loop {
            match cursor.byte()? {
                // Extension introducer
                0x21 => {
                    let label = cursor.byte()?;
                    match label {
                        // Graphic control extension
                        0xF9 => {
                            let mut block = Vec::with_capacity(4);
                            cursor.sub_blocks(Some(&mut block))?;
                            if block.len() >= 3 {
                                let cs = u16::from_le_bytes([block[1], block[2]]) as u32;
                                pending_delay = Some(if cs <= 1 {
                                    DEFAULT_FRAME_DELAY_MS
                                } else {
                                    cs * 10
                                });
                            }
                        },
                        // Comment extension
                        0xFE => {
                            let mut text = Vec::new();
                            cursor.sub_blocks(Some(&mut text))?;
                            info.comments
                                .push(text.iter().map(|&b| b as char).collect::<String>());
                        },
                        // Application extension
                        0xFF => {
                            let mut block = Vec::new();
                            cursor.sub_blocks(Some(&mut block))?;
                            // "NETSCAPE2.0" + [1, loop lo, loop hi]
                            if block.len() >= 14
                                && (&block[..11] == b"NETSCAPE2.0" || &block[..11] == b"ANIMEXTS1.0")
                                && block[11] == 1
                            {
                                info.timeline.loop_count =
                                    u16::from_le_bytes([block[12], block[13]]) as i32;
                            }
                        },
                        _ => cursor.sub_blocks(None)?,
                    }
                },
                // Image descriptor
                0x2C => {
                    cursor.skip(8)?;
                    let local = cursor.byte()?;
                    if local & 0x80 != 0 {
                        cursor.skip(3 * (1usize << ((local & 0x07) + 1)))?;
                    }
                    // LZW minimum code size, then image data
                    cursor.byte()?;
                    cursor.sub_blocks(None)?;
                    info.timeline
                        .delays_ms
                        .push(pending_delay.take().unwrap_or(DEFAULT_FRAME_DELAY_MS));
                },
                // Trailer
                0x3B => return Ok(()),
                other => {
                    return Err(Error::CorruptedData(format!(
                        "Unexpected GIF block 0x{:02X}",
                        other
                    )));
                },
            }
        }
    })();

    if let Err(e) = walk_result {
        if info.timeline.delays_ms.is_empty() {
            return Err(e);
        }
        log::debug!("GIF walk stopped early after {} frames: {}", info.timeline.frame_count(), e);
    }

    Ok(info)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a GIF with `delays_cs.len()` 1x1 frames, optional loop extension.
    pub(crate) fn animated_gif(delays_cs: &[u16], loop_count: Option<u16>) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        // Global color table of 2 entries
        data.extend_from_slice(&[0x80, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        if let Some(count) = loop_count {
            data.extend_from_slice(&[0x21, 0xFF, 11]);
            data.extend_from_slice(b"NETSCAPE2.0");
            data.extend_from_slice(&[3, 1]);
            data.extend_from_slice(&count.to_le_bytes());
            data.push(0);
        }
        data.extend_from_slice(&[0x21, 0xFE, 5]);
        data.extend_from_slice(b"hello");
        data.push(0);
        for &delay in delays_cs {
            data.extend_from_slice(&[0x21, 0xF9, 4, 0]);
            data.extend_from_slice(&delay.to_le_bytes());
            data.extend_from_slice(&[0, 0]);
            data.push(0x2C);
            data.extend_from_slice(&[0, 0, 0, 0, 1, 0, 1, 0, 0]);
            // LZW min code size 2, one data sub-block
            data.extend_from_slice(&[2, 2, 0x44, 0x01, 0]);
        }
        data.push(0x3B);
        data
    }

    #[test]
    fn test_walk_animated() {
        let data = animated_gif(&[5, 20, 0], Some(0));
        let info = walk(&data).unwrap();
        assert_eq!(info.size, Size::new(4, 3));
        assert_eq!(info.timeline.delays_ms, vec![50, 200, 100]);
        assert!(info.timeline.loops_forever());
        assert_eq!(info.comments, vec!["hello".to_string()]);
    }

    #[test]
    fn test_walk_without_loop_extension_plays_once() {
        let data = animated_gif(&[10], None);
        let info = walk(&data).unwrap();
        assert_eq!(info.timeline.loop_count, 1);
        assert!(!info.timeline.is_animated());
    }

    #[test]
    fn test_truncated_stream_keeps_frames() {
        let mut data = animated_gif(&[10, 10], Some(3));
        // Drop the trailer and half of the last frame
        data.truncate(data.len() - 8);
        let info = walk(&data).unwrap();
        assert_eq!(info.timeline.frame_count(), 1);
        assert_eq!(info.timeline.loop_count, 3);
    }

    #[test]
    fn test_rejects_non_gif() {
        assert!(walk(b"\x89PNG\r\n\x1a\n").is_err());
    }
}
