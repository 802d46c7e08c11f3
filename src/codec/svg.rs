// SVG header probe
//
// Reads the root <svg> element with quick-xml and resolves its intrinsic size
// from width/height, falling back to the viewBox. The document itself is
// handed to the drawing surface untouched.

use crate::common::error::{Error, Result};
use crate::common::geometry::{Rect, Size};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Size used when the root element declares neither dimensions nor a viewBox
pub const DEFAULT_SVG_SIZE: Size = Size::new(300, 150);

/// Intrinsic geometry of an SVG document.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgInfo {
    /// Width in CSS pixels, if resolvable
    pub width: Option<f64>,
    /// Height in CSS pixels, if resolvable
    pub height: Option<f64>,
    pub view_box: Option<Rect>,
}

impl SvgInfo {
    /// Resolved pixel size.
    ///
    /// A missing side is derived from the viewBox aspect ratio; with no
    /// information at all the CSS default replaced-element size is used.
    pub fn size(&self) -> Size {
        let vb = self.view_box.filter(|vb| !vb.is_empty());
        let (w, h) = match (self.width, self.height, vb) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some(vb)) => (w, w * vb.height / vb.width),
            (None, Some(h), Some(vb)) => (h * vb.width / vb.height, h),
            (None, None, Some(vb)) => (vb.width, vb.height),
            (Some(w), None, None) => (w, DEFAULT_SVG_SIZE.height as f64),
            (None, Some(h), None) => (DEFAULT_SVG_SIZE.width as f64, h),
            (None, None, None) => return DEFAULT_SVG_SIZE,
        };
        Size::new(w.max(0.0).round() as u32, h.max(0.0).round() as u32)
    }
}

/// Cheap check for an SVG document (root element named `svg`).
pub fn is_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(super::SNIFF_LEN)];
    let trimmed = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&head[..0], |start| &head[start..]);
    if !trimmed.starts_with(b"<") {
        return false;
    }
    memchr::memmem::find(head, b"<svg").is_some()
}

/// Parse a length attribute into CSS pixels.
///
/// Percentages cannot be resolved without a viewport and yield `None`.
pub fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e' || c == 'E'))
        .unwrap_or(value.len());
    // "em" would otherwise be eaten as an exponent
    let split = if value[..split].ends_with(['e', 'E']) {
        split - 1
    } else {
        split
    };
    let number: f64 = value[..split].parse().ok()?;
    let scale = match value[split..].trim() {
        "" | "px" => 1.0,
        "pt" => 4.0 / 3.0,
        "pc" => 16.0,
        "mm" => 96.0 / 25.4,
        "cm" => 96.0 / 2.54,
        "in" => 96.0,
        "em" => 16.0,
        _ => return None,
    };
    Some(number * scale)
}

fn parse_view_box(value: &str) -> Option<Rect> {
    let parts: Vec<f64> = value
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, w, h] if *w >= 0.0 && *h >= 0.0 => Some(Rect::new(*x, *y, *w, *h)),
        _ => None,
    }
}

/// Read the root element of an SVG document.
pub fn probe(data: &[u8]) -> Result<SvgInfo> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() != b"svg" {
                    return Err(Error::InvalidFormat("Root element is not <svg>".into()));
                }
                let mut info = SvgInfo {
                    width: None,
                    height: None,
                    view_box: None,
                };
                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|e| Error::ParseError(format!("SVG attribute: {}", e)))?;
                    let value = std::str::from_utf8(&attr.value)?;
                    match attr.key.local_name().as_ref() {
                        b"width" => info.width = parse_length(value),
                        b"height" => info.height = parse_length(value),
                        b"viewBox" => info.view_box = parse_view_box(value),
                        _ => {},
                    }
                }
                return Ok(info);
            },
            Ok(Event::Eof) => {
                return Err(Error::InvalidFormat("No root element in SVG".into()));
            },
            Err(e) => return Err(e.into()),
            // Declarations, comments, doctype
            _ => {},
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_size() {
        let info = probe(br#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80"/>"#)
            .unwrap();
        assert_eq!(info.size(), Size::new(120, 80));
    }

    #[test]
    fn test_units() {
        assert_eq!(parse_length("1in"), Some(96.0));
        assert_eq!(parse_length("72pt"), Some(96.0));
        assert_eq!(parse_length("2em"), Some(32.0));
        assert_eq!(parse_length("50%"), None);
    }

    #[test]
    fn test_view_box_fallback() {
        let data = br#"<?xml version="1.0"?>
            <!-- logo -->
            <svg viewBox="0 0 200 100" width="100%"><rect/></svg>"#;
        let info = probe(data).unwrap();
        assert_eq!(info.width, None);
        assert_eq!(info.size(), Size::new(200, 100));
    }

    #[test]
    fn test_aspect_from_view_box() {
        let info = probe(br#"<svg viewBox="0,0,40,20" width="80"></svg>"#).unwrap();
        assert_eq!(info.size(), Size::new(80, 40));
    }

    #[test]
    fn test_default_size() {
        assert_eq!(probe(b"<svg/>").unwrap().size(), DEFAULT_SVG_SIZE);
    }

    #[test]
    fn test_sniff() {
        assert!(is_svg(b"  <?xml version=\"1.0\"?><svg/>"));
        assert!(!is_svg(b"<html><body/></html>"));
        assert!(!is_svg(b"GIF89a<svg"));
        assert!(probe(b"<html/>").is_err());
    }
}
