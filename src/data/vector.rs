//! SVG documents. Only the root element is read; the bytes go to the
//! surface as they are.

use super::Decoded;
use crate::codec::svg;
use bytes::Bytes;

pub(super) fn load(bytes: Bytes) -> Decoded {
    match svg::probe(&bytes) {
        Ok(info) => Decoded::Vector {
            size: info.size(),
            bytes,
        },
        Err(e) => {
            log::debug!("Unreadable SVG document: {}", e);
            Decoded::Empty
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::Size;

    #[test]
    fn test_load_reads_root_size() {
        let decoded = load(Bytes::from_static(b"<svg viewBox='0 0 40 20' width='80'/>"));
        assert_eq!(decoded.size(), Size::new(80, 40));
        assert!(matches!(load(Bytes::from_static(b"<html/>")), Decoded::Empty));
    }
}
