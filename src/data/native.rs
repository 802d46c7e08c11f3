//! Legacy platform metafiles (EMF, WMF, PICT).
//!
//! Bounds come from the file header. The platform bridge may additionally
//! turn the bytes into a native handle that it knows how to play.

use super::Decoded;
use crate::codec::{self, PictureKind};
use crate::config::PictureConfig;
use bytes::Bytes;

pub(super) fn load(config: &PictureConfig, kind: PictureKind, bytes: Bytes) -> Decoded {
    let size = match codec::probe_size(kind, &bytes) {
        Ok(size) => size,
        Err(e) => {
            log::debug!("Unreadable {:?} header: {}", kind, e);
            return Decoded::Empty;
        },
    };
    let handle = match config.bridge.load_native(kind, &bytes) {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("Platform bridge {} failed to load {:?}: {}", config.bridge.name(), kind, e);
            None
        },
    };
    Decoded::Native { bytes, handle, size }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::metafile::tests::wmf_placeable_bytes;
    use crate::common::error::Result;
    use crate::common::geometry::{Rect, Size};
    use crate::config::{NativeHandle, PlatformBridge};
    use crate::data::PictureData;
    use crate::draw::tests::{Call, RecordingSurface};
    use crate::draw::{DrawSettings, DrawingSurface};
    use std::sync::Arc;

    /// Bridge that turns every metafile into a handle holding its length.
    struct LengthBridge;

    impl PlatformBridge for LengthBridge {
        fn name(&self) -> &str {
            "length"
        }

        fn load_native(&self, kind: PictureKind, data: &[u8]) -> Result<Option<NativeHandle>> {
            Ok(Some(NativeHandle::new(kind, data.len())))
        }

        fn draw_native(
            &self,
            _handle: &NativeHandle,
            surface: &mut dyn DrawingSurface,
            _dest: Rect,
            _settings: &DrawSettings,
        ) -> Result<()> {
            surface.begin_layer(0.25);
            surface.end_layer();
            Ok(())
        }
    }

    #[test]
    fn test_bridge_handle_is_used_for_drawing() {
        let config = Arc::new(PictureConfig::default().with_bridge(Arc::new(LengthBridge)));
        let bytes = wmf_placeable_bytes(144, 72, 72);
        let len = bytes.len();
        let data = PictureData::with_kind(config, PictureKind::Wmf, Bytes::from(bytes));

        let handle = data.native_handle().unwrap();
        assert_eq!(handle.downcast_ref::<usize>(), Some(&len));
        assert_eq!(data.bounds().width, 144.0);

        let mut surface = RecordingSurface::default();
        data.draw(&mut surface, Rect::new(0.0, 0.0, 10.0, 10.0), &DrawSettings::default())
            .unwrap();
        assert_eq!(surface.calls, vec![Call::BeginLayer(0.25), Call::EndLayer]);
    }

    #[test]
    fn test_bad_header_is_empty() {
        let decoded = load(&PictureConfig::default(), PictureKind::Emf, Bytes::from_static(b"nope"));
        assert_eq!(decoded.size(), Size::ZERO);
    }
}
