//! Entry whose payload is a whole nested picture.

use super::Decoded;
use crate::config::PictureConfig;
use crate::format::ReadOptions;
use crate::picture::Picture;
use crate::provider::PictureDataProvider;
use std::sync::Arc;

/// Parse the nested container. Its entries stay lazy.
pub(super) fn load(config: &Arc<PictureConfig>, provider: Arc<PictureDataProvider>) -> Decoded {
    match Picture::from_provider_with(Arc::clone(config), provider, &ReadOptions::default()) {
        Ok(picture) => Decoded::Embedded { picture },
        Err(e) => {
            log::warn!("Unreadable nested picture: {}", e);
            Decoded::Empty
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::PictureKind;
    use crate::data::tests::{config, png_data};
    use crate::data::{PictureData, VariantKind};
    use crate::picture::Picture;
    use bytes::Bytes;
    use std::sync::Arc;

    #[test]
    fn test_nested_capabilities_follow_display_entry() {
        let inner = Picture::from_picture_data_with(config(), Arc::new(png_data(7, 3)));
        let bytes = inner.value_bytes().unwrap();

        let data = PictureData::with_kind(config(), PictureKind::Picture, bytes.clone());
        assert_eq!(data.variant_kind(), VariantKind::Embedded);
        assert!(data.is_raster() && !data.is_vector() && data.is_renderable());
        assert_eq!(data.size_hint().width, 7);
        assert_eq!(data.embedded_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_from_picture_survives_reset() {
        let picture = Picture::from_picture_data_with(config(), Arc::new(png_data(2, 2)));
        let data = PictureData::from_picture(picture);
        assert!(data.is_loaded());
        data.reset();
        assert_eq!(data.width(), 2);
        assert_eq!(data.decode_count(), 0);
    }

    #[test]
    fn test_garbage_is_empty() {
        let data = PictureData::with_kind(config(), PictureKind::Picture, Bytes::from_static(b"PCTV\x07\x00"));
        assert!(!data.is_renderable());
        assert_eq!(data.bounds().width, 0.0);
    }
}
