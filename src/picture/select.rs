//! Choice of the representation used for display and for printing.
//!
//! Only renderable entries are candidates. Display prefers the richest
//! raster (largest hinted area; ties go to the earlier mime type in
//! [`SelectionPolicy::display_order`], then to insertion order). Printing
//! prefers the first vector entry. Both fall back to the first renderable
//! entry.

use crate::config::SelectionPolicy;
use crate::data::PictureData;
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::sync::Arc;

type Entries = IndexMap<String, Arc<PictureData>>;

fn first_renderable(entries: &Entries) -> Option<String> {
    entries
        .iter()
        .find(|(_, data)| data.is_renderable())
        .map(|(key, _)| key.clone())
}

/// Key of the entry to draw on screen.
pub(super) fn for_display(entries: &Entries, policy: &SelectionPolicy) -> Option<String> {
    if policy.display_prefers_raster {
        let best = entries
            .iter()
            .enumerate()
            .filter(|(_, (_, data))| data.is_renderable() && data.is_raster())
            .min_by_key(|(index, (key, data))| {
                (Reverse(data.size_hint().area()), policy.display_rank(key), *index)
            })
            .map(|(_, (key, _))| key.clone());
        if best.is_some() {
            return best;
        }
    }
    first_renderable(entries)
}

/// Key of the entry to print.
pub(super) fn for_printing(entries: &Entries, policy: &SelectionPolicy) -> Option<String> {
    if policy.print_prefers_vector {
        let vector = entries
            .iter()
            .find(|(_, data)| data.is_renderable() && data.is_vector())
            .map(|(key, _)| key.clone());
        if vector.is_some() {
            return vector;
        }
    }
    for_display(entries, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PictureKind;
    use crate::common::geometry::Size;
    use crate::config::PictureConfig;
    use bytes::Bytes;

    fn entry(kind: PictureKind, size: Size) -> Arc<PictureData> {
        let data = PictureData::with_kind(Arc::new(PictureConfig::default()), kind, Bytes::from_static(b"x"));
        data.set_declared_size(Some(size));
        Arc::new(data)
    }

    fn entries(list: Vec<Arc<PictureData>>) -> Entries {
        list.into_iter().map(|d| (d.key().to_string(), d)).collect()
    }

    #[test]
    fn test_richest_raster_for_display() {
        let map = entries(vec![
            entry(PictureKind::Svg, Size::new(1000, 1000)),
            entry(PictureKind::Jpeg, Size::new(10, 10)),
            entry(PictureKind::Png, Size::new(20, 20)),
        ]);
        let policy = SelectionPolicy::default();
        assert_eq!(for_display(&map, &policy).as_deref(), Some("image/png"));
        assert_eq!(for_printing(&map, &policy).as_deref(), Some("image/svg+xml"));
    }

    #[test]
    fn test_ties_follow_display_order() {
        let map = entries(vec![
            entry(PictureKind::Gif, Size::new(10, 10)),
            entry(PictureKind::Jpeg, Size::new(10, 10)),
        ]);
        assert_eq!(
            for_display(&map, &SelectionPolicy::default()).as_deref(),
            Some("image/jpeg")
        );
    }

    #[test]
    fn test_policy_overrides() {
        let map = entries(vec![
            entry(PictureKind::Svg, Size::new(10, 10)),
            entry(PictureKind::Png, Size::new(10, 10)),
        ]);
        let policy = SelectionPolicy {
            print_prefers_vector: false,
            display_prefers_raster: false,
            ..SelectionPolicy::default()
        };
        assert_eq!(for_display(&map, &policy).as_deref(), Some("image/svg+xml"));
        assert_eq!(for_printing(&map, &policy).as_deref(), Some("image/svg+xml"));
    }

    #[test]
    fn test_opaque_never_selected() {
        let blob = Arc::new(PictureData::blob(
            Arc::new(PictureConfig::default()),
            "application/x-thing",
            Bytes::from_static(b"?"),
        ));
        let map = entries(vec![blob]);
        assert_eq!(for_display(&map, &SelectionPolicy::default()), None);
        assert_eq!(for_printing(&map, &SelectionPolicy::default()), None);
    }
}
