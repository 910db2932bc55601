//! Preview overlay for highlighted asset options.

use std::sync::Arc;

use tracing::debug;

use super::geometry::{Rect, Size};
use crate::api::{AssetApi, AssetKind};
use crate::cache::DecodedImage;

/// The asset an option previews.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewTarget {
    pub kind: AssetKind,
    pub name: String,
}

impl PreviewTarget {
    pub fn new(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// A preview fetch the host should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub generation: u64,
    pub target: PreviewTarget,
}

impl PreviewRequest {
    pub async fn run(self, api: &AssetApi) -> PreviewResponse {
        let image = api
            .preview(self.target.kind, &self.target.name)
            .await
            .map_err(|e| e.to_string());
        PreviewResponse {
            generation: self.generation,
            image,
        }
    }
}

/// Result of a [`PreviewRequest`], handed back to the popup.
#[derive(Debug, Clone)]
pub struct PreviewResponse {
    pub generation: u64,
    pub image: Result<Option<Arc<DecodedImage>>, String>,
}

/// The overlay currently on display.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub target: PreviewTarget,
    pub image: Arc<DecodedImage>,
}

#[derive(Debug, Default)]
pub struct PreviewSlot {
    generation: u64,
    in_flight: Option<PreviewTarget>,
    pending: Option<PreviewRequest>,
    shown: Option<Preview>,
}

impl PreviewSlot {
    /// Remove any overlay and forget any in-flight request.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.pending = None;
        self.shown = None;
    }

    /// Replace the overlay with a fetch for `target`.
    pub fn request(&mut self, target: PreviewTarget) {
        self.clear();
        self.in_flight = Some(target.clone());
        self.pending = Some(PreviewRequest {
            generation: self.generation,
            target,
        });
    }

    pub fn take_request(&mut self) -> Option<PreviewRequest> {
        self.pending.take()
    }

    /// Apply a finished fetch. Stale responses are dropped; failures and
    /// missing previews leave no overlay.
    pub fn apply(&mut self, response: PreviewResponse) -> bool {
        if response.generation != self.generation {
            debug!(
                got = response.generation,
                want = self.generation,
                "stale preview dropped"
            );
            return false;
        }
        let Some(target) = self.in_flight.take() else {
            return false;
        };
        match response.image {
            Ok(Some(image)) => {
                self.shown = Some(Preview { target, image });
                true
            }
            Ok(None) => false,
            Err(err) => {
                debug!(name = %target.name, error = %err, "preview failed");
                self.shown = None;
                false
            }
        }
    }

    pub fn shown(&self) -> Option<&Preview> {
        self.shown.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Position an overlay of `overlay` size beside `popup`, inside `viewport`.
///
/// Prefers the right side, flips to the left when that overflows, and
/// finally clamps to the viewport edges.
pub fn place_overlay(popup: Rect, overlay: Size, viewport: Rect) -> Rect {
    let mut x = popup.right();
    if x + overlay.width > viewport.right() {
        x = popup.x - overlay.width;
    }
    if x < viewport.x {
        x = (viewport.right() - overlay.width).max(viewport.x);
    }

    let mut y = popup.y;
    if y + overlay.height > viewport.bottom() {
        y = viewport.bottom() - overlay.height;
    }
    y = y.max(viewport.y);

    Rect::new(x, y, overlay.width, overlay.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{decode_image, fixtures};
    use pretty_assertions::assert_eq;

    fn image() -> Arc<DecodedImage> {
        Arc::new(decode_image(Arc::new(fixtures::png(2, 2))).unwrap())
    }

    #[test]
    fn test_apply_matching_generation() {
        let mut slot = PreviewSlot::default();
        slot.request(PreviewTarget::new(AssetKind::Lora, "a"));
        let req = slot.take_request().unwrap();
        assert!(slot.is_loading());

        assert!(slot.apply(PreviewResponse {
            generation: req.generation,
            image: Ok(Some(image())),
        }));
        assert_eq!(slot.shown().unwrap().target.name, "a");
        assert!(!slot.is_loading());
    }

    #[test]
    fn test_stale_response_is_ignored() {
        let mut slot = PreviewSlot::default();
        slot.request(PreviewTarget::new(AssetKind::Lora, "a"));
        let old = slot.take_request().unwrap();
        slot.request(PreviewTarget::new(AssetKind::Lora, "b"));

        assert!(!slot.apply(PreviewResponse {
            generation: old.generation,
            image: Ok(Some(image())),
        }));
        assert!(slot.shown().is_none());
        assert!(slot.is_loading());
    }

    #[test]
    fn test_failure_leaves_no_overlay() {
        let mut slot = PreviewSlot::default();
        slot.request(PreviewTarget::new(AssetKind::Embedding, "e"));
        let req = slot.take_request().unwrap();
        assert!(!slot.apply(PreviewResponse {
            generation: req.generation,
            image: Err("boom".into()),
        }));
        assert!(slot.shown().is_none());
        assert!(!slot.is_loading());
    }

    #[test]
    fn test_response_after_clear_is_ignored() {
        let mut slot = PreviewSlot::default();
        slot.request(PreviewTarget::new(AssetKind::Lora, "a"));
        let req = slot.take_request().unwrap();
        slot.clear();
        assert!(!slot.apply(PreviewResponse {
            generation: req.generation,
            image: Ok(Some(image())),
        }));
    }

    #[test]
    fn test_place_overlay_right_then_flip_then_clamp() {
        let viewport = Rect::new(0, 0, 80, 24);

        let right = place_overlay(Rect::new(10, 2, 20, 10), Size::new(16, 8), viewport);
        assert_eq!(right, Rect::new(30, 2, 16, 8));

        let flipped = place_overlay(Rect::new(50, 2, 20, 10), Size::new(16, 8), viewport);
        assert_eq!(flipped, Rect::new(34, 2, 16, 8));

        let clamped = place_overlay(Rect::new(5, 20, 70, 4), Size::new(16, 8), viewport);
        assert_eq!(clamped, Rect::new(64, 16, 16, 8));
    }
}
