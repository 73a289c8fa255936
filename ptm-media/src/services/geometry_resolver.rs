//! Source placement geometry
//!
//! Computes the single affine transform that takes a source frame (natural
//! pixel size, intrinsic orientation) to its spot in the render: orientation,
//! extra user rotation, normalized crop, uniform scale, then placement into
//! the destination rectangle under a [`ContentMode`].

use ptm_common::models::{normalize_quarter_turns, NormalizedRect};

use crate::models::{AffineTransform, ContentMode, Rect, Size};

/// Upright size of a source after its orientation transform
pub fn oriented_size(natural: Size, orientation: &AffineTransform) -> Size {
    orientation.apply_to_rect(&Rect::from_size(natural)).size()
}

/// Size after an additional clockwise rotation of `turns` quarter turns
pub fn rotated_size(size: Size, turns: i64) -> Size {
    if normalize_quarter_turns(turns) % 2 == 1 {
        size.swapped()
    } else {
        size
    }
}

/// Crop rectangle in pixels of a frame of `frame` size
pub fn crop_in_pixels(frame: Size, crop: &NormalizedRect) -> Rect {
    let crop = crop.clamped();
    Rect::new(
        crop.x * frame.width,
        crop.y * frame.height,
        crop.width * frame.width,
        crop.height * frame.height,
    )
}

/// Uniform scale taking a `content` box into `destination` under `mode`
pub fn scale_factor(content: Size, destination: Size, mode: ContentMode) -> f64 {
    let sx = destination.width / content.width;
    let sy = destination.height / content.height;
    match mode {
        ContentMode::Fill => sx.max(sy),
        ContentMode::Fit | ContentMode::FitLeading => sx.min(sy),
    }
}

/// Re-anchor `transform` so the transformed `rect` starts at the origin
fn normalized_to_origin(transform: AffineTransform, rect: &Rect) -> AffineTransform {
    let bounds = transform.apply_to_rect(rect);
    transform.then(&AffineTransform::translation(-bounds.x, -bounds.y))
}

/// Transform placing a source into `destination`
///
/// Degenerate input (empty natural size, empty destination, non-finite
/// values) yields the identity transform.
pub fn placed_transform(
    natural: Size,
    orientation: &AffineTransform,
    destination: &Rect,
    mode: ContentMode,
    rotation_quarter_turns: i64,
    crop: &NormalizedRect,
) -> AffineTransform {
    if !natural.is_drawable() || !destination.is_drawable() {
        return AffineTransform::IDENTITY;
    }

    let source = Rect::from_size(natural);
    let upright = normalized_to_origin(*orientation, &source);
    let upright_size = upright.apply_to_rect(&source).size();
    if !upright_size.is_drawable() {
        return AffineTransform::IDENTITY;
    }

    let rotation = AffineTransform::quarter_turns(i64::from(normalize_quarter_turns(
        rotation_quarter_turns,
    )));
    let rotated = normalized_to_origin(rotation, &Rect::from_size(upright_size));
    let rotated_size = rotated_size(upright_size, rotation_quarter_turns);

    let crop_rect = crop_in_pixels(rotated_size, crop);
    if !crop_rect.size().is_drawable() {
        return AffineTransform::IDENTITY;
    }

    let scale = scale_factor(crop_rect.size(), destination.size(), mode);
    if !scale.is_finite() || scale <= 0.0 {
        return AffineTransform::IDENTITY;
    }

    let scaled_width = crop_rect.width * scale;
    let scaled_height = crop_rect.height * scale;
    let offset_x = match mode {
        ContentMode::FitLeading => destination.x,
        ContentMode::Fill | ContentMode::Fit => {
            destination.x + (destination.width - scaled_width) / 2.0
        }
    };
    let offset_y = destination.y + (destination.height - scaled_height) / 2.0;

    upright
        .then(&rotated)
        .then(&AffineTransform::translation(-crop_rect.x, -crop_rect.y))
        .then(&AffineTransform::scale(scale, scale))
        .then(&AffineTransform::translation(offset_x, offset_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_full_frame_fill_is_identity() {
        let transform = placed_transform(
            Size::new(1920.0, 1080.0),
            &AffineTransform::IDENTITY,
            &Rect::new(0.0, 0.0, 1920.0, 1080.0),
            ContentMode::Fill,
            0,
            &NormalizedRect::FULL,
        );

        assert_eq!(transform.scale_factor(), 1.0);
        assert_eq!(transform.tx, 0.0);
        assert_eq!(transform.ty, 0.0);
        assert!(transform.is_identity());
    }

    #[test]
    fn test_degenerate_inputs_yield_identity() {
        let dest = Rect::new(0.0, 0.0, 100.0, 100.0);
        let zero = placed_transform(
            Size::ZERO,
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::Fit,
            1,
            &NormalizedRect::FULL,
        );
        assert!(zero.is_identity());

        let empty_dest = placed_transform(
            Size::new(640.0, 480.0),
            &AffineTransform::IDENTITY,
            &Rect::new(0.0, 0.0, 0.0, 50.0),
            ContentMode::Fill,
            0,
            &NormalizedRect::FULL,
        );
        assert!(empty_dest.is_identity());

        let nan = placed_transform(
            Size::new(f64::NAN, 480.0),
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::Fill,
            0,
            &NormalizedRect::FULL,
        );
        assert!(nan.is_identity());
    }

    #[test]
    fn test_rotation_normalizes_and_four_turns_restore_size() {
        let size = Size::new(1920.0, 1080.0);
        for turns in -9..=9 {
            let n = normalize_quarter_turns(turns);
            assert!(n <= 3);
            assert_eq!(rotated_size(size, turns), rotated_size(size, i64::from(n)));

            let rotated = rotated_size(size, turns);
            let back = (0..4).fold(rotated, |s, _| rotated_size(s, 1));
            assert_eq!(back, rotated);
        }
    }

    #[test]
    fn test_oriented_size_of_portrait_recording() {
        let natural = Size::new(1920.0, 1080.0);
        let size = oriented_size(natural, &AffineTransform::quarter_turns(1));
        assert_eq!(size, Size::new(1080.0, 1920.0));
    }

    #[test]
    fn test_fit_rotated_source_lands_inside_destination() {
        let natural = Size::new(1920.0, 1080.0);
        let dest = Rect::new(20.0, 500.0, 300.0, 200.0);
        for turns in 0..4 {
            let transform = placed_transform(
                natural,
                &AffineTransform::IDENTITY,
                &dest,
                ContentMode::Fit,
                turns,
                &NormalizedRect::FULL,
            );
            let placed = transform.apply_to_rect(&Rect::from_size(natural));
            assert!(dest.contains_rect(&placed, EPS), "turns={} placed={:?}", turns, placed);
        }
    }

    #[test]
    fn test_fit_leading_is_flush_left_and_centred_vertically() {
        let natural = Size::new(1000.0, 1000.0);
        let dest = Rect::new(10.0, 10.0, 400.0, 200.0);
        let transform = placed_transform(
            natural,
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::FitLeading,
            0,
            &NormalizedRect::FULL,
        );
        let placed = transform.apply_to_rect(&Rect::from_size(natural));
        assert!((placed.x - 10.0).abs() < EPS);
        assert!((placed.y - 10.0).abs() < EPS);
        assert!((placed.width - 200.0).abs() < EPS);

        let centred = placed_transform(
            natural,
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::Fit,
            0,
            &NormalizedRect::FULL,
        )
        .apply_to_rect(&Rect::from_size(natural));
        assert!((centred.x - 110.0).abs() < EPS);
    }

    #[test]
    fn test_fill_covers_destination() {
        let natural = Size::new(1920.0, 1080.0);
        let dest = Rect::new(0.0, 0.0, 500.0, 500.0);
        let transform = placed_transform(
            natural,
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::Fill,
            0,
            &NormalizedRect::FULL,
        );
        let placed = transform.apply_to_rect(&Rect::from_size(natural));
        assert!(placed.contains_rect(&dest, EPS));
        assert!((transform.scale_factor() - 500.0 / 1080.0).abs() < EPS);
    }

    #[test]
    fn test_crop_region_maps_onto_destination() {
        let natural = Size::new(1000.0, 500.0);
        let crop = NormalizedRect::new(0.5, 0.5, 0.5, 0.5);
        let dest = Rect::new(0.0, 0.0, 250.0, 125.0);
        let transform = placed_transform(
            natural,
            &AffineTransform::IDENTITY,
            &dest,
            ContentMode::Fill,
            0,
            &crop,
        );

        let (x, y) = transform.apply(500.0, 250.0);
        assert!(x.abs() < EPS && y.abs() < EPS);
        let (x, y) = transform.apply(1000.0, 500.0);
        assert!((x - 250.0).abs() < EPS && (y - 125.0).abs() < EPS);
    }

    #[test]
    fn test_crop_pixels_respect_minimum_dimension() {
        let rect = crop_in_pixels(
            Size::new(1000.0, 1000.0),
            &NormalizedRect::new(0.99, 0.99, 0.0, 0.0),
        );
        assert!((rect.width - 50.0).abs() < EPS);
        assert!(rect.max_x() <= 1000.0 + EPS);
        assert!(rect.max_y() <= 1000.0 + EPS);
    }
}
