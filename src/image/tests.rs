use std::f32::consts::TAU;

use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(rows: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in rows.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            image.buf[(x as u32, y as u32)] = Rgba(color.0);
        }
    }
    image
}

#[test]
fn view_data() {
    let image = mkimage([
        [C::BLUE, C::WHITE, C::WHITE],
        [C::WHITE, C::RED, C::WHITE],
        [C::WHITE, C::WHITE, C::WHITE],
    ]);

    let view = ViewData::full(&image);
    assert_eq!(view.width(), 3.0);
    assert_eq!(view.height(), 3.0);
    assert_eq!(view.rect(), Rect::from_top_left(0.0, 0.0, 3.0, 3.0));

    let center = view.view(Rect::from_top_left(1.0, 1.0, 1.0, 1.0));
    assert_eq!(center.rect(), Rect::from_top_left(0.0, 0.0, 1.0, 1.0));
    assert_eq!(center.rect, Rect::from_top_left(1.0, 1.0, 1.0, 1.0).into());
    assert_eq!(center.get(0, 0, &image), C::RED);

    let top_left = center.view(Rect::from_top_left(-1.0, -1.0, 2.0, 2.0));
    assert_eq!(top_left.rect, Rect::from_top_left(0.0, 0.0, 2.0, 2.0).into());
    assert_eq!(top_left.get(0, 0, &image), C::BLUE);

    let bottom_right = view.view(Rect::from_top_left(1.0, 1.0, 2.0, 2.0));
    let nested = bottom_right.view(Rect::from_top_left(1.0, 1.0, 2.0, 2.0));
    assert_eq!(nested.rect, Rect::from_top_left(2.0, 2.0, 2.0, 2.0).into());
    assert_eq!(nested.get(0, 0, &image), C::WHITE);
    assert_eq!(nested.get(1, 1, &image), C::NULL);
}

#[test]
fn rotated_views() {
    #[rustfmt::skip]
    let image = mkimage([
        [C::BLUE, C::WHITE],
        [C::WHITE, C::RED],
    ]);
    let full = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);

    let no_rot = image.view(RotatedRect::new(full, 0.0));
    assert_eq!(no_rot.get(0, 0), C::BLUE);
    assert_eq!(no_rot.get(1, 1), C::RED);

    let flip = image.view(RotatedRect::new(full, TAU / 2.0));
    assert_eq!(flip.get(0, 0), C::RED);
    assert_eq!(flip.get(1, 0), C::WHITE);
    assert_eq!(flip.get(1, 1), C::BLUE);

    let right_angle = image.view(RotatedRect::new(full, TAU / 4.0));
    assert_eq!(right_angle.get(0, 0), C::WHITE);
    assert_eq!(right_angle.get(1, 0), C::RED);
    assert_eq!(right_angle.get(0, 1), C::BLUE);
    assert_eq!(right_angle.get(1, 1), C::WHITE);

    // Two chained quarter turns are a half turn.
    let twice = right_angle.view(RotatedRect::new(full, TAU / 4.0));
    assert_eq!(twice.get(0, 0), C::RED);
    assert_eq!(twice.get(1, 1), C::BLUE);
}

#[test]
fn view() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::bounding([[1.0, 0.0], [2.0, 1.0]]).unwrap());
    assert_eq!(view.width(), 1);
    assert_eq!(view.height(), 1);
    assert_eq!(view.get(0, 0), C::GREEN);

    let view = image.view(Rect::bounding([[1.0, 0.0], [100.0, 100.0]]).unwrap());
    assert_eq!(view.width(), 99);
    assert_eq!(view.height(), 100);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);
}

#[test]
fn view_mut_ignores_outside_writes() {
    let mut image = mkimage([[C::RED, C::GREEN]]);
    let mut view = image.view_mut(Rect::from_top_left(1.0, 0.0, 2.0, 1.0));
    view.set(0, 0, C::BLUE);
    view.set(1, 0, C::BLUE);
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 0), C::BLUE);
}

#[test]
fn flip_horizontal() {
    let mut image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 0), C::GREEN);
    assert_eq!(image.get(2, 0), C::RED);
}

#[test]
fn clear() {
    let mut image = Image::new(3, 2);
    assert_eq!(image.get(2, 1), C::NULL);
    image.clear(C::WHITE);
    assert!(image.data().iter().all(|&b| b == 255));
}
