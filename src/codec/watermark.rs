//! Tiny bitmap font for stamping a battery id onto its QR image.
//!
//! Ids are rendered from their hyphenated lowercase form, so only hex digits
//! and `-` have glyphs; anything else advances the pen without drawing.

use image::{GrayImage, Luma};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

/// Largest dot size tried when fitting a stamp.
pub const MAX_SCALE: u32 = 2;

/// Characters kept when the full id does not fit.
const SHORT_LEN: usize = 8;

/// Where and how large to draw a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp<'a> {
    pub text: &'a str,
    pub x: u32,
    pub y: u32,
    /// Pixels per font dot.
    pub scale: u32,
}

impl Stamp<'_> {
    pub fn width(&self) -> u32 {
        text_width(self.text, self.scale)
    }

    pub fn height(&self) -> u32 {
        line_height(self.scale)
    }
}

fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c.to_ascii_lowercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'a' => [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'b' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b11110],
        'c' => [0b00000, 0b00000, 0b01110, 0b10000, 0b10000, 0b10001, 0b01110],
        'd' => [0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10001, 0b01111],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        'f' => [0b00110, 0b01001, 0b01000, 0b11100, 0b01000, 0b01000, 0b01000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => return None,
    };
    Some(rows)
}

/// Width in pixels that `text` occupies when drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    (n * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING) * scale
}

/// Pixel height of a line of text drawn at `scale`.
pub fn line_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Centre `text` in a `width`×`height` band with at least one dot of margin.
///
/// Tries the full text, then its first few characters, each at every scale from
/// [`MAX_SCALE`] down to 1. Returns `None` when nothing fits.
pub fn fit(text: &str, width: u32, height: u32) -> Option<Stamp<'_>> {
    let short = match text.char_indices().nth(SHORT_LEN) {
        Some((end, _)) => &text[..end],
        None => text,
    };

    for candidate in [text, short] {
        if candidate.is_empty() {
            return None;
        }
        for scale in (1..=MAX_SCALE).rev() {
            let stamp = Stamp {
                text: candidate,
                x: 0,
                y: 0,
                scale,
            };
            let (w, h) = (stamp.width(), stamp.height());
            if w + 2 * scale <= width && h + 2 * scale <= height {
                return Some(Stamp {
                    x: (width - w) / 2,
                    y: (height - h) / 2,
                    ..stamp
                });
            }
        }
    }
    None
}

/// Draw the stamp's text in black. Clipped to the image.
pub fn draw(image: &mut GrayImage, stamp: &Stamp<'_>) {
    let scale = stamp.scale;
    let advance = (GLYPH_WIDTH + GLYPH_SPACING) * scale;

    for (i, c) in stamp.text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let origin_x = stamp.x + i as u32 * advance;

        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = stamp.y + row as u32 * scale;
                fill_block(image, px, py, scale);
            }
        }
    }
}

fn fill_block(image: &mut GrayImage, x: u32, y: u32, size: u32) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px < image.width() && py < image.height() {
                image.put_pixel(px, py, Luma([0]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";

    fn dark_pixels(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p.0[0] == 0).count()
    }

    fn stamp(text: &str, x: u32, y: u32, scale: u32) -> Stamp<'_> {
        Stamp { text, x, y, scale }
    }

    #[test]
    fn test_every_uuid_char_has_a_glyph() {
        for c in "0123456789abcdefABCDEF-".chars() {
            assert!(glyph(c).is_some(), "missing glyph for {:?}", c);
        }
        assert!(glyph('z').is_none());
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("a", 1), 5);
        assert_eq!(text_width("a", 2), 10);
        // Hyphenated UUID: 36 characters.
        assert_eq!(text_width(ID, 2), (36 * 6 - 1) * 2);
    }

    #[test]
    fn test_fit_prefers_full_text_at_max_scale() {
        let s = fit(ID, 500, 35).unwrap();
        assert_eq!(s.text, ID);
        assert_eq!(s.scale, MAX_SCALE);
        assert_eq!(s.x, (500 - s.width()) / 2);
        assert!(s.y >= s.scale && s.y + s.height() + s.scale <= 35);
    }

    #[test]
    fn test_fit_shrinks_then_shortens() {
        // 430 px wide at scale 2, 215 px at scale 1.
        let s = fit(ID, 300, 35).unwrap();
        assert_eq!((s.text, s.scale), (ID, 1));

        let s = fit(ID, 150, 30).unwrap();
        assert_eq!((s.text, s.scale), ("1b4e28ba", 2));

        // Too low for scale 2.
        let s = fit(ID, 150, 12).unwrap();
        assert_eq!((s.text, s.scale), ("1b4e28ba", 1));
    }

    #[test]
    fn test_fit_gives_up_when_band_is_too_small() {
        assert_eq!(fit(ID, 500, 8), None);
        assert_eq!(fit(ID, 40, 30), None);
        assert_eq!(fit("", 500, 100), None);
    }

    #[test]
    fn test_draw_stays_inside_stamp() {
        for scale in 1..=MAX_SCALE {
            let mut image = GrayImage::from_pixel(200, 40, Luma([255]));
            let s = stamp("0f-9", 10, 10, scale);
            draw(&mut image, &s);

            assert!(dark_pixels(&image) > 0);
            for (x, y, p) in image.enumerate_pixels() {
                if p.0[0] == 0 {
                    assert!(x >= 10 && x < 10 + s.width());
                    assert!(y >= 10 && y < 10 + s.height());
                }
            }
        }
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut image = GrayImage::from_pixel(8, 8, Luma([255]));
        draw(&mut image, &stamp("8888", 4, 4, 2));
        assert!(dark_pixels(&image) > 0);
    }

    #[test]
    fn test_unknown_chars_draw_nothing() {
        let mut image = GrayImage::from_pixel(50, 20, Luma([255]));
        draw(&mut image, &stamp("xyz", 0, 0, 1));
        assert_eq!(dark_pixels(&image), 0);
    }
}
