//! Pixel helpers for the LED frame buffer, in the style of the usual
//! addressable-LED toolkits: saturating adds, fades, blur and HSV fills.

use smart_leds::hsv::{hsv2rgb, Hsv};

use super::Rgb;

pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
pub const WHITE: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 255,
};

/// Converts hue/saturation/value bytes to RGB.
pub fn hsv(hue: u8, sat: u8, val: u8) -> Rgb {
    hsv2rgb(Hsv { hue, sat, val })
}

/// Maps a `[0, 1]` level onto a byte, clamping out-of-range input.
pub fn unit_to_byte(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 255.0) as u8
}

pub fn add(a: Rgb, b: Rgb) -> Rgb {
    Rgb {
        r: a.r.saturating_add(b.r),
        g: a.g.saturating_add(b.g),
        b: a.b.saturating_add(b.b),
    }
}

/// Scales a colour by `scale / 256`.
pub fn scale(color: Rgb, scale: u8) -> Rgb {
    let apply = |c: u8| ((u16::from(c) * (u16::from(scale) + 1)) >> 8) as u8;
    Rgb {
        r: apply(color.r),
        g: apply(color.g),
        b: apply(color.b),
    }
}

/// Dims every pixel by `amount / 256` of its current brightness.
pub fn fade_to_black(leds: &mut [Rgb], amount: u8) {
    for led in leds.iter_mut() {
        *led = scale(*led, 255 - amount);
    }
}

pub fn fill_solid(leds: &mut [Rgb], color: Rgb) {
    leds.fill(color);
}

/// Rainbow starting at `hue`, advancing `delta` per pixel.
pub fn fill_rainbow(leds: &mut [Rgb], hue: u8, delta: u8) {
    let mut current = hue;
    for led in leds.iter_mut() {
        *led = hsv(current, 255, 255);
        current = current.wrapping_add(delta);
    }
}

/// Linear RGB gradient between two colours.
pub fn fill_gradient(leds: &mut [Rgb], from: Rgb, to: Rgb) {
    let last = leds.len().saturating_sub(1).max(1) as i32;
    let lerp = |a: u8, b: u8, i: i32| {
        (i32::from(a) + (i32::from(b) - i32::from(a)) * i / last) as u8
    };
    for (i, led) in leds.iter_mut().enumerate() {
        let i = i as i32;
        *led = Rgb {
            r: lerp(from.r, to.r, i),
            g: lerp(from.g, to.g, i),
            b: lerp(from.b, to.b, i),
        };
    }
}

/// One-dimensional blur: each pixel keeps `255 - amount` of itself and
/// shares `amount / 2` with each neighbour.
pub fn blur(leds: &mut [Rgb], amount: u8) {
    let keep = 255 - amount;
    let seep = amount >> 1;
    let mut carry = BLACK;
    for i in 0..leds.len() {
        let part = scale(leds[i], seep);
        let kept = add(scale(leds[i], keep), carry);
        if i > 0 {
            leds[i - 1] = add(leds[i - 1], part);
        }
        leds[i] = kept;
        carry = part;
    }
}

/// Heat-map palette: black → red → yellow → white.
pub fn heat_color(temperature: u8) -> Rgb {
    let t192 = ((u16::from(temperature) * 191) / 255) as u8;
    let ramp = (t192 & 0x3F) << 2;
    if t192 & 0x80 != 0 {
        Rgb {
            r: 255,
            g: 255,
            b: ramp,
        }
    } else if t192 & 0x40 != 0 {
        Rgb {
            r: 255,
            g: ramp,
            b: 0,
        }
    } else {
        Rgb { r: ramp, g: 0, b: 0 }
    }
}

/// Eight-bit sine: `0..=255` in, `0..=255` out, centred on 128.
pub fn sin8(theta: u8) -> u8 {
    let radians = f32::from(theta) / 256.0 * core::f32::consts::TAU;
    (128.0 + 127.0 * radians.sin()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates() {
        let sum = add(Rgb::new(200, 10, 0), Rgb::new(100, 10, 0));
        assert_eq!(sum, Rgb::new(255, 20, 0));
    }

    #[test]
    fn fade_reaches_black() {
        let mut leds = [WHITE; 4];
        for _ in 0..64 {
            fade_to_black(&mut leds, 64);
        }
        assert!(leds.iter().all(|led| *led == BLACK));
    }

    #[test]
    fn blur_spreads_light_to_neighbours() {
        let mut leds = [BLACK, WHITE, BLACK];
        blur(&mut leds, 128);
        assert!(leds[0].r > 0);
        assert!(leds[2].r > 0);
        assert!(leds[1].r < 255);
    }

    #[test]
    fn gradient_hits_both_ends() {
        let mut leds = [BLACK; 5];
        fill_gradient(&mut leds, Rgb::new(0, 0, 0), Rgb::new(200, 100, 0));
        assert_eq!(leds[0], Rgb::new(0, 0, 0));
        assert_eq!(leds[4], Rgb::new(200, 100, 0));
    }

    #[test]
    fn heat_palette_is_monotonic_in_red() {
        assert_eq!(heat_color(0), BLACK);
        assert_eq!(heat_color(255).r, 255);
        assert!(heat_color(60).r > heat_color(20).r);
    }

    #[test]
    fn sin8_is_centred() {
        assert_eq!(sin8(0), 128);
        assert!(sin8(64) > 250);
        assert!(sin8(192) < 5);
    }
}
