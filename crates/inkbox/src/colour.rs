//! Ink colour helpers.

use glam::{Vec3, Vec4};

/// HSV to RGB with `h` in turns (`[0, 1)` wraps), `s` and `v` in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let c = v * s;
    let h_prime = h.rem_euclid(1.0) * 6.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Vec3::new(r + m, g + m, b + m)
}

/// Rainbow-mode ink colour after `elapsed` seconds at `rate` hue turns per second.
pub fn rainbow_colour(elapsed: f32, rate: f32, alpha: f32) -> Vec4 {
    hsv_to_rgb(elapsed * rate, 1.0, 1.0).extend(alpha)
}
