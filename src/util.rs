pub fn linspace(start: f64, end: f64, num: usize, endpoint: bool) -> Vec<f64> {
    if num == 0 { return Vec::new(); }
    if num == 1 { return vec![start]; }
    let step = if endpoint {
        (end - start) / (num - 1) as f64
    } else {
        (end - start) / num as f64
    };
    (0..num).map(|i| start + i as f64 * step).collect()
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Snaps `x` in [-1, 1] to the nearest of `2^bits` evenly spaced levels.
pub fn quantize(x: f64, bits: u32) -> f64 {
    let levels = ((1u64 << bits.min(32)) - 1).max(1) as f64;
    let x = x.clamp(-1.0, 1.0);
    ((x + 1.0) * levels / 2.0).round() * 2.0 / levels - 1.0
}
