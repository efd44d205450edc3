//! Linear scales, tick generation and line smoothing for the trend chart.
//!
//! Tick placement and number formatting follow the conventions of d3's
//! linear scale (`ticks(start, stop, count)`, `",f"` with precision taken
//! from the tick step) so charts read the same as their browser
//! counterparts. Line paths use monotone-X cubic interpolation, which never
//! overshoots the data between two samples.

use std::fmt::Write as FmtWrite;

/// Maps a continuous domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        ticks(self.domain.0, self.domain.1, count)
    }

    /// Spacing between neighbouring ticks.
    pub fn tick_step(&self, count: usize) -> f64 {
        let (lo, hi) = ordered(self.domain);
        match tick_spec(lo, hi, count as f64) {
            Some((_, _, inc)) if inc < 0.0 => -1.0 / inc,
            Some((_, _, inc)) => inc,
            None => 0.0,
        }
    }
}

fn ordered((a, b): (f64, f64)) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// `(first index, last index, increment)`; a negative increment means the
/// tick value is `index / -increment`, which keeps decimal steps exact.
fn tick_spec(start: f64, stop: f64, count: f64) -> Option<(i64, i64, f64)> {
    let step = (stop - start) / count.max(0.0);
    if !step.is_finite() || step <= 0.0 {
        return None;
    }
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };

    let (i1, i2, inc) = if power < 0.0 {
        let scaled = 10f64.powf(-power) / factor;
        let mut i1 = (start * scaled).round() as i64;
        let mut i2 = (stop * scaled).round() as i64;
        if (i1 as f64) / scaled < start {
            i1 += 1;
        }
        if (i2 as f64) / scaled > stop {
            i2 -= 1;
        }
        (i1, i2, -scaled)
    } else {
        let scaled = 10f64.powf(power) * factor;
        let mut i1 = (start / scaled).round() as i64;
        let mut i2 = (stop / scaled).round() as i64;
        if (i1 as f64) * scaled < start {
            i1 += 1;
        }
        if (i2 as f64) * scaled > stop {
            i2 -= 1;
        }
        (i1, i2, scaled)
    };

    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_spec(start, stop, count * 2.0);
    }
    Some((i1, i2, inc))
}

/// Roughly `count` evenly spaced, human-friendly values covering
/// `[start, stop]`, returned in the direction of the input.
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }

    let reverse = stop < start;
    let (lo, hi) = if reverse { (stop, start) } else { (start, stop) };
    let Some((i1, i2, inc)) = tick_spec(lo, hi, count as f64) else {
        return Vec::new();
    };
    if i2 < i1 {
        return Vec::new();
    }

    let mut values: Vec<f64> = (i1..=i2)
        .map(|i| {
            if inc < 0.0 {
                i as f64 / -inc
            } else {
                i as f64 * inc
            }
        })
        .collect();
    if reverse {
        values.reverse();
    }
    values
}

// ── Tick formats ────────────────────────────────────────────────────────────

/// Whole-percent label, e.g. `0.25` → `25%`.
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// Fixed-point label with thousands grouping, precision derived from the
/// tick step so neighbouring labels stay distinct.
pub fn format_number(value: f64, step: f64) -> String {
    let precision = if step > 0.0 && step.is_finite() {
        (-step.log10().floor()).max(0.0) as usize
    } else {
        0
    };
    let formatted = format!("{:.*}", precision, value.abs());
    let zero = formatted.chars().all(|c| c == '0' || c == '.');

    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut out = String::with_capacity(formatted.len() + 4);
    if value < 0.0 && !zero {
        out.push('\u{2212}');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Compact coordinate text for SVG attributes.
pub fn fmt_coord(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

// ── Line smoothing ──────────────────────────────────────────────────────────

fn sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Tangent at `p1` from its two neighbours, clamped to keep the curve
/// monotone between samples.
fn interior_tangent(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let h0 = p1.0 - p0.0;
    let h1 = p2.0 - p1.0;
    let s0 = if h0 != 0.0 { (p1.1 - p0.1) / h0 } else { 0.0 };
    let s1 = if h1 != 0.0 { (p2.1 - p1.1) / h1 } else { 0.0 };
    let p = (s0 * h1 + s1 * h0) / (h0 + h1);
    let t = (sign(s0) + sign(s1)) * s0.abs().min(s1.abs()).min(0.5 * p.abs());
    if t.is_finite() {
        t
    } else {
        0.0
    }
}

/// Tangent at an end point from the segment slope and the neighbour tangent.
fn end_tangent(p0: (f64, f64), p1: (f64, f64), neighbour: f64) -> f64 {
    let h = p1.0 - p0.0;
    if h != 0.0 {
        (3.0 * (p1.1 - p0.1) / h - neighbour) / 2.0
    } else {
        neighbour
    }
}

/// SVG path data through `points` (already in pixel space, ascending x).
pub fn monotone_x_path(points: &[(f64, f64)]) -> String {
    let mut d = String::new();
    match points {
        [] => return d,
        [(x, y)] => {
            write!(d, "M{},{}", fmt_coord(*x), fmt_coord(*y)).unwrap();
            return d;
        }
        [(x0, y0), (x1, y1)] => {
            write!(
                d,
                "M{},{}L{},{}",
                fmt_coord(*x0),
                fmt_coord(*y0),
                fmt_coord(*x1),
                fmt_coord(*y1)
            )
            .unwrap();
            return d;
        }
        _ => {}
    }

    let n = points.len();
    let mut tangents = vec![0.0; n];
    for i in 1..n - 1 {
        tangents[i] = interior_tangent(points[i - 1], points[i], points[i + 1]);
    }
    tangents[0] = end_tangent(points[0], points[1], tangents[1]);
    tangents[n - 1] = end_tangent(points[n - 2], points[n - 1], tangents[n - 2]);

    write!(d, "M{},{}", fmt_coord(points[0].0), fmt_coord(points[0].1)).unwrap();
    for i in 0..n - 1 {
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let dx = (x1 - x0) / 3.0;
        write!(
            d,
            "C{},{},{},{},{},{}",
            fmt_coord(x0 + dx),
            fmt_coord(y0 + dx * tangents[i]),
            fmt_coord(x1 - dx),
            fmt_coord(y1 - dx * tangents[i + 1]),
            fmt_coord(x1),
            fmt_coord(y1)
        )
        .unwrap();
    }
    d
}
