use serde::Serialize;

use crate::analyzers::types::Point;

/// Least-squares line over a set of points, with the x range it was fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    pub x_min: f64,
    pub x_max: f64,
}

impl TrendLine {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// The two endpoints spanning the fitted x range.
    pub fn segment(&self) -> [Point; 2] {
        [
            Point::new(self.x_min, self.at(self.x_min)),
            Point::new(self.x_max, self.at(self.x_max)),
        ]
    }
}

/// Fits `y = m·x + b` by ordinary least squares.
///
/// Returns `None` for fewer than two points or when every x is the same.
pub fn fit_line(points: &[Point]) -> Option<TrendLine> {
    if points.len() < 2 {
        return None;
    }

    let x_min = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    if x_min == x_max {
        return None;
    }

    // Sums are taken over x shifted by x_min; epoch milliseconds squared lose
    // too much precision otherwise.
    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let x = p.x - x_min;
        sum_x += x;
        sum_y += p.y;
        sum_xy += x * p.y;
        sum_xx += x * x;
    }

    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let shifted_intercept = (sum_y - slope * sum_x) / n;

    Some(TrendLine {
        slope,
        intercept: shifted_intercept - slope * x_min,
        x_min,
        x_max,
    })
}
