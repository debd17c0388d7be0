//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - daily counts: `o`
//! - 7-day moving average: `-` line

use crate::domain::{DailyCount, MovingAveragePoint};

/// Render the daily series with its moving-average overlay.
pub fn render_daily_plot(
    daily: &[DailyCount],
    average: &[MovingAveragePoint],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    if daily.is_empty() {
        return "Plot: (no rows)\n".to_string();
    }

    let y_max = y_range(daily, average);
    let n = daily.len();

    let mut grid = vec![vec![' '; width]; height];

    // Draw the average line first (so points can overlay).
    let line: Vec<(usize, usize)> = average
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.average.map(|v| (map_x(i, n, width), map_y(v, y_max, height))))
        .collect();
    draw_polyline(&mut grid, &line, '-');

    for (i, day) in daily.iter().enumerate() {
        let x = map_x(i, n, width);
        let y = map_y(day.count as f64, y_max, height);
        grid[y][x] = 'o';
    }

    // Build final string. We include a small header with ranges.
    let first = daily[0].date;
    let last = daily[n - 1].date;
    let mut out = String::new();
    out.push_str(&format!(
        "Plot: dates=[{first}, {last}] | count=[0, {y_max:.0}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn y_range(daily: &[DailyCount], average: &[MovingAveragePoint]) -> f64 {
    let mut max = 1.0f64;
    for day in daily {
        max = max.max(day.count as f64);
    }
    for point in average {
        if let Some(v) = point.average {
            max = max.max(v);
        }
    }
    max
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let u = i as f64 / (n as f64 - 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(v: f64, y_max: f64, height: usize) -> usize {
    let u = (v / y_max).clamp(0.0, 1.0);
    // v = y_max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_polyline(grid: &mut [Vec<char>], points: &[(usize, usize)], ch: char) {
    let mut prev = None;
    for &(x, y) in points {
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, y, ch);
        } else if y < grid.len() && x < grid[0].len() {
            grid[y][x] = ch;
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn plot_golden_snapshot_small() {
        let d = |day: u32| NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        let daily = vec![
            DailyCount { date: d(1), count: 0 },
            DailyCount { date: d(2), count: 2 },
            DailyCount { date: d(3), count: 4 },
        ];
        let average = vec![
            MovingAveragePoint { date: d(1), count: 0, average: None },
            MovingAveragePoint { date: d(2), count: 2, average: None },
            MovingAveragePoint { date: d(3), count: 4, average: None },
        ];

        let txt = render_daily_plot(&daily, &average, 10, 5);
        let expected = concat!(
            "Plot: dates=[2020-03-01, 2020-03-03] | count=[0, 4]\n",
            "         o\n",
            "          \n",
            "     o    \n",
            "          \n",
            "o         \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_series_renders_placeholder() {
        assert_eq!(render_daily_plot(&[], &[], 10, 5), "Plot: (no rows)\n");
    }
}
