//! Formatted terminal output for retrieval runs.
//!
//! Formatting code is kept in one place so the math/inversion code stays
//! clean and testable, and output changes are localized.

use crate::fit::InvertStats;
use crate::ratio::DensityRetrieval;

/// Summary statistics of a finalized density map.
#[derive(Debug, Clone)]
pub struct MapStats {
    pub pixels: usize,
    pub finite: usize,
    pub min: f64,
    pub max: f64,
    pub bounded_low: usize,
    pub bounded_high: usize,
}

pub fn map_stats(retrieval: &DensityRetrieval) -> MapStats {
    let data = &retrieval.value.data;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut finite = 0usize;
    for &v in data.iter() {
        if v.is_finite() {
            finite += 1;
            min = min.min(v);
            max = max.max(v);
        }
    }
    MapStats {
        pixels: data.len(),
        finite,
        min,
        max,
        bounded_low: retrieval.low.data.iter().filter(|v| v.is_finite()).count(),
        bounded_high: retrieval.high.data.iter().filter(|v| v.is_finite()).count(),
    }
}

/// Format the run summary printed after a retrieval.
pub fn format_run_summary(label: &str, retrieval: &DensityRetrieval, stats: &InvertStats) -> String {
    let map = map_stats(retrieval);
    let unit = retrieval.value.header.bunit().unwrap_or("?");

    let mut out = String::new();
    out.push_str(&format!("=== densmap - density retrieval ({label}) ===\n"));
    out.push_str(&format!(
        "Map: {} pixels, {} solved ({:.1}%)\n",
        map.pixels,
        map.finite,
        100.0 * map.finite as f64 / map.pixels.max(1) as f64
    ));
    if map.finite > 0 {
        out.push_str(&format!("Density range: [{:.3}, {:.3}] {unit}\n", map.min, map.max));
    }
    out.push_str(&format!(
        "Uncertainty bounds: {} low, {} high\n",
        map.bounded_low, map.bounded_high
    ));
    out.push_str(&format!(
        "Inversion: {} solved, {} out of range, {} without sign change\n",
        stats.solved, stats.out_of_range, stats.no_sign_change
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DensityMaps;
    use crate::image::Header;

    fn retrieval() -> DensityRetrieval {
        let mut maps = DensityMaps::nan_filled((2, 2));
        maps.value[[0, 0]] = 3.0;
        maps.value[[1, 1]] = 5.0;
        maps.low[[0, 0]] = 2.5;
        DensityRetrieval::from_maps(maps, &Header::new(), true)
    }

    #[test]
    fn map_stats_counts_finite_pixels() {
        let stats = map_stats(&retrieval());
        assert_eq!(stats.pixels, 4);
        assert_eq!(stats.finite, 2);
        assert_eq!(stats.bounded_low, 1);
        assert_eq!(stats.bounded_high, 0);
        assert!((stats.min - 3.0).abs() < 1e-12);
        assert!((stats.max - 5.0).abs() < 1e-12);
    }

    #[test]
    fn summary_mentions_solved_fraction() {
        let text = format_run_summary(
            "single cell",
            &retrieval(),
            &InvertStats {
                solved: 2,
                out_of_range: 1,
                no_sign_change: 0,
            },
        );
        assert!(text.contains("2 solved"));
        assert!(text.contains("1 out of range"));
    }
}
