// src/progress.rs

//! Parser for the renderer's path-tracing status lines.
//!
//! A status line looks like:
//!
//! ```text
//! Fra:1 Mem:108.27M (0.00M, Peak 108.27M) | Remaining:00:03.45 | Mem:30.51M, Peak:30.51M | Scene, RenderLayer | Path Tracing Tile 1/4, Sample 3/20
//! ```
//!
//! The second `Mem:` pair is only printed by some renderer versions and is
//! optional here. Anything that does not match yields `None`; most lines the
//! renderer prints are not status lines.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static RENDER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        Fra:\s*(?P<frame>\d+)\s*
        Mem:\s*(?P<mem>[\d.]+\S)\s*
            \( [^)]*? Peak:?\s*(?P<mempeak>[\d.]+\S) \s*\)
        \s*\|\s*
        Remaining:\s*(?P<rem>[\d:.]+)
        (?: \s*\|\s* Mem:\s*[\d.]+\S \s*,\s* Peak:\s*[\d.]+\S )?
        \s*\|\s*
        (?P<rig>[^,|]+?) \s*,\s* (?P<layer>[^,|]+?)
        \s*\|\s*
        Path\ Tracing\ Tile\s+(?P<tile>\d+)/(?P<tiles>\d+)
        \s*,\s*
        Sample\s+(?P<sample>\d+)/(?P<samples>\d+)
        ",
    )
    .expect("render status regex is valid")
});

/// One parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub frame: u32,
    pub tile: u32,
    pub total_tiles: u32,
    pub sample: u32,
    pub total_samples: u32,
    /// Memory fields keep their unit suffix (e.g. `10.5M`); display only.
    pub mem_used: String,
    pub mem_peak: String,
    pub time_remaining: String,
    pub rig_name: String,
    pub layer_name: String,
}

impl ProgressRecord {
    /// Percentage of (tile, sample) steps completed, in raster order.
    ///
    /// Returns 0 when either total is 0.
    pub fn percent(&self) -> u32 {
        let tiles = u128::from(self.total_tiles);
        let samples = u128::from(self.total_samples);
        let denom = tiles * samples;
        if denom == 0 {
            return 0;
        }

        let done = u128::from(self.tile.saturating_sub(1)) * samples
            + u128::from(self.sample.saturating_sub(1));
        (100 * done / denom).min(100) as u32
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rendered {}%, time remaining: {} (tile {}/{}, sample {}/{})",
            self.percent(),
            self.time_remaining,
            self.tile,
            self.total_tiles,
            self.sample,
            self.total_samples
        )
    }
}

/// Parse a single output line into a [`ProgressRecord`].
///
/// Returns `None` for non-status lines, for numbers that do not fit in a
/// `u32`, and for tile/sample counters outside `1..=total`.
pub fn parse(line: &str) -> Option<ProgressRecord> {
    let caps = RENDER_LINE_RE.captures(line)?;
    let num = |name: &str| caps.name(name)?.as_str().parse::<u32>().ok();
    let text = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());

    let record = ProgressRecord {
        frame: num("frame")?,
        tile: num("tile")?,
        total_tiles: num("tiles")?,
        sample: num("sample")?,
        total_samples: num("samples")?,
        mem_used: text("mem")?,
        mem_peak: text("mempeak")?,
        time_remaining: text("rem")?,
        rig_name: text("rig")?,
        layer_name: text("layer")?,
    };

    let in_range = |n: u32, total: u32| n >= 1 && n <= total;
    if !in_range(record.tile, record.total_tiles) || !in_range(record.sample, record.total_samples)
    {
        return None;
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_LINE: &str = "Fra:1 Mem:10.5M (..., Peak 12.0M) | Remaining: 00:01.23 | Render, View | Path Tracing Tile 3/10, Sample 5/20";
    const FULL_LINE: &str = "Fra:1 Mem:108.27M (0.00M, Peak 108.27M) | Remaining:00:03.45 | Mem:30.51M, Peak:30.51M | Scene, RenderLayer | Path Tracing Tile 1/4, Sample 3/20";

    #[test]
    fn parses_short_status_line() {
        let rec = parse(SHORT_LINE).expect("line should match");
        assert_eq!(rec.tile, 3);
        assert_eq!(rec.total_tiles, 10);
        assert_eq!(rec.sample, 5);
        assert_eq!(rec.total_samples, 20);
        assert_eq!(rec.mem_used, "10.5M");
        assert_eq!(rec.mem_peak, "12.0M");
        assert_eq!(rec.time_remaining, "00:01.23");
        assert_eq!(rec.rig_name, "Render");
        assert_eq!(rec.layer_name, "View");
        assert_eq!(rec.percent(), 22);
    }

    #[test]
    fn parses_line_with_second_memory_pair() {
        let rec = parse(FULL_LINE).expect("line should match");
        assert_eq!(rec.frame, 1);
        assert_eq!(rec.mem_used, "108.27M");
        assert_eq!(rec.mem_peak, "108.27M");
        assert_eq!(rec.time_remaining, "00:03.45");
        assert_eq!(rec.rig_name, "Scene");
        assert_eq!(rec.layer_name, "RenderLayer");
        assert_eq!((rec.tile, rec.total_tiles), (1, 4));
        assert_eq!((rec.sample, rec.total_samples), (3, 20));
    }

    #[test]
    fn ordinary_output_is_not_progress() {
        assert!(parse("").is_none());
        assert!(parse("Blender 4.1.0 (hash abc built 2024-03-25)").is_none());
        assert!(parse("Fra:1 Mem:10.5M | Synchronizing object | Cube").is_none());
        assert!(parse("Saved: '/tmp/render0000'").is_none());
    }

    #[test]
    fn out_of_range_counters_are_rejected() {
        let zero_tile = SHORT_LINE.replace("Tile 3/10", "Tile 0/10");
        assert!(parse(&zero_tile).is_none());
        let past_end = SHORT_LINE.replace("Sample 5/20", "Sample 21/20");
        assert!(parse(&past_end).is_none());
        let overflow = SHORT_LINE.replace("Tile 3/10", "Tile 3/99999999999");
        assert!(parse(&overflow).is_none());
    }

    #[test]
    fn percent_guards_empty_totals() {
        let mut rec = parse(SHORT_LINE).unwrap();
        rec.total_tiles = 0;
        assert_eq!(rec.percent(), 0);
    }

    #[test]
    fn display_matches_console_status() {
        let rec = parse(SHORT_LINE).unwrap();
        assert_eq!(
            rec.to_string(),
            "Rendered 22%, time remaining: 00:01.23 (tile 3/10, sample 5/20)"
        );
    }
}
