//! Multi-Order Coverage maps in the IVOA JSON and ASCII serializations.
//!
//! Coverage is held as sorted, disjoint, half-open ranges of cell indices at
//! the deepest order, so a range such as `29/0-1000000000` costs one entry.

use std::collections::BTreeMap;

use super::healpix::{MAX_ORDER, ang2pix_nest, n_cells};

/// A set of NESTED HEALPix cells, normalized to ranges at `MAX_ORDER`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Moc {
    ranges: Vec<(u64, u64)>,
}

/// Bits between a cell index at `order` and its descendants at `MAX_ORDER`.
fn depth_shift(order: u8) -> u32 {
    2 * (MAX_ORDER - order) as u32
}

impl Moc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse either serialization: JSON (`{"1":[1,2],"2":[12]}`) or
    /// ASCII (`1/1-2 2/12`).
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err("The MOC is empty".to_string());
        }
        let moc = if trimmed.starts_with('{') {
            Self::parse_json(trimmed)?
        } else {
            Self::parse_ascii(trimmed)?
        };
        if moc.is_empty() {
            return Err("The MOC contains no cells".to_string());
        }
        Ok(moc)
    }

    fn parse_json(text: &str) -> Result<Self, String> {
        let raw: BTreeMap<String, Vec<u64>> =
            serde_json::from_str(text).map_err(|e| format!("Invalid MOC JSON: {e}"))?;
        let mut ranges = Vec::new();
        for (order, cells) in raw {
            let order = parse_order(&order)?;
            for cell in cells {
                ranges.push(cell_range(order, cell, cell)?);
            }
        }
        Ok(Self::from_ranges(ranges))
    }

    fn parse_ascii(text: &str) -> Result<Self, String> {
        let mut ranges = Vec::new();
        let mut order: Option<u8> = None;
        for token in text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let cells = match token.split_once('/') {
                Some((o, rest)) => {
                    order = Some(parse_order(o)?);
                    rest
                }
                None => token,
            };
            if cells.is_empty() {
                continue;
            }
            let order = order.ok_or_else(|| format!("Cell \"{token}\" appears before any order"))?;
            let (first, last) = match cells.split_once('-') {
                Some((a, b)) => (parse_cell(a)?, parse_cell(b)?),
                None => {
                    let c = parse_cell(cells)?;
                    (c, c)
                }
            };
            if last < first {
                return Err(format!("Range \"{cells}\" is reversed"));
            }
            ranges.push(cell_range(order, first, last)?);
        }
        Ok(Self::from_ranges(ranges))
    }

    /// Build from half-open `MAX_ORDER` ranges in any order; overlapping and
    /// adjacent ranges are merged.
    pub fn from_ranges(mut ranges: Vec<(u64, u64)>) -> Self {
        ranges.retain(|(start, end)| start < end);
        ranges.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self { ranges: merged }
    }

    pub fn insert(&mut self, order: u8, cell: u64) -> Result<(), String> {
        let range = cell_range(order, cell, cell)?;
        let mut ranges = std::mem::take(&mut self.ranges);
        ranges.push(range);
        *self = Self::from_ranges(ranges);
        Ok(())
    }

    /// The normalized half-open ranges at `MAX_ORDER`.
    pub fn ranges(&self) -> &[(u64, u64)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of cells in the smallest decomposition of the coverage into
    /// HEALPix cells of mixed order.
    pub fn num_cells(&self) -> u64 {
        self.iter().count() as u64
    }

    pub fn max_order(&self) -> Option<u8> {
        self.iter().map(|(order, _)| order).max()
    }

    /// The coverage as (order, cell) pairs, each range split into the
    /// largest aligned cells it holds.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| AlignedCells { start, end })
    }

    /// Whether the position (ICRS degrees) falls in any cell.
    pub fn contains(&self, ra_deg: f64, dec_deg: f64) -> bool {
        if self.ranges.is_empty() {
            return false;
        }
        let cell = ang2pix_nest(MAX_ORDER, ra_deg, dec_deg);
        let after = self.ranges.partition_point(|(start, _)| *start <= cell);
        after > 0 && cell < self.ranges[after - 1].1
    }

    /// Fraction of the sphere covered.
    pub fn sky_fraction(&self) -> f64 {
        let covered: u64 = self.ranges.iter().map(|(start, end)| end - start).sum();
        covered as f64 / n_cells(MAX_ORDER) as f64
    }
}

/// Splits a `MAX_ORDER` range into maximal aligned cells, lowest index first.
struct AlignedCells {
    start: u64,
    end: u64,
}

impl Iterator for AlignedCells {
    type Item = (u8, u64);

    fn next(&mut self) -> Option<(u8, u64)> {
        if self.start >= self.end {
            return None;
        }
        let mut order = MAX_ORDER;
        while order > 0 {
            let shift = depth_shift(order - 1);
            let size = 1u64 << shift;
            if self.start % size != 0 || self.end - self.start < size {
                break;
            }
            order -= 1;
        }
        let shift = depth_shift(order);
        let cell = self.start >> shift;
        self.start += 1u64 << shift;
        Some((order, cell))
    }
}

/// The `MAX_ORDER` range covered by cells `first..=last` at `order`.
fn cell_range(order: u8, first: u64, last: u64) -> Result<(u64, u64), String> {
    if order > MAX_ORDER {
        return Err(format!("Order {order} exceeds the maximum of {MAX_ORDER}"));
    }
    if last >= n_cells(order) {
        return Err(format!("Cell {last} does not exist at order {order}"));
    }
    let shift = depth_shift(order);
    Ok((first << shift, (last + 1) << shift))
}

fn parse_order(s: &str) -> Result<u8, String> {
    s.trim()
        .parse::<u8>()
        .ok()
        .filter(|o| *o <= MAX_ORDER)
        .ok_or_else(|| format!("Invalid MOC order \"{s}\""))
}

fn parse_cell(s: &str) -> Result<u64, String> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| format!("Invalid MOC cell \"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ascii_ranges() {
        // 2/12 lies inside 1/3, so it adds nothing.
        let moc = Moc::parse("1/1-3,5 2/12\n 3/").unwrap();
        assert_eq!(moc.num_cells(), 4);
        assert_eq!(moc.max_order(), Some(1));
        let cells: Vec<(u8, u64)> = moc.iter().collect();
        assert_eq!(cells, vec![(1, 1), (1, 2), (1, 3), (1, 5)]);
    }

    #[test]
    fn parses_json() {
        let moc = Moc::parse(r#"{"0": [4], "3": [1, 2]}"#).unwrap();
        assert_eq!(moc.num_cells(), 3);
        assert_eq!(moc.max_order(), Some(3));
    }

    #[test]
    fn adjacent_cells_merge_into_their_parent() {
        let moc = Moc::parse("2/4-7").unwrap();
        assert_eq!(moc.iter().collect::<Vec<_>>(), vec![(1, 1)]);
        assert_eq!(moc.ranges().len(), 1);
    }

    #[test]
    fn huge_ranges_stay_small() {
        let moc = Moc::parse("11/0-50331647").unwrap();
        assert_eq!(moc.iter().collect::<Vec<_>>(), (0..12).map(|c| (0, c)).collect::<Vec<_>>());
        assert!((moc.sky_fraction() - 1.0).abs() < 1e-12);

        let deep = Moc::parse("29/1-3000000000000000000").unwrap();
        assert_eq!(deep.ranges(), &[(1, 3_000_000_000_000_000_001)]);
        assert!(deep.num_cells() < 200);
        assert!(deep.contains(10.0, 10.0));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Moc::parse("").is_err());
        assert!(Moc::parse("5").is_err());
        assert!(Moc::parse("0/12").is_err());
        assert!(Moc::parse("30/1").is_err());
        assert!(Moc::parse("1/5-2").is_err());
        assert!(Moc::parse("3/").is_err());
        assert!(Moc::parse(r#"{"x": [1]}"#).is_err());
    }

    #[test]
    fn containment_across_orders() {
        // Face 4 at order 0 is centred on RA 0, Dec 0.
        let moc = Moc::parse("0/4 5/0").unwrap();
        assert!(moc.contains(0.0, 0.0));
        assert!(moc.contains(359.0, 1.0));
        assert!(!moc.contains(180.0, 0.0));

        let single = ang2pix_nest(8, 83.82, -5.39);
        let mut small = Moc::new();
        small.insert(8, single).unwrap();
        assert!(small.contains(83.82, -5.39));
        assert!(!small.contains(83.82, -6.39));
    }

    #[test]
    fn sky_fraction_of_one_face() {
        let moc = Moc::parse("0/0").unwrap();
        assert!((moc.sky_fraction() - 1.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn empty_moc_contains_nothing() {
        assert!(!Moc::new().contains(0.0, 0.0));
    }
}
