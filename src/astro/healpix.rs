//! NESTED-scheme HEALPix pixel lookup, enough for MOC containment tests.

use std::f64::consts::FRAC_2_PI;

/// Deepest order allowed in a MOC.
pub const MAX_ORDER: u8 = 29;

/// Number of cells at the given order.
pub fn n_cells(order: u8) -> u64 {
    12u64 << (2 * order as u32)
}

/// Index of the cell at `order` containing the position (degrees).
pub fn ang2pix_nest(order: u8, ra_deg: f64, dec_deg: f64) -> u64 {
    debug_assert!(order <= MAX_ORDER);
    let nside: i64 = 1 << order;
    let z = dec_deg.to_radians().sin();
    let za = z.abs();
    let tt = (ra_deg.to_radians() * FRAC_2_PI).rem_euclid(4.0);

    let (face, ix, iy) = if za <= 2.0 / 3.0 {
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * (z * 0.75);
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp >> order;
        let ifm = jm >> order;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (face, jm & (nside - 1), nside - (jp & (nside - 1)) - 1)
    } else {
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();
        let jp = ((tp * tmp) as i64).min(nside - 1);
        let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
        if z >= 0.0 {
            (ntt, nside - jm - 1, nside - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    ((face as u64) << (2 * order as u32)) + spread_bits(ix as u64) + (spread_bits(iy as u64) << 1)
}

/// Interleave zero bits: bit i of `v` moves to bit 2i.
fn spread_bits(v: u64) -> u64 {
    let mut v = v & 0xFFFF_FFFF;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_zero_faces() {
        assert_eq!(ang2pix_nest(0, 45.0, 90.0), 0);
        assert_eq!(ang2pix_nest(0, 45.0, 60.0), 0);
        assert_eq!(ang2pix_nest(0, 135.0, 60.0), 1);
        assert_eq!(ang2pix_nest(0, 0.0, 0.0), 4);
        assert_eq!(ang2pix_nest(0, 90.0, 0.0), 5);
        assert_eq!(ang2pix_nest(0, 45.0, -60.0), 8);
        assert_eq!(ang2pix_nest(0, 315.0, -60.0), 11);
    }

    #[test]
    fn north_corner_of_face_zero() {
        assert_eq!(ang2pix_nest(1, 45.0, 89.0), 3);
    }

    #[test]
    fn nested_parents_agree() {
        let points = [
            (0.0, 0.0),
            (83.82, -5.39),
            (266.4, -28.9),
            (10.68, 41.27),
            (359.9, 89.9),
            (180.0, -89.5),
            (201.37, -43.02),
        ];
        for (ra, dec) in points {
            let deep = ang2pix_nest(MAX_ORDER, ra, dec);
            for order in 0..MAX_ORDER {
                let shift = 2 * (MAX_ORDER - order) as u32;
                assert_eq!(deep >> shift, ang2pix_nest(order, ra, dec), "{ra},{dec} @ {order}");
            }
            assert!(deep < n_cells(MAX_ORDER));
        }
    }

    #[test]
    fn bit_spreading() {
        assert_eq!(spread_bits(0b1), 0b1);
        assert_eq!(spread_bits(0b11), 0b101);
        assert_eq!(spread_bits(0b101), 0b10001);
    }
}
