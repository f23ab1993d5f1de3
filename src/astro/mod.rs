//! Sky coordinate handling for targets and the clash tool.

pub mod coords;
pub mod healpix;
pub mod moc;

pub use coords::{CoordSystem, format_dec, format_ra, parse_coordinates, to_icrs};
pub use moc::Moc;
