pub mod distance;
pub mod facility;
pub mod geocoder;

pub use distance::{haversine_miles, round_miles};
pub use facility::{pick_nearest, FacilityLocator, OverpassLocator};
pub use geocoder::{clean_address, Geocoder};
