//! Shuttle Booking Engine
//!
//! Owns per-route, per-date seat-capacity accounting and seat reservation.

mod model;
mod service;

pub use model::{
    qr_payload, BookShuttleRequest, CancelShuttleBookingResponse, ListRoutesQuery, RouteStatus,
    ShuttleBooking, ShuttleBookingResponse, ShuttleBookingStatus, ShuttleBookingWithRoute,
    ShuttleRoute, ShuttleRouteAvailability,
};
pub use service::ShuttleService;
