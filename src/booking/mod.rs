//! Room Booking Engine
//!
//! Owns the room-booking conflict check, price/duration computation and
//! booking state transitions.

mod model;
mod service;

pub use model::{
    duration_months, Booking, BookingResponse, BookingStatus, BookingWithRoom,
    CancelBookingResponse, CreateBookingRequest, ListBookingsQuery, UpdateBookingStatusRequest,
};
pub use service::BookingService;
