/// Shared data types for the N빵 keyword notifier.
///
/// `models` holds domain records, `events` the trigger and push payloads that
/// cross process boundaries, `api` the HTTP request/response bodies.

pub mod api;
pub mod events;
pub mod models;

pub use models::GeoPoint;
