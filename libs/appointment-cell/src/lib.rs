pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AppointmentType,
    GeneralPoolFilters, Payment, PaymentGuard, PaymentPatch, PaymentStatus, RefusalOutcome,
    RoutingStatus,
};
pub use router::appointment_routes;
pub use services::booking::AppointmentBookingService;
pub use services::lifecycle::{Actor, AppointmentLifecycleService};
pub use services::routing::RoutingService;
pub use services::store::{AppointmentStore, SupabaseAppointmentStore};
pub use state::AppointmentState;
