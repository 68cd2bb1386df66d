//! Presentation Layer
//!
//! HTTP handlers, DTOs and routers.

pub mod dto;
pub mod handlers;
pub mod router;

pub use handlers::PortalAppState;
pub use router::{
    payment_webhook_router, payment_webhook_router_generic, portal_admin_router,
    portal_admin_router_generic, portal_router, portal_router_generic,
};
