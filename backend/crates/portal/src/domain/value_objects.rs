//! Domain Value Objects
//!
//! Immutable value types for the portal domain.

use std::fmt;

/// Invoice lifecycle state
///
/// Stored as a small-int id, rendered as its code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum InvoiceStatus {
    #[default]
    Draft = 0,
    Sent = 1,
    Paid = 2,
    Void = 3,
}

impl InvoiceStatus {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        use InvoiceStatus::*;
        match self {
            Draft => "draft",
            Sent => "sent",
            Paid => "paid",
            Void => "void",
        }
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        use InvoiceStatus::*;
        match id {
            0 => Some(Draft),
            1 => Some(Sent),
            2 => Some(Paid),
            3 => Some(Void),
            _ => {
                tracing::error!("Invalid InvoiceStatus id: {}", id);
                None
            }
        }
    }

    /// Check whether a transition to `target` is legal
    ///
    /// Draft invoices can be sent or voided; sent invoices can be paid or
    /// voided. Paid and void are terminal.
    #[inline]
    pub const fn can_transition_to(&self, target: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, target),
            (Draft, Sent) | (Draft, Void) | (Sent, Paid) | (Sent, Void)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Contact details for a portal user, read from the shared users table
#[derive(Debug, Clone)]
pub struct ClientContact {
    pub email: String,
    pub user_name: String,
}
