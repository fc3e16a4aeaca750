//! Core domain types and traits for Parkonic parking tickets.

pub mod error;
pub mod query;
pub mod record;
pub mod ticket;
pub mod traits;

pub use error::{CoreError, CoreResult};
pub use query::TicketQuery;
pub use record::{parse_datetime, CoercionWarning, TicketRecord};
pub use ticket::{widths, Ticket, TicketFields, TicketId, TicketKind};
pub use traits::TicketRepository;
