use async_trait::async_trait;

use crate::error::CoreResult;
use crate::query::TicketQuery;
use crate::ticket::{Ticket, TicketFields, TicketId, TicketKind};

/// Repository interface over one ticket table.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Table this repository reads and writes.
    fn kind(&self) -> TicketKind;

    /// Validates and inserts a new ticket, returning the stored row.
    async fn create(&self, fields: &TicketFields) -> CoreResult<Ticket>;

    /// Retrieves a ticket by its identifier.
    async fn get(&self, id: TicketId) -> CoreResult<Option<Ticket>>;

    /// Lists tickets newest first.
    async fn list(&self, limit: u32, offset: u32) -> CoreResult<Vec<Ticket>>;

    /// Returns tickets matching every populated filter, ordered by entry time.
    async fn search(&self, query: &TicketQuery) -> CoreResult<Vec<Ticket>>;

    /// Replaces all column values of an existing ticket.
    async fn update(&self, ticket: &Ticket) -> CoreResult<()>;

    /// Permanently deletes a ticket.
    async fn delete(&self, id: TicketId) -> CoreResult<()>;

    /// Returns the number of rows in the table.
    async fn count(&self) -> CoreResult<u64>;
}
