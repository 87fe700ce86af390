pub mod database;
pub mod events;
pub mod idempotency;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod sales;

pub use database::Database;
pub use events::{run_event_logger, ChannelEventSink, RecordingEventSink, SaleEvent, SaleEventSink};
pub use idempotency::{CachedResponse, IdempotencyCache};
pub use memory::InMemorySaleRepository;
pub use metrics::{get_metrics, init_metrics};
pub use repository::{SaleDeletion, SaleRepository};
pub use sales::SaleService;
