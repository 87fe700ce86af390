pub mod idempotency;

pub use idempotency::{
    idempotency_middleware, IDEMPOTENCY_KEY_HEADER, IDEMPOTENCY_REPLAYED_HEADER,
};
