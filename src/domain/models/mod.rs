pub mod order;

pub use order::{Order, OrderEvent, OrderStatus};
