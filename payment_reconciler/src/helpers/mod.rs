mod order_number;

pub use order_number::extract_order_number;
