pub mod egi_order;
pub mod order_response;
