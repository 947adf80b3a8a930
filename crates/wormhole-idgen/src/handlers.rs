mod health;
mod ids;

pub use health::health_handler;
pub use ids::{new_code_handler, new_id_handler};
