pub mod order_world;
pub mod setups;

pub use order_world::OrderWorld;
