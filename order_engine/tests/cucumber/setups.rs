use cucumber::given;

use crate::cucumber::{order_world::StorefrontSystem, OrderWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut OrderWorld) {
    let system = StorefrontSystem::new().await;
    world.system = Some(system);
}
