//! Given steps for thread resolution BDD scenarios.

use super::world::ThreadWorld;
use rstest_bdd_macros::given;

#[given("the hash strategy")]
fn the_hash_strategy(world: &mut ThreadWorld) {
    world.use_hash_strategy();
}

#[given("the database strategy")]
fn the_database_strategy(world: &mut ThreadWorld) {
    world.use_database_strategy();
}
