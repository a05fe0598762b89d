pub use sea_orm_migration::prelude::*;

mod m20261001_000000_bootstrap;
mod m20261001_000001_create_directory;
mod m20261001_000002_create_threads;
mod m20261001_000003_create_pending_actions;
mod m20261001_000004_create_deliveries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000000_bootstrap::Migration),
            Box::new(m20261001_000001_create_directory::Migration),
            Box::new(m20261001_000002_create_threads::Migration),
            Box::new(m20261001_000003_create_pending_actions::Migration),
            Box::new(m20261001_000004_create_deliveries::Migration),
        ]
    }
}
