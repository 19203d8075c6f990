// CONFIGURATOR
// Registry of schema migrations, keyed by (module name, from-schema). A
// migration from schema n moves the module's state to schema n + 1; longer
// jumps run the unit steps in sequence.
//
// SAFETY INVARIANTS:
// 1. At most one handler per (module, from-schema)
// 2. A required step with no handler is an error, never skipped

use crate::error::{ManagerError, ModuleError};
use crate::module::ModuleContext;
use log::info;
use std::collections::BTreeMap;

pub type MigrationHandler = Box<dyn Fn(&mut ModuleContext<'_>) -> Result<(), ModuleError> + Send + Sync>;

#[derive(Default)]
pub struct Configurator {
    migrations: BTreeMap<(String, u64), MigrationHandler>,
}

impl Configurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_migration<F>(&mut self, module: &str, from_schema: u64, handler: F) -> Result<(), ManagerError>
    where
        F: Fn(&mut ModuleContext<'_>) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        let key = (module.to_string(), from_schema);
        if self.migrations.contains_key(&key) {
            return Err(ManagerError::DuplicateMigration {
                module: module.to_string(),
                from_schema,
            });
        }
        self.migrations.insert(key, Box::new(handler));
        Ok(())
    }

    pub fn has_migration(&self, module: &str, from_schema: u64) -> bool {
        self.migrations
            .contains_key(&(module.to_string(), from_schema))
    }

    /// Runs every unit step from `from_schema` up to `to_schema`.
    pub fn migrate(
        &self,
        module: &str,
        from_schema: u64,
        to_schema: u64,
        ctx: &mut ModuleContext<'_>,
    ) -> Result<(), ManagerError> {
        for schema in from_schema..to_schema {
            let handler = self
                .migrations
                .get(&(module.to_string(), schema))
                .ok_or_else(|| ManagerError::MissingMigration {
                    module: module.to_string(),
                    from_schema: schema,
                })?;
            handler(ctx)?;
            info!("Migrated {} schema {} -> {}", module, schema, schema + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::store::{KvStore, MemStore};
    use tessera_types::version::ProtocolVersion;

    #[test]
    fn test_steps_run_in_order() {
        let mut configurator = Configurator::new();
        for from in 1..3u64 {
            configurator
                .register_migration(
                    "blob",
                    from,
                    move |ctx| {
                        let mut log = ctx.store.get(b"log").unwrap_or_default();
                        log.push(from as u8);
                        ctx.store.set(b"log", log);
                        Ok(())
                    },
                )
                .unwrap();
        }
        let mut store = MemStore::new();
        let mut ctx = ModuleContext::new(&mut store, 1, ProtocolVersion::V2);
        configurator.migrate("blob", 1, 3, &mut ctx).unwrap();
        assert_eq!(store.get(b"log"), Some(vec![1, 2]));
    }

    #[test]
    fn test_missing_and_duplicate() {
        let mut configurator = Configurator::new();
        configurator
            .register_migration("bank", 1, |_| Ok(()))
            .unwrap();
        assert_eq!(
            configurator.register_migration("bank", 1, |_| Ok(())),
            Err(ManagerError::DuplicateMigration { module: "bank".into(), from_schema: 1 })
        );
        let mut store = MemStore::new();
        let mut ctx = ModuleContext::new(&mut store, 1, ProtocolVersion::V2);
        assert_eq!(
            configurator.migrate("bank", 1, 3, &mut ctx),
            Err(ManagerError::MissingMigration { module: "bank".into(), from_schema: 2 })
        );
    }
}
