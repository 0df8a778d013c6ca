//! Table handle.
//!
//! An [`EsentTable`] owns one engine instance with one session and one
//! read-only database, plus the schema introspected from one table of that
//! database. Construction either completes or rolls everything back; the
//! instance is terminated exactly once, on disconnect, destroy, or drop.

use std::path::Path;
use std::sync::Arc;

use esent_engine::{DatabaseId, InstanceId, JetEngine, JetError, SessionId};
use esent_error::{EsentError, Result};
use esent_func::{IndexInfo, VirtualTable};
use tracing::{debug, info, warn};

use crate::args::DeclarationArgs;
use crate::catalog::{ColumnDescriptor, IndexDescriptor, TableSchema, introspect};
use crate::config::VtabConfig;
use crate::cursor::EsentCursor;

/// Registration data shared by every table of the module.
#[derive(Debug)]
pub struct EsentModule<E> {
    pub engine: Arc<E>,
    pub config: VtabConfig,
}

impl<E> EsentModule<E> {
    pub fn new(engine: Arc<E>, config: VtabConfig) -> Self {
        Self { engine, config }
    }
}

impl<E> Clone for EsentModule<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
        }
    }
}

/// Wrap a raw engine status with the step that failed and the engine's
/// rendering of the code.
pub(crate) fn engine_error<E: JetEngine>(engine: &E, context: &str, err: JetError) -> EsentError {
    EsentError::engine(context, err.code, engine.error_string(err.code))
}

/// Terminates the instance on drop unless disarmed.
struct InstanceGuard<'e, E: JetEngine> {
    engine: &'e E,
    instance: Option<InstanceId>,
}

impl<E: JetEngine> InstanceGuard<'_, E> {
    fn disarm(mut self) -> Option<InstanceId> {
        self.instance.take()
    }
}

impl<E: JetEngine> Drop for InstanceGuard<'_, E> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            debug!(instance = instance.0, "rolling back partial declaration");
            if let Err(err) = self.engine.terminate(instance) {
                warn!(code = err.code, "failed to terminate JET instance during rollback");
            }
        }
    }
}

/// A declared `esentvtab` table.
pub struct EsentTable<E: JetEngine> {
    engine: Arc<E>,
    config: VtabConfig,
    instance: Option<InstanceId>,
    session: SessionId,
    database: DatabaseId,
    args: DeclarationArgs,
    schema: TableSchema,
}

impl<E: JetEngine> std::fmt::Debug for EsentTable<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsentTable")
            .field("engine", &self.engine.name())
            .field("instance", &self.instance)
            .field("path", &self.args.edb_path)
            .field("table", &self.schema.table_name)
            .field("columns", &self.schema.columns.len())
            .finish_non_exhaustive()
    }
}

impl<E: JetEngine> EsentTable<E> {
    /// Acquire engine resources for the declared table and introspect it.
    ///
    /// # Errors
    ///
    /// Argument, engine, or schema errors. No engine instance survives a
    /// failure.
    pub fn declare(module: &EsentModule<E>, args: &[&str]) -> Result<Self> {
        let args = DeclarationArgs::parse(args)?;
        let engine = &*module.engine;
        let config = &module.config;

        let instance = engine
            .create_instance(&config.instance_name)
            .map_err(|e| engine_error(engine, "failed to create JET instance", e))?;
        let guard = InstanceGuard {
            engine,
            instance: Some(instance),
        };
        debug!(instance = instance.0, engine = engine.name(), "instance created");

        engine
            .init(instance)
            .map_err(|e| engine_error(engine, "failed to initialize JET", e))?;
        let session = engine
            .begin_session(instance)
            .map_err(|e| engine_error(engine, "failed to begin JET session", e))?;
        debug!(session = session.0, "session begun");

        engine
            .attach_database(session, &args.edb_path, config.max_database_pages, true)
            .map_err(|e| engine_error(engine, "failed to attach JET database", e))?;
        let database = engine
            .open_database(session, &args.edb_path, true)
            .map_err(|e| engine_error(engine, "failed to open JET database", e))?;
        debug!(path = %args.edb_path.display(), database = database.0, "database opened");

        let schema = introspect(engine, session, database, &args.edb_table)?;
        info!(
            table = %schema.table_name,
            columns = schema.columns.len(),
            indexes = schema.indexes.len(),
            "esentvtab declared"
        );

        Ok(Self {
            engine: Arc::clone(&module.engine),
            config: config.clone(),
            instance: guard.disarm(),
            session,
            database,
            args,
            schema,
        })
    }

    /// Terminate the engine instance. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// The engine's termination error, after which the handle is released
    /// anyway.
    pub fn teardown(&mut self) -> Result<()> {
        let Some(instance) = self.instance.take() else {
            return Ok(());
        };
        self.engine
            .terminate(instance)
            .map_err(|e| engine_error(&*self.engine, "failed to terminate JET instance", e))?;
        info!(instance = instance.0, table = %self.schema.table_name, "instance terminated");
        Ok(())
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.instance.is_some()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.schema.columns
    }

    /// Indexes found during introspection. Informational only.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.schema.indexes
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    #[must_use]
    pub fn edb_path(&self) -> &Path {
        &self.args.edb_path
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.args.alias
    }

    #[must_use]
    pub fn config(&self) -> &VtabConfig {
        &self.config
    }

    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn session(&self) -> SessionId {
        self.session
    }

    pub(crate) fn database(&self) -> DatabaseId {
        self.database
    }
}

impl<E: JetEngine> VirtualTable for EsentTable<E> {
    type Aux = EsentModule<E>;
    type Cursor<'vtab>
        = EsentCursor<'vtab, E>
    where
        Self: 'vtab;

    fn create(aux: &EsentModule<E>, args: &[&str]) -> Result<Self> {
        Self::declare(aux, args)
    }

    fn connect(_aux: &EsentModule<E>, _args: &[&str]) -> Result<Self> {
        Err(EsentError::ConnectUnsupported)
    }

    fn schema_sql(&self) -> &str {
        &self.schema.sql
    }

    fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
        // Full scan only: constraints and ordering are left to the host.
        info.idx_num = 0;
        info.idx_str = None;
        info.order_by_consumed = false;
        info.estimated_cost = self.config.full_scan_cost;
        info.estimated_rows = self.config.full_scan_rows;
        debug!(
            table = %self.schema.table_name,
            constraints = info.constraints.len(),
            order_by = info.order_by.len(),
            "best_index: full scan"
        );
        Ok(())
    }

    fn open(&self) -> Result<EsentCursor<'_, E>> {
        EsentCursor::open(self)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.teardown()
    }

    fn destroy(&mut self) -> Result<()> {
        self.teardown()
    }
}

impl<E: JetEngine> Drop for EsentTable<E> {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!(%err, "teardown failed during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use esent_engine::{CatalogColumn, EngineStep, MemoryEngine};
    use esent_error::ErrorKind;
    use esent_func::{ConstraintOp, IndexConstraint};
    use esent_types::JetColumnType;

    use super::*;

    const DB: &str = "/data/mail.edb";

    fn module() -> (MemoryEngine, EsentModule<MemoryEngine>) {
        let engine = MemoryEngine::new();
        engine.create_table(
            DB,
            "Messages",
            &[
                CatalogColumn::new(1, "Id", JetColumnType::Long),
                CatalogColumn::new(2, "Subject", JetColumnType::LongText),
            ],
        );
        let module = EsentModule::new(Arc::new(engine.clone()), VtabConfig::default());
        (engine, module)
    }

    fn args() -> [&'static str; 5] {
        ["esentvtab", "main", "mail", "'/data/mail.edb'", "Messages"]
    }

    #[test]
    fn test_create_declares_schema() {
        let (engine, module) = module();
        let table = EsentTable::create(&module, &args()).unwrap();
        assert_eq!(table.schema_sql(), "CREATE TABLE v(Id INT, Subject TEXT)");
        assert_eq!(table.table_name(), "Messages");
        assert_eq!(table.edb_path(), Path::new(DB));
        assert_eq!(table.alias(), "mail");
        assert!(table.is_attached());
        assert_eq!(engine.live_instances(), 1);
        assert_eq!(engine.instance_names(), ["Unique instance for esentVtab"]);
        drop(table);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_wrong_argument_count_allocates_nothing() {
        let (engine, module) = module();
        let err = EsentTable::create(&module, &["esentvtab", "main", "mail", "'x'"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_connect_unsupported() {
        let (engine, module) = module();
        let err = EsentTable::connect(&module, &args()).unwrap_err();
        assert!(matches!(err, EsentError::ConnectUnsupported));
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_every_failing_step_rolls_back() {
        for step in [
            EngineStep::Init,
            EngineStep::BeginSession,
            EngineStep::AttachDatabase,
            EngineStep::OpenDatabase,
            EngineStep::ColumnCatalog,
        ] {
            let (engine, module) = module();
            engine.inject_failure(step, -1032);
            let err = EsentTable::create(&module, &args()).unwrap_err();
            assert_eq!(err.engine_code(), Some(-1032), "{step:?}");
            assert_eq!(engine.live_instances(), 0, "{step:?}");
            assert_eq!(engine.live_sessions(), 0, "{step:?}");
        }
    }

    #[test]
    fn test_create_instance_failure_message() {
        let (engine, module) = module();
        engine.inject_failure(EngineStep::CreateInstance, -1104);
        let err = EsentTable::create(&module, &args()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to create JET instance: code -1104: JET_errInvalidSesid, Invalid session handle"
        );
    }

    #[test]
    fn test_missing_database() {
        let (engine, module) = module();
        let err = EsentTable::create(
            &module,
            &["esentvtab", "main", "t", "'/nope.edb'", "Messages"],
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("failed to attach JET database: code -1811"));
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_index_failure_tolerated() {
        let (engine, module) = module();
        engine.add_index(DB, "Messages", "ix_id", &["Id"]);
        let table = EsentTable::create(&module, &args()).unwrap();
        assert_eq!(table.indexes().len(), 1);
        drop(table);

        engine.inject_failure(EngineStep::IndexCatalog, -1305);
        let table = EsentTable::create(&module, &args()).unwrap();
        assert!(table.indexes().is_empty());
    }

    #[test]
    fn test_best_index_fixed_cost() {
        let (_engine, module) = module();
        let table = EsentTable::create(&module, &args()).unwrap();
        let mut info = IndexInfo::new(
            vec![IndexConstraint {
                column: 0,
                op: ConstraintOp::Eq,
                usable: true,
            }],
            vec![],
        );
        table.best_index(&mut info).unwrap();
        assert!((info.estimated_cost - 1_000_000.0).abs() < f64::EPSILON);
        assert_eq!(info.estimated_rows, 1_000_000);
        assert_eq!(info.constraint_usage[0].argv_index, 0);
        assert!(!info.constraint_usage[0].omit);
        assert!(!info.order_by_consumed);
    }

    #[test]
    fn test_disconnect_and_destroy_idempotent() {
        let (engine, module) = module();
        let mut table = EsentTable::create(&module, &args()).unwrap();
        table.disconnect().unwrap();
        assert!(!table.is_attached());
        assert_eq!(engine.live_instances(), 0);
        table.destroy().unwrap();
        table.disconnect().unwrap();
        drop(table);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_update_is_read_only() {
        let (_engine, module) = module();
        let mut table = EsentTable::create(&module, &args()).unwrap();
        assert!(matches!(table.update(&[]), Err(EsentError::ReadOnly)));
    }
}
