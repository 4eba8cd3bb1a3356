//! Sequential Extract → Transform → Load → Query run.
//!
//! Extract and Transform failures abort the run before any sink is touched.
//! Each sink is attempted independently: one failing does not stop the
//! others and nothing already written is rolled back.

use std::fmt;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::PipelineConfig;
use crate::db;
use crate::error::{EtlError, Result};
use crate::fetch::DocumentSource;
use crate::parser;
use crate::records::RecordSet;
use crate::sinks;
use crate::transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Transform,
    LoadRelational,
    LoadJson,
    LoadCsv,
    Query,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Extract => "Extract",
            Phase::Transform => "Transform",
            Phase::LoadRelational => "Load (relational)",
            Phase::LoadJson => "Load (json)",
            Phase::LoadCsv => "Load (csv)",
            Phase::Query => "Query",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub records: RecordSet,
    /// Phases that ended successfully, in run order.
    pub completed: Vec<Phase>,
    /// Load or query phases that failed; the run carried on past them.
    pub failures: Vec<(Phase, EtlError)>,
    pub query: Option<RecordSet>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    audit: AuditLog,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Pipeline {
            config,
            audit: AuditLog::new(&config.log_file),
        }
    }

    /// Run with the configured database. The connection is closed on every
    /// exit path when it goes out of scope.
    pub fn run(&self, source: &dyn DocumentSource) -> Result<RunReport> {
        self.audit.log("ETL Job Started")?;
        let conn = match db::connect(&self.config.sinks.db_path) {
            Ok(conn) => conn,
            Err(e) => return Err(self.abort(e)),
        };
        let report = self.run_with(source, &conn)?;
        if let Err((_, e)) = conn.close() {
            warn!(error = %e, "closing database failed");
        }
        self.audit.log("Process Complete.")?;
        Ok(report)
    }

    /// Extract and transform only; no sink is written.
    pub fn preview(&self, source: &dyn DocumentSource) -> Result<RecordSet> {
        let html = source.fetch()?;
        let records = parser::extract_page(&html, &self.config.table_spec())?;
        match &self.config.rescale {
            Some(spec) => transform::rescale(&records, spec),
            None => Ok(records),
        }
    }

    pub fn run_with(&self, source: &dyn DocumentSource, conn: &Connection) -> Result<RunReport> {
        let mut completed = Vec::new();

        let extracted = self.fatal(Phase::Extract, &mut completed, || {
            let html = source.fetch()?;
            parser::extract_page(&html, &self.config.table_spec())
        })?;

        let records = self.fatal(Phase::Transform, &mut completed, || {
            match &self.config.rescale {
                Some(spec) => transform::rescale(&extracted, spec),
                None => Ok(extracted.clone()),
            }
        })?;

        let mut failures = Vec::new();
        let targets = &self.config.sinks;

        self.attempt(Phase::LoadRelational, &mut completed, &mut failures, || {
            db::load_relational(conn, &records, &targets.table, targets.mode).map(|_| ())
        })?;
        if let Some(path) = &targets.json_path {
            self.attempt(Phase::LoadJson, &mut completed, &mut failures, || {
                sinks::load_json(&records, path)
            })?;
        }
        if let Some(path) = &targets.csv_path {
            self.attempt(Phase::LoadCsv, &mut completed, &mut failures, || {
                sinks::load_csv(&records, path)
            })?;
        }
        self.audit.log("ETL Job Ended")?;

        let mut query = None;
        if let Some(sql) = &self.config.query {
            self.attempt(Phase::Query, &mut completed, &mut failures, || {
                query = Some(db::run_query(conn, sql)?);
                Ok(())
            })?;
        }

        info!(
            records = records.len(),
            failed = failures.len(),
            "pipeline finished"
        );
        Ok(RunReport {
            records,
            completed,
            failures,
            query,
        })
    }

    /// A phase whose failure ends the run.
    fn fatal<T>(
        &self,
        phase: Phase,
        completed: &mut Vec<Phase>,
        work: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.audit.log(&format!("{} phase Started", phase))?;
        match work() {
            Ok(value) => {
                self.audit.log(&format!("{} phase Ended", phase))?;
                completed.push(phase);
                Ok(value)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// A phase whose failure is recorded and the run moves on. Only an audit
    /// log failure escapes.
    fn attempt(
        &self,
        phase: Phase,
        completed: &mut Vec<Phase>,
        failures: &mut Vec<(Phase, EtlError)>,
        work: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        self.audit.log(&format!("{} phase Started", phase))?;
        match work() {
            Ok(()) => {
                self.audit.log(&format!("{} phase Ended", phase))?;
                completed.push(phase);
            }
            Err(e) => {
                warn!(%phase, error = %e, "phase failed");
                self.audit.log(&format!("{} phase Failed: {}", phase, e))?;
                failures.push((phase, e));
            }
        }
        Ok(())
    }

    /// Record the abort, then hand the error back. A failing audit write
    /// does not mask the original error.
    fn abort(&self, err: EtlError) -> EtlError {
        if let Err(log_err) = self.audit.log(&format!("ETL Job Aborted: {}", err)) {
            warn!(error = %log_err, "could not record abort");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preset, SinkConfig};
    use crate::db::LoadMode;
    use crate::error::Sink;
    use crate::fetch::FileSource;
    use crate::parser::table::{CellKind, ColumnSpec};
    use crate::records::Value;
    use crate::transform::Rescale;
    use std::path::Path;

    struct StaticPage(&'static str);

    impl DocumentSource for StaticPage {
        fn describe(&self) -> String {
            "static".into()
        }

        fn fetch(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    impl DocumentSource for Unreachable {
        fn describe(&self) -> String {
            "unreachable".into()
        }

        fn fetch(&self) -> Result<String> {
            Err(EtlError::io(
                "unreachable",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            ))
        }
    }

    const TINY: &str = r#"<html><body>
        <table><tr><td>x</td></tr></table>
        <table><tr><td>y</td></tr></table>
        <table>
          <tr><td>World</td><td>—</td></tr>
          <tr><td>A</td><td>1,000</td></tr>
          <tr><td>B</td><td>2,500</td></tr>
        </table>
    </body></html>"#;

    fn tiny_config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            source: "static".into(),
            table_index: 2,
            skip_leading: 1,
            max_records: None,
            placeholder: "—".into(),
            schema: vec![
                ColumnSpec {
                    name: "Country".into(),
                    cell: 0,
                    kind: CellKind::Text,
                },
                ColumnSpec {
                    name: "GDP_USD_millions".into(),
                    cell: 1,
                    kind: CellKind::Numeric,
                },
            ],
            range: None,
            rescale: Some(Rescale {
                column: "GDP_USD_millions".into(),
                factor: 1000.0,
                precision: Some(2),
                rename: "GDP_USD_billions".into(),
            }),
            sinks: SinkConfig {
                db_path: dir.join("economies.db"),
                table: "Countries_by_GDP".into(),
                mode: LoadMode::Append,
                json_path: Some(dir.join("gdp.json")),
                csv_path: Some(dir.join("gdp.csv")),
            },
            log_file: dir.join("etl_log.txt"),
            query: Some("SELECT * FROM Countries_by_GDP WHERE GDP_USD_billions >= 2".into()),
        }
    }

    fn log_messages(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split_once(" : ").unwrap().1.to_string())
            .collect()
    }

    #[test]
    fn end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let report = Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.records.columns(), ["Country", "GDP_USD_billions"]);
        assert_eq!(
            report.records.rows(),
            [
                vec![Value::Text("A".into()), Value::Float(1.0)],
                vec![Value::Text("B".into()), Value::Float(2.5)],
            ]
        );
        assert_eq!(
            report.completed,
            vec![
                Phase::Extract,
                Phase::Transform,
                Phase::LoadRelational,
                Phase::LoadJson,
                Phase::LoadCsv,
                Phase::Query,
            ]
        );

        let query = report.query.unwrap();
        assert_eq!(query.len(), 1);
        assert_eq!(query.get(0, "Country"), Some(&Value::Text("B".into())));

        assert_eq!(sinks::read_json(&dir.path().join("gdp.json")).unwrap(), report.records);
        let csv = std::fs::read_to_string(dir.path().join("gdp.csv")).unwrap();
        assert_eq!(csv, "Country,GDP_USD_billions\nA,1.0\nB,2.5\n");

        assert_eq!(
            log_messages(&cfg.log_file),
            vec![
                "ETL Job Started",
                "Extract phase Started",
                "Extract phase Ended",
                "Transform phase Started",
                "Transform phase Ended",
                "Load (relational) phase Started",
                "Load (relational) phase Ended",
                "Load (json) phase Started",
                "Load (json) phase Ended",
                "Load (csv) phase Started",
                "Load (csv) phase Ended",
                "ETL Job Ended",
                "Query phase Started",
                "Query phase Ended",
                "Process Complete.",
            ]
        );
    }

    #[test]
    fn append_mode_accumulates_and_log_is_cumulative() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap();
        let second = Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap();

        assert_eq!(second.query.unwrap().len(), 2);
        // json is a snapshot, not appended
        assert_eq!(sinks::read_json(cfg.sinks.json_path.as_ref().unwrap()).unwrap().len(), 2);
        let messages = log_messages(&cfg.log_file);
        assert_eq!(messages.iter().filter(|m| *m == "ETL Job Started").count(), 2);
    }

    #[test]
    fn relational_failure_does_not_block_file_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let conn = Connection::open(&cfg.sinks.db_path).unwrap();
        conn.execute_batch("CREATE TABLE Countries_by_GDP (unrelated TEXT);")
            .unwrap();
        drop(conn);

        let report = Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap();
        assert!(!report.is_clean());
        let (phase, err) = &report.failures[0];
        assert_eq!(*phase, Phase::LoadRelational);
        assert_eq!(err.sink(), Some(Sink::Relational));
        assert!(report.completed.contains(&Phase::LoadJson));
        assert!(report.completed.contains(&Phase::LoadCsv));
        assert!(dir.path().join("gdp.json").exists());
        assert!(dir.path().join("gdp.csv").exists());

        let messages = log_messages(&cfg.log_file);
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Load (relational) phase Failed: storage error in relational sink")));
    }

    #[test]
    fn structure_error_aborts_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        cfg.table_index = 7;
        let err = Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap_err();
        assert!(matches!(err, EtlError::Structure(_)));
        assert!(!dir.path().join("gdp.json").exists());
        assert!(!dir.path().join("gdp.csv").exists());

        let messages = log_messages(&cfg.log_file);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], "Extract phase Started");
        assert!(messages[2].starts_with("ETL Job Aborted: structure error"));
    }

    #[test]
    fn retrieval_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let err = Pipeline::new(&cfg).run(&Unreachable).unwrap_err();
        assert!(matches!(err, EtlError::Io { .. }));
        let messages = log_messages(&cfg.log_file);
        assert!(messages.last().unwrap().starts_with("ETL Job Aborted: I/O error"));
    }

    #[test]
    fn transform_failure_aborts_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        cfg.schema[1].kind = CellKind::Text;
        let err = Pipeline::new(&cfg).run(&StaticPage(TINY)).unwrap_err();
        assert!(matches!(err, EtlError::Type { row: 0, .. }));
        assert!(!dir.path().join("gdp.csv").exists());
        let messages = log_messages(&cfg.log_file);
        assert!(messages.contains(&"Extract phase Ended".to_string()));
        assert!(!messages.iter().any(|m| m.starts_with("Load")));
    }

    #[test]
    fn films_preset_on_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::preset(Preset::Films);
        cfg.sinks.db_path = dir.path().join("Movies.db");
        cfg.sinks.csv_path = Some(dir.path().join("top_50_films.csv"));
        cfg.log_file = dir.path().join("log.txt");

        let source = FileSource::new("tests/fixtures/films.html");
        let first = Pipeline::new(&cfg).run(&source).unwrap();
        let films: Vec<&str> = first
            .records
            .rows()
            .iter()
            .filter_map(|r| r[0].as_str())
            .collect();
        assert_eq!(
            films,
            vec![
                "Spirited Away",
                "Memento",
                "WALL-E",
                "City of God",
                "The Dark Knight",
                "Eternal Sunshine of the Spotless Mind",
            ]
        );
        assert_eq!(first.records.get(0, "Year"), Some(&Value::Integer(2001)));
        assert_eq!(first.completed.last(), Some(&Phase::LoadCsv));

        // replace mode: a second run leaves the same rows, not twice as many
        Pipeline::new(&cfg).run(&source).unwrap();
        let conn = Connection::open(&cfg.sinks.db_path).unwrap();
        let all = db::run_query(&conn, "SELECT * FROM Top_50").unwrap();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn gdp_preset_preview_on_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::gdp();
        cfg.log_file = dir.path().join("log.txt");
        let records = Pipeline::new(&cfg)
            .preview(&FileSource::new("tests/fixtures/gdp.html"))
            .unwrap();
        assert_eq!(records.columns(), ["Country", "GDP_USD_billions"]);
        assert_eq!(records.get(0, "GDP_USD_billions"), Some(&Value::Float(26854.6)));
        assert_eq!(records.get(3, "Country"), Some(&Value::Text("Tuvalu".into())));
        assert_eq!(records.get(3, "GDP_USD_billions"), Some(&Value::Float(0.06)));
        assert!(!cfg.log_file.exists());
    }
}
