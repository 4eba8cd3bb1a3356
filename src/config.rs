//! Pipeline configuration: built-in preset, then an optional TOML file, then
//! `ETL_*` environment variables (`ETL_SINKS__DB_PATH=/tmp/x.db`).

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::db::LoadMode;
use crate::error::Result;
use crate::parser::select::{RangeRule, RowFilter};
use crate::parser::table::{numeric_cells, required_cells, CellKind, ColumnSpec, TableSpec};
use crate::transform::Rescale;

const GDP_URL: &str = "https://web.archive.org/web/20230902185326/https://en.wikipedia.org/wiki/List_of_countries_by_GDP_%28nominal%29";
const FILMS_URL: &str = "https://web.archive.org/web/20230902185655/https://en.everybodywiki.com/100_Most_Highly-Ranked_Films";
const NO_DATA: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Countries by nominal GDP, rescaled to billions.
    Gdp,
    /// Top films of the 2000s.
    Films,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub db_path: PathBuf,
    pub table: String,
    pub mode: LoadMode,
    pub json_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// URL or local file path of the page.
    pub source: String,
    pub table_index: usize,
    pub skip_leading: usize,
    pub max_records: Option<usize>,
    pub placeholder: String,
    pub schema: Vec<ColumnSpec>,
    pub range: Option<RangeRule>,
    pub rescale: Option<Rescale>,
    pub sinks: SinkConfig,
    pub log_file: PathBuf,
    pub query: Option<String>,
}

fn column(name: &str, cell: usize, kind: CellKind) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        cell,
        kind,
    }
}

impl PipelineConfig {
    pub fn gdp() -> Self {
        PipelineConfig {
            source: GDP_URL.to_string(),
            table_index: 2,
            skip_leading: 3,
            max_records: None,
            placeholder: NO_DATA.to_string(),
            schema: vec![
                column("Country", 0, CellKind::LinkText),
                column("GDP_USD_millions", 2, CellKind::Numeric),
            ],
            range: None,
            rescale: Some(Rescale {
                column: "GDP_USD_millions".to_string(),
                factor: 1000.0,
                precision: Some(2),
                rename: "GDP_USD_billions".to_string(),
            }),
            sinks: SinkConfig {
                db_path: PathBuf::from("World_Economies.db"),
                table: "Countries_by_GDP".to_string(),
                mode: LoadMode::Append,
                json_path: Some(PathBuf::from("Countries_by_GDP.json")),
                csv_path: Some(PathBuf::from("Countries_by_GDP.csv")),
            },
            log_file: PathBuf::from("etl_project_log.txt"),
            query: Some(
                "SELECT * FROM Countries_by_GDP WHERE GDP_USD_billions >= 100".to_string(),
            ),
        }
    }

    pub fn films() -> Self {
        PipelineConfig {
            source: FILMS_URL.to_string(),
            table_index: 0,
            skip_leading: 0,
            max_records: Some(25),
            placeholder: NO_DATA.to_string(),
            schema: vec![
                column("Film", 1, CellKind::Text),
                column("Year", 2, CellKind::Integer),
                column("Rotten Tomatoes' Top 100", 3, CellKind::Text),
            ],
            range: Some(RangeRule {
                cell: 2,
                min: 2000,
                max: 2009,
            }),
            rescale: None,
            sinks: SinkConfig {
                db_path: PathBuf::from("Movies.db"),
                table: "Top_50".to_string(),
                mode: LoadMode::Replace,
                json_path: None,
                csv_path: Some(PathBuf::from("top_50_films.csv")),
            },
            log_file: PathBuf::from("etl_project_log.txt"),
            query: None,
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Gdp => Self::gdp(),
            Preset::Films => Self::films(),
        }
    }

    /// Layer an optional file and the environment over a preset.
    pub fn load(preset: Preset, file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::preset(preset))?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let cfg = builder
            .add_source(
                Environment::with_prefix("ETL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn table_spec(&self) -> TableSpec {
        let mut min_cells = required_cells(&self.schema);
        if let Some(rule) = &self.range {
            min_cells = min_cells.max(rule.cell + 1);
        }
        TableSpec {
            table_index: self.table_index,
            schema: self.schema.clone(),
            filter: RowFilter {
                skip_leading: self.skip_leading,
                max_records: self.max_records,
                min_cells,
                placeholder: self.placeholder.clone(),
                guarded_cells: numeric_cells(&self.schema),
                range: self.range.clone(),
            },
        }
    }
}
