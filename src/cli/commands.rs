use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use crate::actor::{Actor, ActorResolver, DbActorResolver};
use crate::association::{associate_inputs_by_code, clear_input_bindings};
use crate::cli::error::IdList;
use crate::config::Config;
use crate::db::DbConnection;
use crate::error::SapError;
use crate::models::{
    Input, Layer, LayerRule, LayerStyle, ModelProfile, Product, QgisMenu, QgisModel, RuleGroup, RuleProfile,
    StyleProfile, WorkUnit,
};
use crate::pipeline;
use crate::repo::{
    ActivityRepo, FmeProfileRepo, FmeServerRepo, InputRepo, LayerRepo, ModelProfileRepo, ProductionRepo,
    QgisMenuRepo, QgisModelRepo, RuleGroupRepo, RuleProfileRepo, RuleRepo, StageRepo, StyleProfileRepo,
    StyleRepo, WorkUnitRepo,
};
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "sap")]
#[command(about = "Production pipeline manager for geospatial mapping projects")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Acting user id for owner stamping (overrides user.id in the rc file)
    #[arg(long, global = true)]
    pub user: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Review and correction cycles
    Review {
        #[command(subcommand)]
        subcommand: ReviewCommands,
    },
    /// Activity assignment
    Activities {
        #[command(subcommand)]
        subcommand: ActivityCommands,
    },
    /// Work unit management
    Units {
        #[command(subcommand)]
        subcommand: UnitCommands,
    },
    /// Inputs and their association with work units
    Inputs {
        #[command(subcommand)]
        subcommand: InputCommands,
    },
    /// Products of a production line
    Products {
        #[command(subcommand)]
        subcommand: ProductCommands,
    },
    /// List entities as JSON
    List {
        entity: ListEntity,
    },
    /// Create, update and delete catalog entries and profiles
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogCommands,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Put work units through a review stage followed by a correction stage
    Create {
        /// Work unit IDs (e.g., 1,2,5-7)
        units: IdList,
    },
    /// Put work units through a combined review/correction stage
    CreateCombined {
        /// Work unit IDs
        units: IdList,
    },
    /// Remove a review stage and its paired correction stage
    Remove {
        /// Review stage ID
        #[arg(value_parser = crate::cli::error::validate_id)]
        stage: i64,
    },
}

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Create not-started activities for work units in a stage
    Create {
        /// Work unit IDs
        units: IdList,
        /// Target stage ID
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        stage: i64,
    },
    /// Delete activities that are not started or paused
    Delete {
        /// Activity IDs
        activities: IdList,
    },
    /// List activities of a work unit
    List {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        unit: i64,
    },
}

#[derive(Subcommand)]
pub enum UnitCommands {
    /// Create work units from a JSON array
    Create {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        subphase: i64,
        /// JSON file with the work units
        #[arg(long)]
        file: PathBuf,
    },
    /// Copy work units into the subphase of the given stages
    Copy {
        /// Work unit IDs
        units: IdList,
        /// Target stage IDs; the first decides the destination subphase
        #[arg(long)]
        stages: IdList,
        /// Also copy the input bindings of each unit
        #[arg(long)]
        with_inputs: bool,
    },
    /// Delete work units whose activities have not started
    Delete {
        /// Work unit IDs
        units: IdList,
    },
    /// Move work units to a lot
    SetLot {
        /// Work unit IDs
        units: IdList,
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        lot: i64,
    },
    /// List work units of a subphase
    List {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        subphase: i64,
    },
}

#[derive(Subcommand)]
pub enum InputCommands {
    /// Bind the inputs of a group to work units by a spatial strategy
    Associate {
        /// Work unit IDs
        units: IdList,
        /// Input group ID
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        group: i64,
        /// Strategy code (see `sap inputs strategies`)
        #[arg(long)]
        strategy: i64,
        /// Default path stored on each binding
        #[arg(long)]
        default_path: Option<String>,
    },
    /// Remove input bindings of work units
    Clear {
        /// Work unit IDs
        units: IdList,
        /// Only remove bindings to inputs of this group
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        group: Option<i64>,
    },
    /// Create inputs from a JSON array
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Create an input group
    CreateGroup {
        name: String,
    },
    /// List input bindings of a work unit
    Bindings {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        unit: i64,
    },
    /// List association strategies
    Strategies,
    /// List input groups
    Groups,
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Create products from a JSON array
    Create {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        line: i64,
        #[arg(long)]
        file: PathBuf,
    },
    /// List products of a production line
    List {
        #[arg(long, value_parser = crate::cli::error::validate_id)]
        line: i64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListEntity {
    Projects,
    Lines,
    Phases,
    Subphases,
    Stages,
    Lots,
    ProductionData,
    Databases,
    Styles,
    StyleNames,
    Rules,
    RuleGroups,
    Models,
    Menus,
    Layers,
    FmeServers,
    FmeProfiles,
    ModelProfiles,
    RuleProfiles,
    StyleProfiles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CatalogKind {
    Style,
    Rule,
    RuleGroup,
    Model,
    Menu,
    Layer,
    FmeServer,
    FmeProfile,
    ModelProfile,
    RuleProfile,
    StyleProfile,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Create entries from a JSON array
    Create {
        kind: CatalogKind,
        #[arg(long)]
        file: PathBuf,
    },
    /// Update entries (each with its id) from a JSON array
    Update {
        kind: CatalogKind,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete entries by id
    Delete {
        kind: CatalogKind,
        ids: IdList,
    },
}

pub fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Prints help/version or the usage error and exits
        Err(e) => e.exit(),
    };
    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    let conn = DbConnection::connect()
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Review { subcommand } => handle_review(&conn, subcommand),
        Commands::Activities { subcommand } => handle_activities(&conn, subcommand),
        Commands::Units { subcommand } => handle_units(&conn, subcommand),
        Commands::Inputs { subcommand } => handle_inputs(&conn, subcommand),
        Commands::Products { subcommand } => handle_products(&conn, subcommand),
        Commands::List { entity } => handle_list(&conn, entity),
        Commands::Catalog { subcommand } => handle_catalog(&conn, subcommand, cli.user),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a JSON array of records from a file
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<T> = serde_json::from_str(&contents).map_err(|e| {
        SapError::Validation(format!("Invalid JSON in {}: {}", path.display(), e))
    })?;
    if records.is_empty() {
        return Err(SapError::Validation(format!("{} contains no records", path.display())).into());
    }
    Ok(records)
}

/// Acting user from `--user` or the rc file
fn resolve_actor(conn: &Connection, user_flag: Option<i64>) -> Result<Actor> {
    let user_id = match user_flag {
        Some(id) => id,
        None => Config::load()?.user_id.ok_or_else(|| {
            SapError::Validation("No acting user: pass --user or set user.id in the rc file".to_string())
        })?,
    };
    DbActorResolver::new(conn).resolve(user_id)
}

fn handle_review(conn: &Connection, cmd: ReviewCommands) -> Result<()> {
    match cmd {
        ReviewCommands::Create { units } => {
            let assignments = pipeline::create_review_cycle(conn, units.as_slice())?;
            print_json(&assignments)
        }
        ReviewCommands::CreateCombined { units } => {
            let assignments = pipeline::create_review_correction_cycle(conn, units.as_slice())?;
            print_json(&assignments)
        }
        ReviewCommands::Remove { stage } => {
            let pair = pipeline::remove_review_cycle(conn, stage)?;
            println!(
                "Removed review stage {} and correction stage {}",
                pair.review_stage_id, pair.correction_stage_id
            );
            Ok(())
        }
    }
}

fn handle_activities(conn: &Connection, cmd: ActivityCommands) -> Result<()> {
    match cmd {
        ActivityCommands::Create { units, stage } => {
            let created = pipeline::create_activities(conn, units.as_slice(), stage)?;
            println!("Created {} activities in stage {}", created, stage);
            Ok(())
        }
        ActivityCommands::Delete { activities } => {
            let deleted = pipeline::delete_activities(conn, activities.as_slice())?;
            println!("Deleted {} activities", deleted);
            Ok(())
        }
        ActivityCommands::List { unit } => print_json(&ActivityRepo::list_by_work_unit(conn, unit)?),
    }
}

fn handle_units(conn: &Connection, cmd: UnitCommands) -> Result<()> {
    match cmd {
        UnitCommands::Create { subphase, file } => {
            let units: Vec<WorkUnit> = read_records(&file)?;
            let ids = WorkUnitRepo::create_many(conn, &units, subphase)?;
            println!("Created {} work units in subphase {}", ids.len(), subphase);
            Ok(())
        }
        UnitCommands::Copy { units, stages, with_inputs } => {
            let copies = pipeline::copy_work_units(conn, units.as_slice(), stages.as_slice(), with_inputs)?;
            print_json(&copies)
        }
        UnitCommands::Delete { units } => {
            let deleted = WorkUnitRepo::delete(conn, units.as_slice())?;
            println!("Deleted {} work units", deleted);
            Ok(())
        }
        UnitCommands::SetLot { units, lot } => {
            let updated = WorkUnitRepo::set_lot(conn, units.as_slice(), lot)?;
            println!("Moved {} work units to lot {}", updated, lot);
            Ok(())
        }
        UnitCommands::List { subphase } => print_json(&WorkUnitRepo::list_by_subphase(conn, subphase)?),
    }
}

fn handle_inputs(conn: &Connection, cmd: InputCommands) -> Result<()> {
    match cmd {
        InputCommands::Associate { units, group, strategy, default_path } => {
            let created = associate_inputs_by_code(
                conn,
                units.as_slice(),
                group,
                strategy,
                default_path.as_deref(),
            )?;
            println!("Created {} input bindings", created);
            Ok(())
        }
        InputCommands::Clear { units, group } => {
            let removed = clear_input_bindings(conn, units.as_slice(), group)?;
            println!("Removed {} input bindings", removed);
            Ok(())
        }
        InputCommands::Create { file } => {
            let inputs: Vec<Input> = read_records(&file)?;
            let ids = InputRepo::create_many(conn, &inputs)?;
            println!("Created {} inputs", ids.len());
            Ok(())
        }
        InputCommands::CreateGroup { name } => {
            let group = InputRepo::create_group(conn, &name)?;
            println!("Created input group '{}' (id: {})", group.name, group.id);
            Ok(())
        }
        InputCommands::Bindings { unit } => print_json(&InputRepo::list_bindings(conn, unit)?),
        InputCommands::Strategies => print_json(&InputRepo::list_strategies(conn)?),
        InputCommands::Groups => print_json(&InputRepo::list_groups(conn)?),
    }
}

fn handle_products(conn: &Connection, cmd: ProductCommands) -> Result<()> {
    match cmd {
        ProductCommands::Create { line, file } => {
            let products: Vec<Product> = read_records(&file)?;
            let ids = ProductionRepo::create_products(conn, &products, line)?;
            println!("Created {} products in production line {}", ids.len(), line);
            Ok(())
        }
        ProductCommands::List { line } => print_json(&ProductionRepo::list_products(conn, line)?),
    }
}

fn handle_list(conn: &Connection, entity: ListEntity) -> Result<()> {
    match entity {
        ListEntity::Projects => print_json(&ProductionRepo::list_projects(conn)?),
        ListEntity::Lines => print_json(&ProductionRepo::list_production_lines(conn)?),
        ListEntity::Phases => print_json(&ProductionRepo::list_phases(conn)?),
        ListEntity::Subphases => print_json(&ProductionRepo::list_subphases(conn)?),
        ListEntity::Stages => print_json(&StageRepo::list_all(conn)?),
        ListEntity::Lots => print_json(&ProductionRepo::list_lots(conn)?),
        ListEntity::ProductionData => print_json(&ProductionRepo::list_production_data(conn)?),
        ListEntity::Databases => print_json(&ProductionRepo::list_databases(conn)?),
        ListEntity::Styles => print_json(&StyleRepo::list(conn)?),
        ListEntity::StyleNames => print_json(&StyleRepo::list_names(conn)?),
        ListEntity::Rules => print_json(&RuleRepo::list(conn)?),
        ListEntity::RuleGroups => print_json(&RuleGroupRepo::list(conn)?),
        ListEntity::Models => print_json(&QgisModelRepo::list(conn)?),
        ListEntity::Menus => print_json(&QgisMenuRepo::list(conn)?),
        ListEntity::Layers => print_json(&LayerRepo::list(conn)?),
        ListEntity::FmeServers => print_json(&FmeServerRepo::list(conn)?),
        ListEntity::FmeProfiles => print_json(&FmeProfileRepo::list(conn)?),
        ListEntity::ModelProfiles => print_json(&ModelProfileRepo::list(conn)?),
        ListEntity::RuleProfiles => print_json(&RuleProfileRepo::list(conn)?),
        ListEntity::StyleProfiles => print_json(&StyleProfileRepo::list(conn)?),
    }
}

/// Create or update FME servers and profiles, probing them through the FME manager
#[cfg(feature = "fme-http")]
fn write_fme_entries(conn: &Connection, kind: CatalogKind, file: &Path, update: bool) -> Result<usize> {
    use crate::external::HttpJobService;
    use crate::models::{FmeProfile, FmeServer};

    let service = HttpJobService::new(&FmeServerRepo::list(conn)?);
    match kind {
        CatalogKind::FmeServer => {
            let records = read_records::<FmeServer>(file)?;
            if update {
                FmeServerRepo::update(conn, &records, &service)?;
                Ok(records.len())
            } else {
                Ok(FmeServerRepo::create(conn, &records, &service)?.len())
            }
        }
        _ => {
            let records = read_records::<FmeProfile>(file)?;
            if update {
                FmeProfileRepo::update(conn, &records, &service)?;
                Ok(records.len())
            } else {
                Ok(FmeProfileRepo::create(conn, &records, &service)?.len())
            }
        }
    }
}

/// Without an FME manager client, servers and profiles can only be listed and deleted
#[cfg(not(feature = "fme-http"))]
fn write_fme_entries(_conn: &Connection, kind: CatalogKind, _file: &Path, _update: bool) -> Result<usize> {
    Err(SapError::Validation(format!(
        "{:?} entries can only be created or updated with the fme-http feature",
        kind
    ))
    .into())
}

fn handle_catalog(conn: &Connection, cmd: CatalogCommands, user: Option<i64>) -> Result<()> {
    match cmd {
        CatalogCommands::Create { kind, file } => {
            let created = match kind {
                CatalogKind::Style => {
                    let actor = resolve_actor(conn, user)?;
                    StyleRepo::create(conn, &read_records::<LayerStyle>(&file)?, &actor)?.len()
                }
                CatalogKind::Rule => {
                    let actor = resolve_actor(conn, user)?;
                    RuleRepo::create(conn, &read_records::<LayerRule>(&file)?, &actor)?.len()
                }
                CatalogKind::Model => {
                    let actor = resolve_actor(conn, user)?;
                    QgisModelRepo::create(conn, &read_records::<QgisModel>(&file)?, &actor)?.len()
                }
                CatalogKind::Menu => {
                    let actor = resolve_actor(conn, user)?;
                    QgisMenuRepo::create(conn, &read_records::<QgisMenu>(&file)?, &actor)?.len()
                }
                CatalogKind::RuleGroup => RuleGroupRepo::create(conn, &read_records::<RuleGroup>(&file)?)?.len(),
                CatalogKind::Layer => LayerRepo::create(conn, &read_records::<Layer>(&file)?)?.len(),
                CatalogKind::ModelProfile => {
                    ModelProfileRepo::create(conn, &read_records::<ModelProfile>(&file)?)?.len()
                }
                CatalogKind::RuleProfile => RuleProfileRepo::create(conn, &read_records::<RuleProfile>(&file)?)?.len(),
                CatalogKind::StyleProfile => {
                    StyleProfileRepo::create(conn, &read_records::<StyleProfile>(&file)?)?.len()
                }
                CatalogKind::FmeServer | CatalogKind::FmeProfile => write_fme_entries(conn, kind, &file, false)?,
            };
            println!("Created {} {:?} entries", created, kind);
            Ok(())
        }
        CatalogCommands::Update { kind, file } => {
            let updated = match kind {
                CatalogKind::Style => {
                    let actor = resolve_actor(conn, user)?;
                    let records = read_records::<LayerStyle>(&file)?;
                    StyleRepo::update(conn, &records, &actor)?;
                    records.len()
                }
                CatalogKind::Rule => {
                    let actor = resolve_actor(conn, user)?;
                    let records = read_records::<LayerRule>(&file)?;
                    RuleRepo::update(conn, &records, &actor)?;
                    records.len()
                }
                CatalogKind::Model => {
                    let actor = resolve_actor(conn, user)?;
                    let records = read_records::<QgisModel>(&file)?;
                    QgisModelRepo::update(conn, &records, &actor)?;
                    records.len()
                }
                CatalogKind::Menu => {
                    let actor = resolve_actor(conn, user)?;
                    let records = read_records::<QgisMenu>(&file)?;
                    QgisMenuRepo::update(conn, &records, &actor)?;
                    records.len()
                }
                CatalogKind::RuleGroup => {
                    let records = read_records::<RuleGroup>(&file)?;
                    RuleGroupRepo::update(conn, &records)?;
                    records.len()
                }
                CatalogKind::Layer => {
                    let records = read_records::<Layer>(&file)?;
                    LayerRepo::update(conn, &records)?;
                    records.len()
                }
                CatalogKind::ModelProfile => {
                    let records = read_records::<ModelProfile>(&file)?;
                    ModelProfileRepo::update(conn, &records)?;
                    records.len()
                }
                CatalogKind::RuleProfile => {
                    let records = read_records::<RuleProfile>(&file)?;
                    RuleProfileRepo::update(conn, &records)?;
                    records.len()
                }
                CatalogKind::StyleProfile => {
                    let records = read_records::<StyleProfile>(&file)?;
                    StyleProfileRepo::update(conn, &records)?;
                    records.len()
                }
                CatalogKind::FmeServer | CatalogKind::FmeProfile => write_fme_entries(conn, kind, &file, true)?,
            };
            println!("Updated {} {:?} entries", updated, kind);
            Ok(())
        }
        CatalogCommands::Delete { kind, ids } => {
            let ids = ids.as_slice();
            let deleted = match kind {
                CatalogKind::Style => StyleRepo::delete(conn, ids)?,
                CatalogKind::Rule => RuleRepo::delete(conn, ids)?,
                CatalogKind::RuleGroup => RuleGroupRepo::delete(conn, ids)?,
                CatalogKind::Model => QgisModelRepo::delete(conn, ids)?,
                CatalogKind::Menu => QgisMenuRepo::delete(conn, ids)?,
                CatalogKind::Layer => LayerRepo::delete(conn, ids)?,
                CatalogKind::FmeServer => FmeServerRepo::delete(conn, ids)?,
                CatalogKind::FmeProfile => FmeProfileRepo::delete(conn, ids)?,
                CatalogKind::ModelProfile => ModelProfileRepo::delete(conn, ids)?,
                CatalogKind::RuleProfile => RuleProfileRepo::delete(conn, ids)?,
                CatalogKind::StyleProfile => StyleProfileRepo::delete(conn, ids)?,
            };
            println!("Deleted {} {:?} entries", deleted, kind);
            Ok(())
        }
    }
}
