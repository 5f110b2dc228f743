use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use squad_core::plan::selection::derive_seed;
use squad_core::{
    audit_plan, load_squad_config, player_frequency, predict_pool, rate_players, ArchiveOutcome,
    GenerationStats, HorizonPlan, HorizonPlanner, HorizonRequest, ImportSummary, Objective,
    ObjectiveKey, Player, PlayerFrequency, PlayerImport, PlayerStore, PlanAuditFinding, Position,
    SearchConfig, SequenceSearch, SimilarityGraph, Squad, SquadArchive, SquadConfig,
    SquadEnumerator, SquadOptimizer, SquadRules, SqlitePlayerStore, StoreCounts,
};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] squad_core::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] squad_core::StoreError),
    #[error("{0}")]
    Squad(#[from] squad_core::SquadError),
    #[error("archive error: {0}")]
    Archive(#[from] squad_core::ArchiveError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("plan failed verification with {0} finding(s)")]
    PlanRejected(usize),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fantasy squad optimizer and horizon planner", long_about = None)]
pub struct Cli {
    /// Path to squad.toml
    #[arg(long, default_value = "configs/squad.toml")]
    pub config: PathBuf,
    /// Alternative path to the player database
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Alternative directory for the per-period squad archives
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Seed for every randomized step; overrides `[search].seed`
    #[arg(long)]
    pub seed: Option<u64>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Creates the database schema
    Init,
    /// Bulk-imports teams, players, fixtures and events from JSON
    Import(ImportArgs),
    /// Shows table counts, known fixtures and archives
    Status,
    /// Lists players
    Players(PlayersArgs),
    /// Single-period squad selection
    #[command(subcommand)]
    Squad(SquadCommands),
    /// Multi-period planning
    #[command(subcommand)]
    Horizon(HorizonCommands),
    /// Analysis of archived squads
    #[command(subcommand)]
    Archive(ArchiveCommands),
    /// Star ratings
    #[command(subcommand)]
    Ratings(RatingsCommands),
    /// Checks configuration, database and archive directory
    Health,
    /// Prints shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON document with `teams` and `players`
    pub file: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlayerSort {
    Name,
    Position,
    Club,
    Price,
    Points,
}

#[derive(Args, Debug)]
pub struct PlayersArgs {
    /// Show points for this fixture instead of season totals
    #[arg(long)]
    pub fixture: Option<String>,
    /// Only players with more points than this
    #[arg(long)]
    pub min_points: Option<i64>,
    #[arg(long)]
    pub position: Option<Position>,
    #[arg(long)]
    pub club: Option<String>,
    #[arg(long, value_enum, default_value_t = PlayerSort::Points)]
    pub sort: PlayerSort,
    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

#[derive(Subcommand, Debug)]
pub enum SquadCommands {
    /// Optimal squad for one fixture or for the season table
    Best(BestArgs),
    /// Lists legal squads with fixed per-position counts
    Enumerate(EnumerateArgs),
    /// Stars-weighted squad from the clubs favoured by a fixture's matchups
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct BestArgs {
    #[arg(long)]
    pub fixture: Option<String>,
    #[arg(long, default_value_t = ObjectiveKey::Points)]
    pub objective: ObjectiveKey,
    /// Secondary key blended into the objective
    #[arg(long)]
    pub secondary: Option<ObjectiveKey>,
    #[arg(long, default_value_t = 0.5)]
    pub weight: f64,
    /// Overrides `[rules].budget`
    #[arg(long)]
    pub budget: Option<i64>,
    /// Submit the squad to the fixture's archive
    #[arg(long, default_value_t = false)]
    pub save: bool,
}

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    /// Overrides `[enumeration].min_points`
    #[arg(long)]
    pub min_points: Option<i64>,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Fixture whose `[predict.matchups]` entry drives the club ranking
    #[arg(long)]
    pub fixture: String,
    /// Overrides `[predict].top_clubs`
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum HorizonCommands {
    /// Greedy period-by-period plan under the transfer cap
    Plan(HorizonPlanArgs),
    /// Population search over plans
    Search(HorizonSearchArgs),
    /// Audits a saved plan
    Verify(HorizonVerifyArgs),
}

#[derive(Args, Debug)]
pub struct HorizonPlanArgs {
    /// Comma-separated fixture ids, in order
    #[arg(long, value_delimiter = ',', required = true)]
    pub fixtures: Vec<String>,
    /// JSON squad used for the first fixture
    #[arg(long)]
    pub start: Option<PathBuf>,
    #[arg(long, default_value_t = ObjectiveKey::Points)]
    pub objective: ObjectiveKey,
    /// Overrides `[rules].max_substitutions`
    #[arg(long)]
    pub max_subs: Option<usize>,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct HorizonSearchArgs {
    #[arg(long, value_delimiter = ',', required = true)]
    pub fixtures: Vec<String>,
    #[arg(long)]
    pub population: Option<usize>,
    #[arg(long)]
    pub generations: Option<usize>,
    #[arg(long)]
    pub mutation: Option<f64>,
    #[arg(long)]
    pub max_subs: Option<usize>,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct HorizonVerifyArgs {
    pub plan: PathBuf,
    #[arg(long)]
    pub max_subs: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// How often each player appears in an archive
    Frequency(ArchiveFileArgs),
    /// Squads linked by shared players
    Graph(ArchiveGraphArgs),
}

#[derive(Args, Debug)]
pub struct ArchiveFileArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ArchiveGraphArgs {
    pub file: PathBuf,
    #[arg(long, default_value_t = squad_core::analysis::DEFAULT_MIN_COMMON)]
    pub min_common: usize,
}

#[derive(Subcommand, Debug)]
pub enum RatingsCommands {
    /// Recomputes star ratings and stores them
    Update(RatingsUpdateArgs),
}

#[derive(Args, Debug)]
pub struct RatingsUpdateArgs {
    /// Compute without writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(args.shell, &mut command, name, &mut io::stdout());
        return Ok(());
    }

    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Init => render(&context.init()?, cli.format)?,
        Commands::Import(args) => render(&context.import(args)?, cli.format)?,
        Commands::Status => render(&context.gather_status()?, cli.format)?,
        Commands::Players(args) => render(&context.players(args)?, cli.format)?,
        Commands::Squad(SquadCommands::Best(args)) => {
            render(&context.squad_best(args)?, cli.format)?
        }
        Commands::Squad(SquadCommands::Enumerate(args)) => {
            render(&context.squad_enumerate(args)?, cli.format)?
        }
        Commands::Squad(SquadCommands::Predict(args)) => {
            render(&context.squad_predict(args)?, cli.format)?
        }
        Commands::Horizon(HorizonCommands::Plan(args)) => {
            render(&context.horizon_plan(args)?, cli.format)?
        }
        Commands::Horizon(HorizonCommands::Search(args)) => {
            render(&context.horizon_search(args)?, cli.format)?
        }
        Commands::Horizon(HorizonCommands::Verify(args)) => {
            let report = context.horizon_verify(args)?;
            render(&report, cli.format)?;
            if !report.findings.is_empty() {
                return Err(AppError::PlanRejected(report.findings.len()));
            }
        }
        Commands::Archive(ArchiveCommands::Frequency(args)) => {
            render(&context.archive_frequency(args)?, cli.format)?
        }
        Commands::Archive(ArchiveCommands::Graph(args)) => {
            render(&context.archive_graph(args)?, cli.format)?
        }
        Commands::Ratings(RatingsCommands::Update(args)) => {
            render(&context.ratings_update(args)?, cli.format)?
        }
        Commands::Health => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
        Commands::Completions(_) => {}
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: SquadConfig,
    config_path: PathBuf,
    database: PathBuf,
    archive_dir: PathBuf,
    seed: u64,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_squad_config(&config_path)?;
        config.validate()?;

        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| config.database_path());
        let archive_dir = cli
            .archive_dir
            .clone()
            .unwrap_or_else(|| config.resolve_path(&config.paths.archive_dir));
        let seed = cli.seed.unwrap_or(config.search.seed);

        Ok(Self {
            config,
            config_path,
            database,
            archive_dir,
            seed,
        })
    }

    fn rules(&self) -> Result<SquadRules> {
        Ok(self.config.rules()?)
    }

    fn store(&self) -> Result<SqlitePlayerStore> {
        if !self.database.exists() {
            return Err(AppError::MissingResource(format!(
                "database {} not found, run `squadctl init` first",
                self.database.display()
            )));
        }
        Ok(SqlitePlayerStore::builder()
            .path(&self.database)
            .create_if_missing(false)
            .build()?)
    }

    fn rng(&self, stage: &str) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(derive_seed(self.seed, stage))
    }

    fn archive_path(&self, period: &str) -> PathBuf {
        self.archive_dir.join(format!("{period}.json"))
    }

    fn max_subs(&self, value: Option<usize>) -> usize {
        value.unwrap_or(self.config.rules.max_substitutions)
    }

    fn init(&self) -> Result<InitReport> {
        if let Some(parent) = self.database.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = SqlitePlayerStore::builder()
            .path(&self.database)
            .create_if_missing(true)
            .build()?;
        store.initialize()?;
        info!(target: "squadctl", database = %self.database.display(), "schema ready");
        Ok(InitReport {
            database: self.database.display().to_string(),
            counts: store.counts()?,
        })
    }

    fn import(&self, args: &ImportArgs) -> Result<ImportSummary> {
        let content = fs::read_to_string(&args.file)?;
        let import: PlayerImport = serde_json::from_str(&content)?;
        Ok(self.store()?.import(&import)?)
    }

    fn gather_status(&self) -> Result<StatusReport> {
        let store = self.store()?;
        let mut archives = BTreeMap::new();
        if let Ok(entries) = fs::read_dir(&self.archive_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                let Some(period) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                let squads = SquadArchive::load(&path).map(|a| a.len()).unwrap_or(0);
                archives.insert(period.to_string(), squads);
            }
        }
        Ok(StatusReport {
            database: self.database.display().to_string(),
            counts: store.counts()?,
            fixtures: store.list_fixtures()?,
            archives,
        })
    }

    fn players(&self, args: &PlayersArgs) -> Result<PlayerList> {
        let store = self.store()?;
        let mut rows = match (&args.fixture, args.position, &args.club) {
            (Some(fixture), _, _) => store.get_players_by_fixture(fixture)?,
            (None, Some(position), Some(club)) => {
                store.get_players_by_position_and_club(position, club)?
            }
            (None, _, _) => match args.min_points {
                Some(threshold) => store.get_players_min_points(threshold)?,
                None => store.get_all_players()?,
            },
        };
        rows.retain(|player| {
            args.position.map_or(true, |p| player.position == p)
                && args.club.as_ref().map_or(true, |c| &player.club == c)
                && args.min_points.map_or(true, |n| player.points > n)
        });
        sort_players(&mut rows, args.sort);
        let total = rows.len();
        rows.truncate(args.limit);
        Ok(PlayerList { total, rows })
    }

    fn squad_best(&self, args: &BestArgs) -> Result<SquadReport> {
        let store = self.store()?;
        let mut rules = self.rules()?;
        if let Some(budget) = args.budget {
            rules = rules.with_budget(budget);
        }
        let objective = match args.secondary {
            Some(secondary) => Objective::blended(args.objective, secondary, args.weight),
            None => Objective::single(args.objective),
        };
        let pool = match &args.fixture {
            Some(fixture) => store.get_players_by_fixture(fixture)?,
            None => store.get_all_players()?,
        };
        let mut rng = self.rng("shuffle");
        let squad = SquadOptimizer::new().select(
            &pool,
            &objective,
            &rules,
            None,
            Some(&mut rng as &mut dyn RngCore),
        )?;

        let archived = if args.save {
            let period = args.fixture.as_deref().unwrap_or("season");
            let mut archive = SquadArchive::load(self.archive_path(period))?;
            Some(archive.submit(squad.clone())?)
        } else {
            None
        };

        Ok(SquadReport {
            fixture: args.fixture.clone(),
            objective: objective.to_string(),
            total_points: squad.total_points(),
            total_cost: squad.total_cost(),
            total_stars: squad.total_stars(),
            squad,
            archived,
        })
    }

    fn squad_enumerate(&self, args: &EnumerateArgs) -> Result<EnumerationReport> {
        let store = self.store()?;
        let rules = self.rules()?;
        let counts = self.config.enumeration_counts()?;
        let min_points = args.min_points.unwrap_or(self.config.enumeration.min_points);
        let players = store.get_all_players()?;
        let enumerator = SquadEnumerator::new(&players, min_points, &counts, &rules)?;
        let squads: Vec<Squad> = enumerator.iter().take(args.limit).collect();
        Ok(EnumerationReport {
            min_points,
            combinations: enumerator.combination_count(),
            squads,
        })
    }

    fn squad_predict(&self, args: &PredictArgs) -> Result<PredictReport> {
        let matchups = self
            .config
            .predict
            .matchups(&args.fixture)
            .ok_or_else(|| {
                AppError::MissingResource(format!(
                    "no [predict.matchups] entry for {}",
                    args.fixture
                ))
            })?;
        let store = self.store()?;
        let top = args.top.unwrap_or(self.config.predict.top_clubs);
        let pool = predict_pool(&store, store.list_teams()?, matchups, top)?;

        let objective = Objective::blended(ObjectiveKey::Stars, ObjectiveKey::Points, 0.5);
        let mut rng = self.rng("predict");
        let squad = SquadOptimizer::new().select(
            &pool.players,
            &objective,
            &self.rules()?,
            None,
            Some(&mut rng as &mut dyn RngCore),
        )?;
        let mut archive = SquadArchive::load(self.archive_path(&args.fixture))?;
        let archived = archive.submit(squad.clone())?;
        info!(
            target: "squadctl",
            fixture = %args.fixture,
            pool = pool.players.len(),
            ?archived,
            "predicted squad"
        );

        Ok(PredictReport {
            attacking_clubs: pool.attacking_clubs,
            defending_clubs: pool.defending_clubs,
            pool_size: pool.players.len(),
            squad: SquadReport {
                fixture: Some(args.fixture.clone()),
                objective: objective.to_string(),
                total_points: squad.total_points(),
                total_cost: squad.total_cost(),
                total_stars: squad.total_stars(),
                squad,
                archived: Some(archived),
            },
        })
    }

    fn planner(&self) -> Result<HorizonPlanner> {
        let store: Arc<dyn PlayerStore> = Arc::new(self.store()?);
        Ok(HorizonPlanner::new(store, SquadOptimizer::new(), self.rules()?))
    }

    fn horizon_plan(&self, args: &HorizonPlanArgs) -> Result<PlanReport> {
        let planner = self.planner()?;
        let max_subs = self.max_subs(args.max_subs);
        let mut request = HorizonRequest::new(args.fixtures.clone())
            .with_objective(Objective::single(args.objective))
            .with_max_substitutions(max_subs);
        if let Some(path) = &args.start {
            let squad: Squad = serde_json::from_str(&fs::read_to_string(path)?)?;
            request = request.with_starting_squad(squad);
        }
        let mut rng = self.rng("horizon");
        let plan = planner.plan_horizon_with(&request, Some(&mut rng as &mut dyn RngCore))?;
        if let Some(output) = &args.output {
            write_plan(output, &plan)?;
        }
        Ok(PlanReport::new(plan))
    }

    fn horizon_search(&self, args: &HorizonSearchArgs) -> Result<SearchReport> {
        let planner = self.planner()?;
        let mut config =
            SearchConfig::from_section(&self.config.search, self.max_subs(args.max_subs));
        config.seed = self.seed;
        if let Some(population) = args.population {
            config.population_size = population;
        }
        if let Some(generations) = args.generations {
            config.generations = generations;
        }
        if let Some(mutation) = args.mutation {
            if !(0.0..=1.0).contains(&mutation) {
                return Err(AppError::InvalidArgument(format!(
                    "mutation probability {mutation} is outside [0, 1]"
                )));
            }
            config.mutation_probability = mutation;
        }
        debug!(target: "squadctl", ?config, "search configured");
        let outcome = SequenceSearch::new(planner, config).search(&args.fixtures)?;
        if let Some(output) = &args.output {
            write_plan(output, &outcome.best)?;
        }
        Ok(SearchReport {
            best_fitness: outcome.best_fitness,
            discarded: outcome.discarded,
            history: outcome.history,
            plan: PlanReport::new(outcome.best),
        })
    }

    fn horizon_verify(&self, args: &HorizonVerifyArgs) -> Result<VerifyReport> {
        let plan: HorizonPlan = serde_json::from_str(&fs::read_to_string(&args.plan)?)?;
        let max_subs = self.max_subs(args.max_subs);
        let findings = audit_plan(&plan, &self.rules()?, max_subs);
        Ok(VerifyReport {
            periods: plan.periods().into_iter().map(str::to_string).collect(),
            total_points: plan.total_points(),
            max_substitutions: max_subs,
            findings,
        })
    }

    fn archive_frequency(&self, args: &ArchiveFileArgs) -> Result<FrequencyReport> {
        let archive = load_existing_archive(&args.file)?;
        Ok(FrequencyReport {
            squads: archive.len(),
            players: player_frequency(archive.squads()),
        })
    }

    fn archive_graph(&self, args: &ArchiveGraphArgs) -> Result<SimilarityGraph> {
        let archive = load_existing_archive(&args.file)?;
        Ok(SimilarityGraph::build(archive.squads(), args.min_common))
    }

    fn ratings_update(&self, args: &RatingsUpdateArgs) -> Result<RatingsReport> {
        let store = self.store()?;
        let totals = store.totals_with_events()?;
        let ratings = rate_players(&totals, &self.config.ratings);
        let mut distribution = BTreeMap::new();
        for rating in &ratings {
            *distribution.entry(rating.stars).or_insert(0) += 1;
        }
        let updated = if args.dry_run {
            0
        } else {
            let stars: Vec<(String, u8)> = ratings
                .iter()
                .map(|rating| (rating.name.clone(), rating.stars))
                .collect();
            store.update_stars(&stars)?
        };
        Ok(RatingsReport {
            rated: ratings.len(),
            updated,
            dry_run: args.dry_run,
            distribution,
        })
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        vec![
            check_path("squad.toml", &self.config_path),
            self.check_database(),
            check_directory("archive_dir", &self.archive_dir),
        ]
    }

    fn check_database(&self) -> HealthEntry {
        let name = "database";
        if !self.database.exists() {
            return HealthEntry::error(
                name,
                format!("{} not found", self.database.display()),
            );
        }
        let result = self
            .store()
            .and_then(|store| Ok(store.integrity_check()?));
        match result {
            Ok(report) if report.eq_ignore_ascii_case("ok") => {
                HealthEntry::ok(name, "integrity ok".to_string())
            }
            Ok(report) => HealthEntry::warn(name, format!("integrity_check: {report}")),
            Err(err) => HealthEntry::error(name, format!("failed to open: {err}")),
        }
    }
}

fn load_existing_archive(path: &Path) -> Result<SquadArchive> {
    if !path.exists() {
        return Err(AppError::MissingResource(format!(
            "archive {} not found",
            path.display()
        )));
    }
    Ok(SquadArchive::load(path)?)
}

fn write_plan(path: &Path, plan: &HorizonPlan) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(plan)?)?;
    info!(target: "squadctl", path = %path.display(), "plan written");
    Ok(())
}

fn sort_players(players: &mut [Player], sort: PlayerSort) {
    match sort {
        PlayerSort::Name => players.sort_by(|a, b| a.name.cmp(&b.name)),
        PlayerSort::Position => players.sort_by(|a, b| {
            a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name))
        }),
        PlayerSort::Club => players.sort_by(|a, b| {
            a.club.cmp(&b.club).then_with(|| a.name.cmp(&b.name))
        }),
        PlayerSort::Price => players.sort_by(|a, b| {
            b.price.cmp(&a.price).then_with(|| a.name.cmp(&b.name))
        }),
        PlayerSort::Points => players.sort_by(|a, b| {
            b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name))
        }),
    }
}

fn check_path(name: &str, path: &Path) -> HealthEntry {
    if path.exists() {
        HealthEntry::ok(name, format!("{}", path.display()))
    } else {
        HealthEntry::error(name, format!("{} missing", path.display()))
    }
}

fn check_directory(name: &str, path: &Path) -> HealthEntry {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
        Ok(_) => HealthEntry::warn(name, format!("{} is not a directory", path.display())),
        Err(_) => HealthEntry::warn(name, format!("{} not created yet", path.display())),
    }
}

fn squad_lines(squad: &Squad) -> Vec<String> {
    squad
        .sorted_by_position()
        .into_iter()
        .map(|player| {
            let stars = player
                .stars
                .map(|s| format!("{s}*"))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "  {:<2} {:<24} {:<16} price={:<3} points={:<4} stars={}",
                player.position, player.name, player.club, player.price, player.points, stars
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub database: String,
    pub counts: StoreCounts,
}

impl DisplayFallback for InitReport {
    fn display(&self) -> String {
        format!(
            "Schema ready at {} ({} players)",
            self.database, self.counts.players
        )
    }
}

impl DisplayFallback for ImportSummary {
    fn display(&self) -> String {
        format!(
            "Imported {} teams, {} players, {} fixture rows, {} events",
            self.teams, self.players, self.fixtures, self.events
        )
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database: String,
    pub counts: StoreCounts,
    pub fixtures: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub archives: BTreeMap<String, usize>,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Database: {}", self.database),
            format!(
                "  teams={} players={} fixture rows={} events={}",
                self.counts.teams, self.counts.players, self.counts.fixtures, self.counts.events
            ),
        ];
        if self.fixtures.is_empty() {
            lines.push("Fixtures: none".to_string());
        } else {
            lines.push(format!("Fixtures: {}", self.fixtures.join(", ")));
        }
        if !self.archives.is_empty() {
            lines.push("Archives:".to_string());
            for (period, squads) in &self.archives {
                lines.push(format!("  - {period}: {squads} squad(s)"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct PlayerList {
    pub total: usize,
    pub rows: Vec<Player>,
}

impl DisplayFallback for PlayerList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No players found".to_string();
        }
        let mut lines = Vec::new();
        for player in &self.rows {
            lines.push(format!(
                "{:<24} {:<2} {:<16} price={:<3} points={:<4}{}",
                player.name,
                player.position,
                player.club,
                player.price,
                player.points,
                if player.injured { " (injured)" } else { "" }
            ));
        }
        if self.total > self.rows.len() {
            lines.push(format!("... {} more", self.total - self.rows.len()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct SquadReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<String>,
    pub objective: String,
    pub total_points: i64,
    pub total_cost: i64,
    pub total_stars: i64,
    pub squad: Squad,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<ArchiveOutcome>,
}

impl DisplayFallback for SquadReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Squad for {} (objective: {}) points={} cost={} stars={}",
            self.fixture.as_deref().unwrap_or("season"),
            self.objective,
            self.total_points,
            self.total_cost,
            self.total_stars
        )];
        lines.extend(squad_lines(&self.squad));
        match self.archived {
            Some(ArchiveOutcome::Stored { index }) => {
                lines.push(format!("Stored in archive at #{index}"))
            }
            Some(ArchiveOutcome::Duplicate { index }) => {
                lines.push(format!("Already archived at #{index}"))
            }
            None => {}
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct PredictReport {
    pub attacking_clubs: Vec<String>,
    pub defending_clubs: Vec<String>,
    pub pool_size: usize,
    #[serde(flatten)]
    pub squad: SquadReport,
}

impl DisplayFallback for PredictReport {
    fn display(&self) -> String {
        [
            format!("Attacking clubs: {}", self.attacking_clubs.join(", ")),
            format!("Defending clubs: {}", self.defending_clubs.join(", ")),
            format!("Candidate pool: {} players", self.pool_size),
            self.squad.display(),
        ]
        .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct EnumerationReport {
    pub min_points: i64,
    pub combinations: u128,
    pub squads: Vec<Squad>,
}

impl DisplayFallback for EnumerationReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} candidate combinations with points >= {}",
            self.combinations, self.min_points
        )];
        if self.squads.is_empty() {
            lines.push("No legal squad".to_string());
        }
        for (index, squad) in self.squads.iter().enumerate() {
            lines.push(format!(
                "#{index} points={} cost={}: {}",
                squad.total_points(),
                squad.total_cost(),
                squad.names().into_iter().collect::<Vec<_>>().join(", ")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub total_points: i64,
    pub transfers: Vec<PeriodTransfers>,
    pub plan: HorizonPlan,
}

#[derive(Debug, Serialize)]
pub struct PeriodTransfers {
    pub period: String,
    pub ins: Vec<String>,
    pub outs: Vec<String>,
}

impl PlanReport {
    fn new(plan: HorizonPlan) -> Self {
        let transfers = plan
            .transfers()
            .into_iter()
            .map(|(period, transfers)| PeriodTransfers {
                period,
                ins: transfers.ins,
                outs: transfers.outs,
            })
            .collect();
        Self {
            total_points: plan.total_points(),
            transfers,
            plan,
        }
    }
}

impl DisplayFallback for PlanReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Plan over {} fixture(s), total points {}",
            self.plan.len(),
            self.total_points
        )];
        for entry in self.plan.entries() {
            lines.push(format!(
                "{} points={} cost={}",
                entry.period,
                entry.squad.total_points(),
                entry.squad.total_cost()
            ));
            if let Some(moves) = self.transfers.iter().find(|t| t.period == entry.period) {
                for (out, into) in moves.outs.iter().zip(&moves.ins) {
                    lines.push(format!("  {out} -> {into}"));
                }
            }
            lines.extend(squad_lines(&entry.squad));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub best_fitness: i64,
    pub discarded: usize,
    pub history: Vec<GenerationStats>,
    pub plan: PlanReport,
}

impl DisplayFallback for SearchReport {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for stats in &self.history {
            lines.push(format!(
                "generation {:>3}: population={} children={} best={} best_ever={}",
                stats.generation,
                stats.population,
                stats.children,
                stats.best_fitness,
                stats.best_ever
            ));
        }
        lines.push(format!(
            "Best fitness {} ({} candidate(s) discarded)",
            self.best_fitness, self.discarded
        ));
        lines.push(self.plan.display());
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub periods: Vec<String>,
    pub total_points: i64,
    pub max_substitutions: usize,
    pub findings: Vec<PlanAuditFinding>,
}

impl DisplayFallback for VerifyReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Plan {} (total points {}, cap {})",
            self.periods.join(" -> "),
            self.total_points,
            self.max_substitutions
        )];
        if self.findings.is_empty() {
            lines.push("[OK] no findings".to_string());
        }
        for finding in &self.findings {
            lines.push(format!(
                "[{:?}] {}: {}",
                finding.kind, finding.period, finding.note
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct FrequencyReport {
    pub squads: usize,
    pub players: Vec<PlayerFrequency>,
}

impl DisplayFallback for FrequencyReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("{} archived squad(s)", self.squads)];
        for entry in &self.players {
            lines.push(format!("{:>4}  {}", entry.count, entry.name));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for SimilarityGraph {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} squad(s), {} link(s) with >= {} shared players",
            self.nodes.len(),
            self.edges.len(),
            self.min_common
        )];
        for node in &self.nodes {
            lines.push(format!(
                "#{} points={} degree={}",
                node.index,
                node.total_points,
                self.degree(node.index)
            ));
        }
        for edge in &self.edges {
            lines.push(format!(
                "  #{} <-> #{}: {}",
                edge.a,
                edge.b,
                edge.shared.join(", ")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct RatingsReport {
    pub rated: usize,
    pub updated: usize,
    pub dry_run: bool,
    pub distribution: BTreeMap<u8, usize>,
}

impl DisplayFallback for RatingsReport {
    fn display(&self) -> String {
        let mut lines = vec![if self.dry_run {
            format!("Rated {} players (dry run, nothing stored)", self.rated)
        } else {
            format!("Rated {} players, {} updated", self.rated, self.updated)
        }];
        for (stars, count) in self.distribution.iter().rev() {
            lines.push(format!("  {stars}*: {count}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(|entry| format!("[{}] {}: {}", entry.status, entry.name, entry.detail))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squad_core::store::{ImportedFixture, ImportedPlayer};
    use squad_core::Team;
    use tempfile::TempDir;

    fn sample_import() -> PlayerImport {
        let mut players = Vec::new();
        let layout = [
            (Position::Goalkeeper, 2, 5),
            (Position::Defender, 7, 6),
            (Position::Midfielder, 7, 8),
            (Position::Forward, 4, 10),
        ];
        let mut idx: i64 = 0;
        for (position, count, price) in layout {
            for _ in 0..count {
                let player = Player::new(
                    format!("{}{idx:02}", position.as_str().to_lowercase()),
                    position,
                    format!("club{}", idx % 8),
                    price,
                    10 + (idx * 7) % 30,
                );
                let fixtures = (1..=3)
                    .map(|round: i64| {
                        (
                            format!("fixture{round}"),
                            ImportedFixture {
                                points: (idx * round * 5) % 13,
                                events: Default::default(),
                            },
                        )
                    })
                    .collect();
                players.push(ImportedPlayer { player, fixtures });
                idx += 1;
            }
        }
        PlayerImport {
            teams: (0..8)
                .map(|i| Team {
                    name: format!("club{i}"),
                    overall: 60.0,
                    attack: 60.0,
                    defend: 60.0,
                })
                .collect(),
            players,
        }
    }

    fn cli(root: &Path, command: Commands) -> Cli {
        Cli {
            config: root.join("configs/squad.toml"),
            database: Some(root.join("data/players.sqlite")),
            archive_dir: Some(root.join("data/best_teams")),
            format: OutputFormat::Json,
            seed: Some(9),
            log_level: "info".to_string(),
            command,
        }
    }

    fn prepare_test_context() -> Result<(TempDir, AppContext)> {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let configs_dir = root.join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        fs::copy("../configs/squad.toml", configs_dir.join("squad.toml")).unwrap();

        let context = AppContext::new(&cli(root, Commands::Init))?;
        context.init()?;

        let import_path = root.join("import.json");
        fs::write(
            &import_path,
            serde_json::to_string(&sample_import()).unwrap(),
        )
        .unwrap();
        let summary = context.import(&ImportArgs { file: import_path })?;
        assert_eq!(summary.players, 20);
        Ok((temp, context))
    }

    fn fixtures() -> Vec<String> {
        vec!["fixture1".to_string(), "fixture2".to_string()]
    }

    #[test]
    fn status_reports_counts_and_fixtures() {
        let (_temp, context) = prepare_test_context().unwrap();
        let status = context.gather_status().unwrap();
        assert_eq!(status.counts.players, 20);
        assert_eq!(status.counts.fixtures, 60);
        assert_eq!(status.fixtures, vec!["fixture1", "fixture2", "fixture3"]);
        assert!(status.archives.is_empty());
    }

    #[test]
    fn players_listing_filters_and_sorts() {
        let (_temp, context) = prepare_test_context().unwrap();
        let list = context
            .players(&PlayersArgs {
                fixture: None,
                min_points: Some(20),
                position: Some(Position::Defender),
                club: None,
                sort: PlayerSort::Points,
                limit: 3,
            })
            .unwrap();
        assert!(list.rows.len() <= 3);
        assert!(list
            .rows
            .iter()
            .all(|p| p.position == Position::Defender && p.points > 20));
        assert!(list.rows.windows(2).all(|w| w[0].points >= w[1].points));
    }

    #[test]
    fn best_squad_is_archived_once() {
        let (_temp, context) = prepare_test_context().unwrap();
        let args = BestArgs {
            fixture: Some("fixture1".to_string()),
            objective: ObjectiveKey::Points,
            secondary: None,
            weight: 0.5,
            budget: None,
            save: true,
        };
        let first = context.squad_best(&args).unwrap();
        assert_eq!(first.squad.len(), 11);
        assert!(first.total_cost <= 108);
        assert_eq!(first.archived, Some(ArchiveOutcome::Stored { index: 0 }));

        let second = context.squad_best(&args).unwrap();
        assert_eq!(second.archived, Some(ArchiveOutcome::Duplicate { index: 0 }));

        let frequency = context
            .archive_frequency(&ArchiveFileArgs {
                file: context.archive_path("fixture1"),
            })
            .unwrap();
        assert_eq!(frequency.squads, 1);
        assert_eq!(frequency.players.len(), 11);
    }

    #[test]
    fn planned_horizon_round_trips_through_verify() {
        let (temp, context) = prepare_test_context().unwrap();
        let output = temp.path().join("plans/plan.json");
        let report = context
            .horizon_plan(&HorizonPlanArgs {
                fixtures: fixtures(),
                start: None,
                objective: ObjectiveKey::Points,
                max_subs: Some(2),
                output: Some(output.clone()),
            })
            .unwrap();
        assert_eq!(report.plan.len(), 2);
        assert!(report.transfers.iter().all(|t| t.ins.len() <= 2));

        let verified = context
            .horizon_verify(&HorizonVerifyArgs {
                plan: output.clone(),
                max_subs: Some(2),
            })
            .unwrap();
        assert!(verified.findings.is_empty());
        assert_eq!(verified.total_points, report.total_points);

        let strict = context
            .horizon_verify(&HorizonVerifyArgs {
                plan: output,
                max_subs: Some(0),
            })
            .unwrap();
        let changed = report.transfers.iter().filter(|t| !t.ins.is_empty()).count();
        assert_eq!(strict.findings.len(), changed);
    }

    #[test]
    fn horizon_search_is_seeded() {
        let (_temp, context) = prepare_test_context().unwrap();
        let args = HorizonSearchArgs {
            fixtures: fixtures(),
            population: Some(4),
            generations: Some(2),
            mutation: None,
            max_subs: None,
            output: None,
        };
        let first = context.horizon_search(&args).unwrap();
        let second = context.horizon_search(&args).unwrap();
        assert_eq!(first.best_fitness, second.best_fitness);
        assert_eq!(first.history, second.history);
        assert!(first
            .history
            .windows(2)
            .all(|w| w[1].best_ever >= w[0].best_ever));

        let bad = HorizonSearchArgs {
            mutation: Some(1.5),
            ..args
        };
        assert!(matches!(
            context.horizon_search(&bad),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn predicted_squad_comes_from_ranked_clubs_and_is_archived() {
        let (_temp, mut context) = prepare_test_context().unwrap();
        let args = PredictArgs {
            fixture: "fixture2".to_string(),
            top: Some(8),
        };
        assert!(matches!(
            context.squad_predict(&args),
            Err(AppError::MissingResource(_))
        ));

        let matchups = (0..4)
            .map(|i| squad_core::Matchup::new(format!("club{i}"), format!("club{}", i + 4)))
            .collect();
        context
            .config
            .predict
            .matchups
            .insert("fixture2".to_string(), matchups);

        let first = context.squad_predict(&args).unwrap();
        assert_eq!(first.attacking_clubs.len(), 8);
        assert_eq!(first.pool_size, 20);
        assert_eq!(first.squad.squad.len(), 11);
        assert!(first.squad.total_cost <= 108);
        assert_eq!(first.squad.archived, Some(ArchiveOutcome::Stored { index: 0 }));

        let again = context.squad_predict(&args).unwrap();
        assert_eq!(again.squad.archived, Some(ArchiveOutcome::Duplicate { index: 0 }));
    }

    #[test]
    fn non_finite_mutation_probability_fails_startup() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("configs")).unwrap();
        let config = fs::read_to_string("../configs/squad.toml")
            .unwrap()
            .replace("mutation_probability = 0.2", "mutation_probability = nan");
        fs::write(root.join("configs/squad.toml"), config).unwrap();
        assert!(matches!(
            AppContext::new(&cli(root, Commands::Health)),
            Err(AppError::Config(squad_core::ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn ratings_update_stores_stars() {
        let (_temp, context) = prepare_test_context().unwrap();
        let dry = context
            .ratings_update(&RatingsUpdateArgs { dry_run: true })
            .unwrap();
        assert_eq!(dry.updated, 0);

        let report = context
            .ratings_update(&RatingsUpdateArgs { dry_run: false })
            .unwrap();
        assert_eq!(report.rated, 20);
        assert_eq!(report.updated, 20);
        assert!(report.distribution.keys().all(|stars| (1..=5).contains(stars)));
        let store = context.store().unwrap();
        assert!(store
            .get_all_players()
            .unwrap()
            .iter()
            .all(|p| p.stars.is_some()));
    }

    #[test]
    fn health_flags_missing_database() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("configs")).unwrap();
        fs::copy("../configs/squad.toml", root.join("configs/squad.toml")).unwrap();
        let context = AppContext::new(&cli(root, Commands::Health)).unwrap();
        let report = context.health_check();
        assert!(matches!(report[0].status, CheckStatus::Ok));
        assert!(matches!(report[1].status, CheckStatus::Error));
        assert!(matches!(
            context.gather_status(),
            Err(AppError::MissingResource(_))
        ));
    }
}
