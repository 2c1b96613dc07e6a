//! Capacity planner entry point: CLI wiring for the optimisation run and the
//! charging-station analysis.

use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use capacity_planner::charging::analysis::{DEFAULT_BUFFER_DEG, DEFAULT_MIN_POWER_KW};
use capacity_planner::charging::geo::read_nodes_path;
use capacity_planner::charging::{ChargingQuery, ChargingRegister, Districts, analyze};
use capacity_planner::config::ScenarioConfig;
use capacity_planner::io::export::{
    export_to, write_capacities_csv, write_dispatch_csv, write_results_json, write_sensitivity_csv,
};
use capacity_planner::logging;
use capacity_planner::model::statistics::energy_balance;
use capacity_planner::runner::{self, PlanningRun};

/// Parsed options of the optimisation run.
struct PlanArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    co2_limit: Option<f64>,
    transmission_cost: Option<f64>,
    resolution: Option<u32>,
    seed_override: Option<u64>,
    sensitivity: bool,
    dispatch_out: Option<String>,
    capacities_out: Option<String>,
    sensitivity_out: Option<String>,
    results_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

/// Parsed options of the `charging` subcommand.
struct ChargingArgs {
    register: Option<String>,
    districts: Option<String>,
    district: Option<String>,
    nodes: Option<String>,
    min_power: Option<f64>,
    buffer_deg: f64,
}

enum Mode {
    Plan(PlanArgs),
    Charging(ChargingArgs),
}

struct CliArgs {
    log_json: bool,
    mode: Mode,
}

fn print_help() {
    eprintln!("capacity-planner — capacity expansion under a CO2 cap");
    eprintln!();
    eprintln!("Usage: capacity-planner [OPTIONS]");
    eprintln!("       capacity-planner charging --register <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>           Load scenario from TOML config file");
    eprintln!("  --preset <name>             Use a built-in preset (germany, two_region, quick)");
    eprintln!("  --co2-limit <Mt>            Override the CO2 cap (0-200 Mt/a)");
    eprintln!("  --transmission-cost <f64>   Override line capital cost (EUR/MW/km/a)");
    eprintln!("  --resolution <hours>        Override the snapshot resolution");
    eprintln!("  --seed <u64>                Override the synthetic profile seed");
    eprintln!("  --sensitivity               Run the CO2 sensitivity sweep");
    eprintln!("  --dispatch-out <path>       Export the energy balance to CSV");
    eprintln!("  --capacities-out <path>     Export optimal capacities to CSV");
    eprintln!("  --sensitivity-out <path>    Export the sweep to CSV (implies --sensitivity)");
    eprintln!("  --results-out <path>        Export the full run to JSON");
    eprintln!("  --log-json                  Emit logs as JSON lines on stderr");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                     Start REST API server after solving");
        eprintln!("  --port <u16>                API server port (default: 3000)");
    }
    eprintln!("  --help                      Show this help message");
    eprintln!();
    eprintln!("Charging options:");
    eprintln!("  --register <path>           Charging-station register CSV (required)");
    eprintln!("  --districts <path>          District polygons as GeoJSON");
    eprintln!("  --district <name>           Restrict the analysis to one district");
    eprintln!("  --nodes <path>              Traffic nodes CSV (osmid,x,y)");
    eprintln!("  --min-power <kW>            Keep stations of at least this power");
    eprintln!("  --fast                      Same as --min-power {DEFAULT_MIN_POWER_KW}");
    eprintln!("  --buffer-deg <f64>          Node buffer radius in degrees (default: {DEFAULT_BUFFER_DEG})");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the germany preset is used.");
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

/// Returns the argument following `flag`, advancing `i`.
fn next_value(args: &[String], i: &mut usize, flag: &str, what: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.clone(),
        None => fail(&format!("{flag} requires {what} argument")),
    }
}

fn next_parsed<T: FromStr>(args: &[String], i: &mut usize, flag: &str, what: &str) -> T {
    let raw = next_value(args, i, flag, what);
    raw.parse::<T>()
        .unwrap_or_else(|_| fail(&format!("{flag} value \"{raw}\" is not a valid {what}")))
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let charging = args.get(1).is_some_and(|a| a == "charging");
    let mut log_json = false;

    let mut plan = PlanArgs {
        scenario_path: None,
        preset: None,
        co2_limit: None,
        transmission_cost: None,
        resolution: None,
        seed_override: None,
        sensitivity: false,
        dispatch_out: None,
        capacities_out: None,
        sensitivity_out: None,
        results_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };
    let mut charge = ChargingArgs {
        register: None,
        districts: None,
        district: None,
        nodes: None,
        min_power: None,
        buffer_deg: DEFAULT_BUFFER_DEG,
    };

    let mut i = if charging { 2 } else { 1 };
    while i < args.len() {
        let flag = args[i].as_str();
        match (charging, flag) {
            (_, "--help" | "-h") => {
                print_help();
                process::exit(0);
            }
            (_, "--log-json") => log_json = true,
            (false, "--scenario") => {
                plan.scenario_path = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (false, "--preset") => plan.preset = Some(next_value(&args, &mut i, flag, "a name")),
            (false, "--co2-limit") => {
                plan.co2_limit = Some(next_parsed(&args, &mut i, flag, "number"));
            }
            (false, "--transmission-cost") => {
                plan.transmission_cost = Some(next_parsed(&args, &mut i, flag, "number"));
            }
            (false, "--resolution") => {
                plan.resolution = Some(next_parsed(&args, &mut i, flag, "u32"));
            }
            (false, "--seed") => plan.seed_override = Some(next_parsed(&args, &mut i, flag, "u64")),
            (false, "--sensitivity") => plan.sensitivity = true,
            (false, "--dispatch-out") => {
                plan.dispatch_out = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (false, "--capacities-out") => {
                plan.capacities_out = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (false, "--sensitivity-out") => {
                plan.sensitivity_out = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (false, "--results-out") => {
                plan.results_out = Some(next_value(&args, &mut i, flag, "a path"));
            }
            #[cfg(feature = "api")]
            (false, "--serve") => plan.serve = true,
            #[cfg(feature = "api")]
            (false, "--port") => plan.port = next_parsed(&args, &mut i, flag, "u16"),
            (true, "--register") => {
                charge.register = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (true, "--districts") => {
                charge.districts = Some(next_value(&args, &mut i, flag, "a path"));
            }
            (true, "--district") => {
                charge.district = Some(next_value(&args, &mut i, flag, "a name"));
            }
            (true, "--nodes") => charge.nodes = Some(next_value(&args, &mut i, flag, "a path")),
            (true, "--min-power") => {
                charge.min_power = Some(next_parsed(&args, &mut i, flag, "number"));
            }
            (true, "--fast") => charge.min_power = Some(DEFAULT_MIN_POWER_KW),
            (true, "--buffer-deg") => {
                charge.buffer_deg = next_parsed(&args, &mut i, flag, "number");
            }
            (_, other) => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mode = if charging {
        Mode::Charging(charge)
    } else {
        Mode::Plan(plan)
    };
    CliArgs { log_json, mode }
}

/// Resolves the scenario: `--scenario` takes priority, then `--preset`, then
/// the germany default. Command-line overrides are applied on top.
fn load_scenario(args: &PlanArgs) -> ScenarioConfig {
    let mut scenario = if let Some(ref path) = args.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path)).unwrap_or_else(|e| fail(&e.to_string()))
    } else if let Some(ref name) = args.preset {
        ScenarioConfig::from_preset(name).unwrap_or_else(|e| fail(&e.to_string()))
    } else {
        ScenarioConfig::germany()
    };

    if let Some(co2) = args.co2_limit {
        scenario.model.co2_limit_mt = co2;
    }
    if let Some(cost) = args.transmission_cost {
        scenario.model.transmission_cost = cost;
    }
    if let Some(hours) = args.resolution {
        scenario.model.resolution_hours = hours;
    }
    if let Some(seed) = args.seed_override {
        scenario.time_series.synthetic.seed = seed;
    }
    if args.sensitivity || args.sensitivity_out.is_some() {
        scenario.sensitivity.enabled = true;
    }
    scenario
}

fn export_file<F>(path: &str, label: &str, write: F)
where
    F: FnOnce(std::io::BufWriter<std::fs::File>) -> std::io::Result<()>,
{
    if let Err(e) = export_to(Path::new(path), write) {
        fail(&format!("failed to write {label}: {e}"));
    }
    eprintln!("{label} written to {path}");
}

fn export_outputs(args: &PlanArgs, run: &PlanningRun) {
    if let Some(ref path) = args.dispatch_out {
        let rows = energy_balance(&run.result);
        export_file(path, "Dispatch", |w| write_dispatch_csv(&rows, w));
    }
    if let Some(ref path) = args.capacities_out {
        export_file(path, "Capacities", |w| {
            write_capacities_csv(&run.statistics.capacities, w)
        });
    }
    if let Some(ref path) = args.sensitivity_out {
        if let Some(ref table) = run.sensitivity {
            export_file(path, "Sensitivity", |w| write_sensitivity_csv(table, w));
        }
    }
    if let Some(ref path) = args.results_out {
        export_file(path, "Results", |w| write_results_json(run, w));
    }
}

fn run_plan(args: PlanArgs) {
    let scenario = load_scenario(&args);

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let run = runner::run(&scenario).unwrap_or_else(|e| fail(&e.to_string()));

    println!("{}", run.statistics);
    if let Some(ref table) = run.sensitivity {
        println!("--- CO2 Sensitivity ---");
        for p in &table.points {
            match (p.total_cost_bn, p.emissions_mt, &p.error) {
                (Some(cost), Some(em), _) => println!(
                    "  {:>6.1} Mt/a  cost {cost:>8.2} bn EUR/a  emissions {em:>7.2} Mt/a",
                    p.co2_limit_mt
                ),
                (_, _, Some(err)) => println!("  {:>6.1} Mt  failed: {err}", p.co2_limit_mt),
                _ => println!("  {:>6.1} Mt  no result", p.co2_limit_mt),
            }
        }
    }

    export_outputs(&args, &run);

    #[cfg(feature = "api")]
    if args.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(capacity_planner::api::AppState::new(run));
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let rt = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(&format!("failed to create tokio runtime: {e}")));
        if let Err(e) = rt.block_on(capacity_planner::api::serve(state, addr)) {
            fail(&format!("server error: {e}"));
        }
    }
}

fn run_charging(args: ChargingArgs) {
    let Some(register_path) = args.register else {
        fail("charging requires --register <path>");
    };
    let register = ChargingRegister::from_path(&PathBuf::from(register_path))
        .unwrap_or_else(|e| fail(&e.to_string()));
    let districts = args.districts.map(|p| {
        Districts::from_path(Path::new(&p)).unwrap_or_else(|e| fail(&e.to_string()))
    });
    let nodes = match args.nodes {
        Some(p) => read_nodes_path(Path::new(&p)).unwrap_or_else(|e| fail(&e.to_string())),
        None => Vec::new(),
    };

    let query = ChargingQuery {
        district: args.district,
        min_power_kw: args.min_power,
        buffer_deg: args.buffer_deg,
    };
    let analysis = analyze(&register, districts.as_ref(), &nodes, &query)
        .unwrap_or_else(|e| fail(&e.to_string()));

    println!("{analysis}");
    for s in &analysis.near_nodes {
        let power = s.power_kw.map(|p| format!("{p:.0} kW")).unwrap_or_default();
        println!("  {:<40} {:<30} {power}", s.operator, s.address());
    }
}

fn main() {
    let cli = parse_args();
    logging::init(cli.log_json);

    match cli.mode {
        Mode::Plan(args) => run_plan(args),
        Mode::Charging(args) => run_charging(args),
    }
}
