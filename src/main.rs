extern crate clap;
extern crate pbr;
extern crate env_logger;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_json;

use blossom_matching::example::*;
use blossom_matching::util::*;
use blossom_matching::error::MatchingError;
use blossom_matching::perfect_matching::*;
use blossom_matching::verifier::*;
use blossom_matching::visualize::*;
use pbr::ProgressBar;


fn create_clap_parser<'a>(color_choice: clap::ColorChoice) -> clap::Command<'a> {
    clap::Command::new("Blossom Matching")
        .version(env!("CARGO_PKG_VERSION"))
        .author(clap::crate_authors!(", "))
        .about("Minimum-weight perfect matching on general graphs with the Blossom V algorithm")
        .color(color_choice)
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(clap::Arg::new("verbose").long("verbose").short('v').global(true).help("log the solver progress"))
        .subcommand(clap::Command::new("solve")
            .about("solve the graph in an edge-list file")
            .arg(clap::Arg::new("file").required(true).help("edge-list file, DIMACS or bare `<node_num> <edge_num>` header"))
            .arg(clap::Arg::new("options").long("options").takes_value(true).default_value("{}").help("solver options in json"))
            .arg(clap::Arg::new("verify").long("verify").help("check the optimality certificate of the result"))
            .arg(clap::Arg::new("output").long("output").takes_value(true).help("write the matched pairs and statistics as json"))
            .arg(clap::Arg::new("visualize").long("visualize").help("record the initial and solved state in the visualizer folder"))
        )
        .subcommand(clap::Command::new("benchmark")
            .about("solve random graphs and report the average time")
            .arg(clap::Arg::new("node_num").required(true).help("the number of nodes, must be even"))
            .arg(clap::Arg::new("degree").long("degree").takes_value(true).default_value("4").help("random edges per node"))
            .arg(clap::Arg::new("rounds").long("rounds").takes_value(true).default_value("100").help("the number of random graphs"))
            .arg(clap::Arg::new("max_cost").long("max_cost").takes_value(true).default_value("1000").help("edge costs are integers in [0, max_cost]"))
            .arg(clap::Arg::new("options").long("options").takes_value(true).default_value("{}").help("solver options in json"))
            .arg(clap::Arg::new("verify").long("verify").help("check the optimality certificate of every result"))
            .arg(clap::Arg::new("benchmark_profiler_output").long("benchmark_profiler_output").takes_value(true).help("write every round as one json line"))
        )
        .subcommand(clap::Command::new("test")
            .about("cross-check the solver against exhaustive search and the optimality verifier")
            .arg(clap::Arg::new("rounds").long("rounds").takes_value(true).default_value("1000").help("random graphs per graph family"))
        )
        .subcommand(clap::Command::new("generate")
            .about("write a random graph as an edge-list file")
            .arg(clap::Arg::new("node_num").required(true).help("the number of nodes, must be even"))
            .arg(clap::Arg::new("file").required(true).help("output file"))
            .arg(clap::Arg::new("degree").long("degree").takes_value(true).default_value("4").help("random edges per node"))
            .arg(clap::Arg::new("max_cost").long("max_cost").takes_value(true).default_value("1000").help("edge costs are integers in [0, max_cost]"))
            .arg(clap::Arg::new("seed").long("seed").takes_value(true).default_value("0").help("random seed"))
            .arg(clap::Arg::new("format").long("format").takes_value(true).default_value("0").possible_values(["0", "1"]).help("0: DIMACS, 1: bare header"))
        )
}

fn parse_options(matches: &clap::ArgMatches, verbose: bool) -> MatcherOptions {
    let options_str = matches.value_of("options").unwrap();
    let mut options: MatcherOptions = serde_json::from_str(options_str).unwrap_or_else(|err| panic!("invalid options {options_str}: {err}"));
    options.verbose |= verbose;
    options
}

fn solve_once(initializer: &GraphInitializer, options: MatcherOptions, verify: bool) -> Result<(PerfectMatching, Cost), MatchingError> {
    let mut matching = PerfectMatching::from_initializer(initializer, options)?;
    matching.solve()?;
    if verify {
        check_perfect_matching_optimality(initializer.node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD)?;
    }
    let cost = compute_perfect_matching_cost(&initializer.weighted_edges, &matching)?;
    Ok((matching, cost))
}

pub fn main() {

    let matches = create_clap_parser(clap::ColorChoice::Auto).get_matches();
    let verbose = matches.is_present("verbose");
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match matches.subcommand() {
        Some(("solve", matches)) => {
            let file = matches.value_of("file").unwrap();
            let options = parse_options(matches, verbose);
            let verify = matches.is_present("verify");
            let initializer = GraphInitializer::load_edge_list(file).unwrap_or_else(|err| panic!("cannot load {file}: {err}"));
            let mut visualizer = None;
            if matches.is_present("visualize") {
                let filename = visualize_data_folder() + auto_visualize_data_filename().as_str();
                info!("visualizer file: {filename}");
                visualizer = Some(Visualizer::new(Some(filename)).unwrap());
            }
            if let Some(visualizer) = visualizer.as_mut() {
                let matching = PerfectMatching::from_initializer(&initializer, options.clone()).unwrap();
                visualizer.snapshot(format!("initial"), &matching).unwrap();
            }
            let (matching, cost) = match solve_once(&initializer, options, verify) {
                Ok(result) => result,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(err.check_code().unwrap_or(3));
                }
            };
            if let Some(visualizer) = visualizer.as_mut() {
                visualizer.snapshot(format!("solved"), &matching).unwrap();
            }
            let pairs: Vec<(NodeIndex, NodeIndex)> = (0..initializer.node_num)
                .map(|i| (i, matching.get_match(i).unwrap()))
                .filter(|&(i, j)| i < j)
                .collect();
            match matches.value_of("output") {
                Some(output) => {
                    let value = json!({
                        "cost": cost,
                        "pairs": pairs,
                        "stats": matching.stats(),
                    });
                    std::fs::write(output, value.to_string()).unwrap_or_else(|err| panic!("cannot write {output}: {err}"));
                },
                None => {
                    println!("cost = {cost}");
                    for (i, j) in pairs.iter() {
                        println!("{i} {j}");
                    }
                },
            }
        },
        Some(("benchmark", matches)) => {
            let node_num: NodeNum = matches.value_of_t("node_num").unwrap();
            let degree: usize = matches.value_of_t("degree").unwrap();
            let rounds: u64 = matches.value_of_t("rounds").unwrap();
            let max_cost: u64 = matches.value_of_t("max_cost").unwrap();
            let options = parse_options(matches, verbose);
            let verify = matches.is_present("verify");
            let benchmark_profiler_output = matches.value_of("benchmark_profiler_output").map(|s| s.to_string());
            let mut benchmark_profiler = BenchmarkProfiler::new(benchmark_profiler_output).unwrap();
            let mut pb = ProgressBar::on(std::io::stderr(), rounds);
            for round in 0..rounds {
                pb.set(round);
                let initializer = random_graph(node_num, degree, max_cost, round);
                let mut matching = PerfectMatching::from_initializer(&initializer, options.clone()).unwrap();
                benchmark_profiler.begin(node_num);
                matching.solve().unwrap();
                benchmark_profiler.end(Some(json!(matching.stats()))).unwrap();
                if verify {
                    check_perfect_matching_optimality(node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD)
                        .unwrap_or_else(|err| panic!("round {round}: {err}"));
                }
                pb.message(format!("{} ", benchmark_profiler.brief()).as_str());
            }
            pb.finish();
            println!();
        },
        Some(("test", matches)) => {
            let rounds: u64 = matches.value_of_t("rounds").unwrap();
            let mut option_sets = vec![MatcherOptions::default()];
            for dual_greedy_update_option in [DualGreedyUpdate::Cc, DualGreedyUpdate::Scc] {
                option_sets.push(MatcherOptions { fractional_jumpstart: false, dual_greedy_update_option, ..MatcherOptions::default() });
            }
            if !IS_INTEGER_COST {
                option_sets.push(MatcherOptions { dual_greedy_update_option: DualGreedyUpdate::Single, ..MatcherOptions::default() });
                option_sets.push(MatcherOptions { dual_lp_threshold: 1., update_duals_before: true, update_duals_after: true, ..MatcherOptions::default() });
            }
            let families: [(&str, fn(u64) -> GraphInitializer); 4] = [
                ("sparse", |seed| random_graph(2 + 2 * (seed as usize % 6), 2, 100, seed)),
                ("complete", |seed| random_complete_graph(2 + 2 * (seed as usize % 6), 100, seed)),
                ("geometric", |seed| random_geometric_graph(2 + 2 * (seed as usize % 6), 3, 1000., seed)),
                ("large", |seed| random_graph(100 + 2 * (seed as usize % 50), 5, 10000, seed)),
            ];
            let families_len = families.len();
            for (family_idx, (family_name, generate)) in families.iter().enumerate() {
                let mut pb = ProgressBar::on(std::io::stderr(), rounds);
                pb.message(format!("{family_name} [{family_idx}/{families_len}] ").as_str());
                for seed in 0..rounds {
                    pb.set(seed);
                    let initializer = generate(seed);
                    let expected = if initializer.node_num <= BRUTE_FORCE_MAX_NODE_NUM {
                        brute_force_minimum_cost(&initializer)
                    } else {
                        None
                    };
                    for options in option_sets.iter() {
                        let (_, cost) = solve_once(&initializer, options.clone(), true)
                            .unwrap_or_else(|err| panic!("{family_name} seed {seed} with {options:?}: {err}"));
                        if let Some(expected) = expected {
                            assert_eq!(cost, expected, "{family_name} seed {seed} with {options:?}");
                        }
                    }
                }
                pb.finish();
                println!();
            }
        },
        Some(("generate", matches)) => {
            let node_num: NodeNum = matches.value_of_t("node_num").unwrap();
            let file = matches.value_of("file").unwrap();
            let degree: usize = matches.value_of_t("degree").unwrap();
            let max_cost: u64 = matches.value_of_t("max_cost").unwrap();
            let seed: u64 = matches.value_of_t("seed").unwrap();
            let format: usize = matches.value_of_t("format").unwrap();
            let initializer = random_graph(node_num, degree, max_cost, seed);
            initializer.save_edge_list(file, format).unwrap_or_else(|err| panic!("cannot write {file}: {err}"));
            info!("wrote {} nodes and {} edges to {file}", initializer.node_num, initializer.weighted_edges.len());
        },
        _ => unreachable!()
    }

}
