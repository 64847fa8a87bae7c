extern crate hpcalc;

use clap::{Parser, Subcommand};
use hpcalc::core::fit_cache::FitCache;
use hpcalc::output::{FileOutput, StdoutOutput};
use hpcalc::{run_request, Calculator, FileReferenceSource, Library, Operation};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct HpCalcArgs {
    /// JSON document describing cities, utilities, fuels and weather sites
    #[arg(long, short)]
    library: PathBuf,
    /// Directory holding one `<tmy_id>.csv` file per weather site
    #[arg(long, short)]
    weather_dir: PathBuf,
    #[arg(long, default_value_t = hpcalc::core::fit_cache::DEFAULT_FIT_CACHE_CAPACITY)]
    fit_cache_capacity: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Model a year of a building's energy use and cost
    EnergyModel(RequestArgs),
    /// Calibrate a building description against actual fuel and electric use
    FitModel(RequestArgs),
    /// Compare a building before and after a retrofit, including its economics
    AnalyzeRetrofit(RequestArgs),
    /// Analyze a set of cash flows
    AnalyzeCashFlow(RequestArgs),
    /// List the cities in the library
    Cities(QueryArgs),
    /// List the electric rate schedules in the library
    Utilities(QueryArgs),
    /// List the fuels in the library
    Fuels(QueryArgs),
    /// Look up the price of a fuel in a city
    FuelPrice(RequestArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    input_file: PathBuf,
    /// Where to write the JSON result; standard output if not given
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Where to write the JSON result; standard output if not given
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Command {
    /// The operation with its request file, if it takes one, and output file.
    fn split(&self) -> (Operation, Option<&PathBuf>, Option<&PathBuf>) {
        match self {
            Command::EnergyModel(args) => request(Operation::EnergyModel, args),
            Command::FitModel(args) => request(Operation::FitModel, args),
            Command::AnalyzeRetrofit(args) => request(Operation::AnalyzeRetrofit, args),
            Command::AnalyzeCashFlow(args) => request(Operation::AnalyzeCashFlow, args),
            Command::FuelPrice(args) => request(Operation::FuelPrice, args),
            Command::Cities(args) => (Operation::Cities, None, args.output.as_ref()),
            Command::Utilities(args) => (Operation::Utilities, None, args.output.as_ref()),
            Command::Fuels(args) => (Operation::Fuels, None, args.output.as_ref()),
        }
    }
}

fn request(
    operation: Operation,
    args: &RequestArgs,
) -> (Operation, Option<&PathBuf>, Option<&PathBuf>) {
    (operation, Some(&args.input_file), args.output.as_ref())
}

fn main() -> anyhow::Result<ExitCode> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = HpCalcArgs::parse();

    let library = Library::load(FileReferenceSource::new(&args.library, &args.weather_dir))?;
    let calculator =
        Calculator::new(library).with_fit_cache(FitCache::new(args.fit_cache_capacity));

    let (operation, input_file, output) = args.command.split();
    let input: Box<dyn Read> = match input_file {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::empty()),
    };
    let failure = match output {
        Some(path) => run_request(&calculator, operation, input, &FileOutput::new(path.clone()))?,
        None => run_request(&calculator, operation, input, &StdoutOutput)?,
    };

    Ok(match failure {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    })
}
