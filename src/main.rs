use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use log::info;

use prsm_annotator::chemistry::constants::{DEFAULT_ACCURACY, DEFAULT_HISTOGRAM_STEP, DEFAULT_MAX_E_VALUE};
use prsm_annotator::io::deconv::DeconvolutionProgram;
use prsm_annotator::io::table::{count_identifications, identification_map, IdentificationFilter, TheoreticTableReader};
use prsm_annotator::msms::annotator::{annotate, annotated_scans};
use prsm_annotator::msms::search::{count_exclusively_found, exclusively_found, search_peaks, write_found_peaks, ResultSet};
use prsm_annotator::msms::stats::{HistogramValue, MatchHistogram};
use prsm_annotator::AnalysisConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Annotate proteoform-spectrum matches with theoretic fragment ions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate the scans of one deconvolution program with matching ions
    Annotate {
        program: DeconvolutionProgram,
        deconv_file: PathBuf,
        table: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        tolerance: ToleranceArgs,
    },
    /// Report, for every ion, which sources contain it
    Search {
        table: PathBuf,
        output: PathBuf,
        /// A deconvolution output as PROGRAM:PATH; repeat to add sources
        #[arg(short, long = "source", required = true)]
        sources: Vec<SourceArg>,
        #[arg(short, long, default_value_t = DEFAULT_ACCURACY)]
        accuracy: f64,
    },
    /// List the ions found in every required source and in none of the excluded ones
    Exclusive {
        table: PathBuf,
        output: Option<PathBuf>,
        #[arg(short, long = "require", required = true)]
        required: Vec<SourceArg>,
        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<SourceArg>,
        /// Only print the number of exclusively found ions
        #[arg(long)]
        count_only: bool,
        #[arg(short, long, default_value_t = DEFAULT_ACCURACY)]
        accuracy: f64,
    },
    /// Count the identifications of each table passing every filter
    Count {
        #[arg(required = true)]
        tables: Vec<PathBuf>,
        #[arg(long)]
        evalue_under: Option<f64>,
        #[arg(long)]
        evalue_over: Option<f64>,
        #[arg(long, conflicts_with = "not_modified")]
        modified: bool,
        #[arg(long)]
        not_modified: bool,
    },
    /// Bucket matched ions into a histogram
    Histogram {
        program: DeconvolutionProgram,
        deconv_file: PathBuf,
        table: PathBuf,
        output: PathBuf,
        /// difference, mass or average-error
        #[arg(long, default_value_t = HistogramValue::Difference)]
        value: HistogramValue,
        /// Bucket width
        #[arg(long, default_value_t = DEFAULT_HISTOGRAM_STEP, value_parser = parse_step)]
        step: f64,
        #[command(flatten)]
        tolerance: ToleranceArgs,
    },
}

#[derive(Args, Debug)]
struct ToleranceArgs {
    /// Relative mass accuracy
    #[arg(short, long, default_value_t = DEFAULT_ACCURACY)]
    accuracy: f64,
    /// Identifications with a higher e-value are ignored
    #[arg(short = 'e', long, default_value_t = DEFAULT_MAX_E_VALUE)]
    max_e_value: f64,
}

impl ToleranceArgs {
    fn config(&self, histogram_step: f64) -> AnalysisConfig {
        AnalysisConfig {
            max_e_value: self.max_e_value,
            accuracy: self.accuracy,
            histogram_step,
        }
    }
}

fn parse_step(s: &str) -> Result<f64, String> {
    let step: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !step.is_finite() || step <= 0.0 {
        return Err(format!("step must be a finite positive number, got {}", s));
    }
    Ok(step)
}

/// `PROGRAM:PATH`
#[derive(Debug, Clone)]
struct SourceArg {
    program: DeconvolutionProgram,
    path: PathBuf,
}

impl FromStr for SourceArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (program, path) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PROGRAM:PATH, got '{}'", s))?;
        Ok(SourceArg {
            program: program.parse()?,
            path: PathBuf::from(path),
        })
    }
}

/// One result set per program; files of the same program are merged.
fn load_sources(sources: &[SourceArg]) -> anyhow::Result<Vec<ResultSet>> {
    let by_program = sources.iter().into_group_map_by(|source| source.program);

    let mut result_sets = Vec::with_capacity(by_program.len());
    for program in DeconvolutionProgram::ALL {
        let Some(files) = by_program.get(&program) else {
            continue;
        };
        let mut result_set = ResultSet::new(program.name());
        for source in files {
            let scans = program
                .open(&source.path)
                .with_context(|| format!("cannot open {} output {}", program, source.path.display()))?;
            result_set.extend_from(scans)?;
        }
        result_sets.push(result_set);
    }
    Ok(result_sets)
}

fn open_table(path: &Path) -> anyhow::Result<TheoreticTableReader<File>> {
    TheoreticTableReader::open(path).with_context(|| format!("cannot open table {}", path.display()))
}

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Annotate { program, deconv_file, table, output, tolerance } => {
            let config = tolerance.config(DEFAULT_HISTOGRAM_STEP);
            let identification_by_id = identification_map(open_table(&table)?)?;
            let scans = program
                .open(&deconv_file)
                .with_context(|| format!("cannot open {} output {}", program, deconv_file.display()))?;

            let mut out = create_output(&output)?;
            let n_annotated = annotate(scans, &identification_by_id, &config, &mut out)?;
            info!("wrote {} annotation blocks to {}", n_annotated, output.display());
        }
        Command::Search { table, output, sources, accuracy } => {
            let result_sets = load_sources(&sources)?;
            let mut out = create_output(&output)?;
            search_peaks(open_table(&table)?, &result_sets, accuracy, &mut out)?;
        }
        Command::Exclusive { table, output, required, excluded, count_only, accuracy } => {
            let required = load_sources(&required)?;
            let excluded = load_sources(&excluded)?;

            if count_only {
                let count = count_exclusively_found(open_table(&table)?, &required, &excluded, accuracy)?;
                println!("{}", count);
                return Ok(());
            }

            let found_peaks = exclusively_found(open_table(&table)?, &required, &excluded, accuracy)?;
            info!("{} exclusively found peaks", found_peaks.len());
            match output {
                Some(output) => write_found_peaks(create_output(&output)?, &found_peaks)?,
                None => write_found_peaks(std::io::stdout().lock(), &found_peaks)?,
            }
        }
        Command::Count { tables, evalue_under, evalue_over, modified, not_modified } => {
            let mut filters = Vec::new();
            filters.extend(evalue_under.map(IdentificationFilter::EValueUnder));
            filters.extend(evalue_over.map(IdentificationFilter::EValueOver));
            if modified {
                filters.push(IdentificationFilter::Modified);
            }
            if not_modified {
                filters.push(IdentificationFilter::NotModified);
            }

            for table in tables {
                let count = count_identifications(open_table(&table)?, &filters)?;
                println!("{}\t{}", table.display(), count);
            }
        }
        Command::Histogram { program, deconv_file, table, output, value, step, tolerance } => {
            let config = tolerance.config(step);
            let identification_by_id = identification_map(open_table(&table)?)?;
            let scans = program
                .open(&deconv_file)
                .with_context(|| format!("cannot open {} output {}", program, deconv_file.display()))?;

            let mut matches = Vec::new();
            for annotated in annotated_scans(scans, &identification_by_id, &config) {
                let (_, _, annotation) = annotated?;
                matches.extend(annotation.matches);
            }

            let histogram = MatchHistogram::from_matches(&matches, value, config.histogram_step)?;
            info!("{} matches in {} buckets", matches.len(), histogram.len());
            histogram.write_tsv(create_output(&output)?)?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PRSM_LOG", "error,prsm_annotator=info"))
        .init();

    let cli = Cli::parse();
    run(cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_step_must_be_positive() {
        assert_eq!(parse_step("0.5"), Ok(0.5));
        for bad in ["0", "-0.01", "NaN", "inf", "wide"] {
            assert!(parse_step(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn histogram_arguments() {
        let cli = Cli::try_parse_from([
            "prsm-annotator", "histogram", "hardklor", "scans.hk", "table.tsv", "out.tsv",
            "--value", "average-error", "--step", "0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Histogram { program, value, step, .. } => {
                assert_eq!(program, DeconvolutionProgram::Hardklor);
                assert_eq!(value, HistogramValue::AverageError);
                assert_eq!(step, 0.1);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let zero_step = Cli::try_parse_from([
            "prsm-annotator", "histogram", "hardklor", "scans.hk", "table.tsv", "out.tsv", "--step", "0",
        ]);
        assert!(zero_step.is_err());
    }

    #[test]
    fn source_arguments() {
        let source: SourceArg = "msdeconv:/data/run.msalign".parse().unwrap();
        assert_eq!(source.program, DeconvolutionProgram::MsDeconv);
        assert_eq!(source.path, PathBuf::from("/data/run.msalign"));
        assert!("run.msalign".parse::<SourceArg>().is_err());
    }
}
