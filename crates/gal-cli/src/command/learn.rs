use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use gal_automaton::{Alphabet, Automaton, AutomatonContext, AutomatonFactory, Corpus};
use gal_evaluator::GalFitness;
use gal_search::{
    SearchEngine, cellular::CellularSearch, genetic::GeneticSearch, instance::Instance as _,
    service::FitnessService, stats::FitnessStats,
};

use crate::{
    config::{EngineKind, LearnerConfig},
    dot,
    model::{LearnedModel, PopulationSnapshot},
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct LearnArg {
    /// Training file: one sequence per line, whitespace-separated symbols
    training: PathBuf,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path for the learned model (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Rewrite this Graphviz file with the best automaton after every generation
    #[arg(long)]
    dot: Option<PathBuf>,
    /// Write the final best automaton in text form
    #[arg(long)]
    best: Option<PathBuf>,
    /// Write the final population as a snapshot for `--resume`
    #[arg(long)]
    save_population: Option<PathBuf>,
    /// Start from a saved population snapshot instead of a random one
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Override the configured number of generations
    #[arg(long)]
    generations: Option<usize>,
    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,
    /// Directory for per-generation best dumps
    #[arg(long, default_value = ".")]
    dump_dir: PathBuf,
}

pub(crate) fn run(arg: &LearnArg) -> anyhow::Result<()> {
    let mut config = LearnerConfig::load(arg.config.as_deref())?;
    if let Some(generations) = arg.generations {
        config.generations = generations;
    }
    if let Some(seed) = arg.seed {
        config.seed = seed;
    }
    config.validate()?;

    let text = util::read_text_file("training", &arg.training)?;
    let snapshot = arg
        .resume
        .as_ref()
        .map(|path| util::read_json_file::<PopulationSnapshot, _>("population snapshot", path))
        .transpose()?;
    if let Some(snapshot) = &snapshot {
        anyhow::ensure!(
            snapshot.engine == config.engine,
            "Snapshot was taken with the {:?} engine but the configuration selects {:?}",
            snapshot.engine,
            config.engine,
        );
    }
    let resumed_alphabet = snapshot.as_ref().map(|s| &s.alphabet);
    let (alphabet, corpus) = training_corpus(&text, resumed_alphabet)
        .with_context(|| format!("Invalid training file: {}", arg.training.display()))?;
    log::info!(
        "{} training sequences over {} symbols",
        corpus.len(),
        alphabet.len()
    );

    let context = AutomatonContext::new(alphabet, config.automaton_params());
    let fitness = Arc::new(
        GalFitness::new(corpus, config.fitness_params()).context("Invalid fitness parameters")?,
    );
    log::info!("target language size {}", fitness.target_language_size());
    let service = FitnessService::spawn(Arc::clone(&fitness), config.worker_count());
    log::info!("{} fitness workers", service.worker_count());

    let initial = snapshot
        .as_ref()
        .map(|snapshot| snapshot.to_population(&context))
        .transpose()?;
    let mut engine = start_engine(&config, &service, &context, initial)?;

    for _ in 0..config.generations {
        engine.step();
        report(engine.as_ref(), &fitness, &config, arg)?;
    }

    let best = engine
        .best_instance()
        .context("Search finished without a population")?
        .clone();
    let generation = snapshot.as_ref().map_or(0, |s| s.generation) + engine.generation();
    let breakdown = fitness.debug(&best);

    if let Some(path) = &arg.best {
        util::write_text_file("best instance", path, &best.to_text())?;
    }
    if let Some(path) = &arg.save_population {
        let snapshot = PopulationSnapshot::new(
            config.engine,
            generation,
            &context.alphabet,
            engine.population(),
        );
        Output::save_json(&snapshot, Some(path.clone()))?;
    }
    drop(engine);
    service.shutdown();

    let model = LearnedModel::new(model_name(&arg.training), generation, &best);
    Output::save_json(&model, arg.output.clone())?;

    eprintln!("Learning completed.");
    eprintln!("  Generations: {generation}");
    eprintln!("  Best: {breakdown}");
    Ok(())
}

/// Tokenizes the training text, or encodes it against a resumed alphabet.
fn training_corpus(
    text: &str,
    alphabet: Option<&Alphabet>,
) -> anyhow::Result<(Alphabet, Corpus)> {
    let (alphabet, corpus) = match alphabet {
        Some(alphabet) => (alphabet.clone(), Corpus::encode(alphabet, text)?),
        None => Corpus::tokenize(text),
    };
    anyhow::ensure!(!corpus.is_empty(), "no training sequences");
    anyhow::ensure!(!alphabet.is_empty(), "no symbols in the alphabet");
    Ok((alphabet, corpus))
}

fn start_engine(
    config: &LearnerConfig,
    service: &FitnessService<Automaton>,
    context: &Arc<AutomatonContext>,
    initial: Option<Vec<Automaton>>,
) -> anyhow::Result<Box<dyn SearchEngine<Automaton>>> {
    let factory = AutomatonFactory::new(Arc::clone(context));
    let engine: Box<dyn SearchEngine<Automaton>> = match config.engine {
        EngineKind::Cellular => {
            let mut engine =
                CellularSearch::new(service.scheduler(), config.cellular_params(), config.seed)?;
            match initial {
                Some(population) => engine
                    .set_initial_population(population)
                    .context("Snapshot does not fit the cellular grid")?,
                None => engine.start_population(&factory),
            }
            Box::new(engine)
        }
        EngineKind::Flat => {
            let mut engine =
                GeneticSearch::new(service.scheduler(), config.flat_params(), config.seed)?;
            match initial {
                Some(population) => engine
                    .set_initial_population(population)
                    .context("Snapshot does not fit the flat population")?,
                None => engine.start_population(&factory, config.initial_mutation),
            }
            Box::new(engine)
        }
    };
    Ok(engine)
}

fn report(
    engine: &dyn SearchEngine<Automaton>,
    fitness: &GalFitness,
    config: &LearnerConfig,
    arg: &LearnArg,
) -> anyhow::Result<()> {
    let generation = engine.generation();
    let Some(best) = engine.best_instance() else {
        return Ok(());
    };
    log::info!("generation {generation} best fitness {}", best.fitness());
    if let Some(stats) = FitnessStats::from_population(engine.population()) {
        log::info!(
            "  min {:.4} max {:.4} mean {:.4} median {:.4} stddev {:.4}",
            stats.min,
            stats.max,
            stats.mean,
            stats.median,
            stats.std_dev,
        );
    }
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("  best: {}", fitness.debug(best));
    }

    if config.dump_best_per_generation {
        let path = arg.dump_dir.join(format!("{generation}-best.instance"));
        util::write_text_file("best instance", &path, &best.to_text())?;
    }
    if let Some(path) = &arg.dot {
        util::write_text_file("dot", path, &dot::render(best))?;
    }
    Ok(())
}

fn model_name(training: &Path) -> String {
    training
        .file_stem()
        .map_or_else(|| "model".to_owned(), |stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_corpus_rejects_empty_input() {
        let err = training_corpus("\n  \n", None).unwrap_err();
        assert!(err.to_string().contains("no training sequences"));

        let alphabet = Alphabet::from_symbols(["a"]);
        assert!(training_corpus("", Some(&alphabet)).is_err());
        assert!(training_corpus("a\n", Some(&Alphabet::default())).is_err());
    }

    #[test]
    fn test_training_corpus() {
        let (alphabet, corpus) = training_corpus("x y\ny\n", None).unwrap();
        assert_eq!(alphabet, Alphabet::from_symbols(["x", "y"]));
        assert_eq!(corpus.len(), 2);

        let resumed = Alphabet::from_symbols(["y", "x"]);
        let (alphabet, corpus) = training_corpus("x y\n", Some(&resumed)).unwrap();
        assert_eq!(alphabet, resumed);
        assert_eq!(corpus.sequences(), &[vec![1, 0]]);
        assert!(training_corpus("x z\n", Some(&resumed)).is_err());
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name(Path::new("data/toy.txt")), "toy");
        assert_eq!(model_name(Path::new("/")), "model");
    }
}
