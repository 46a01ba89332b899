use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gal_automaton::{Automaton, AutomatonContext, AutomatonParams, Corpus};
use gal_evaluator::GalFitness;

use crate::{
    config::LearnerConfig,
    dot,
    model::LearnedModel,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Learned model (`.json`) or text instance file
    instance: PathBuf,
    /// Score the automaton against this training file
    #[arg(long)]
    training: Option<PathBuf>,
    /// Configuration file (JSON) supplying the fitness parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the automaton as a Graphviz file
    #[arg(long)]
    dot: Option<PathBuf>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let config = LearnerConfig::load(arg.config.as_deref())?;
    config.validate()?;
    let automaton = load_automaton(&arg.instance, config.automaton_params())?;

    let mut output = Output::stdout();
    output.write_text(&automaton.to_text())?;

    if let Some(path) = &arg.training {
        let text = util::read_text_file("training", path)?;
        let corpus = Corpus::encode(automaton.alphabet(), &text)
            .with_context(|| format!("Failed to encode training file: {}", path.display()))?;
        let fitness =
            GalFitness::new(corpus, config.fitness_params()).context("Invalid fitness parameters")?;
        let breakdown = fitness.debug(&automaton);
        println!("{breakdown}");
    }
    if let Some(path) = &arg.dot {
        util::write_text_file("dot", path, &dot::render(&automaton))?;
    }
    Ok(())
}

fn load_automaton(path: &Path, params: AutomatonParams) -> anyhow::Result<Automaton> {
    if path.extension().is_some_and(|ext| ext == "json") {
        let model: LearnedModel = util::read_json_file("model", path)?;
        let context = AutomatonContext::new(model.alphabet.clone(), params);
        return model.to_automaton(context);
    }
    let text = util::read_text_file("instance", path)?;
    Automaton::parse_text(&text, params)
        .with_context(|| format!("Failed to parse instance file: {}", path.display()))
}
