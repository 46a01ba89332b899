//! Graphviz rendering of an automaton.

use std::fmt::Write as _;

use gal_automaton::Automaton;
use gal_search::instance::Instance as _;

/// Renders `automaton` as a left-to-right digraph with the accepting state in bold and the
/// fitness as a free-floating label.
pub fn render(automaton: &Automaton) -> String {
    let mut out = String::new();
    out.push_str("digraph fsa{\n");
    out.push_str("  node [height=0.5,width=0.5]\n");
    out.push_str("  rankdir=LR\n");
    let accepting = automaton.accepting_state();
    for state in 0..automaton.size() {
        let style = if state == accepting { " style=bold" } else { "" };
        let _ = writeln!(out, "  n{state} [label=\"{state}\"{style}]");
    }
    for (state, row) in automaton.rows().enumerate() {
        for (target, symbol) in row.iter().zip(automaton.alphabet().iter()) {
            if let Some(target) = target {
                let _ = writeln!(out, "  n{state}->n{target} [label=\"{}\"]", escape(symbol));
            }
        }
    }
    let _ = writeln!(
        out,
        "  fitness [label=\"fitness {}\" color=white]",
        automaton.fitness()
    );
    out.push_str("}\n");
    out
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
