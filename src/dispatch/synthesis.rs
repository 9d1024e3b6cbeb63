//! Prompt construction for the synthesis pass.

use std::fmt::Write;

/// One fan-out outcome as the synthesis backend sees it.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub provider: &'a str,
    pub outcome: Result<&'a str, &'a str>,
}

const INSTRUCTIONS: &str = "\
Merge the answers above into one consolidated answer to the original question.

If the answers are lists or rankings:
- combine them into a single list without duplicate items
- rank items by how many answers mention them
- break ties by the best position an item reached in any answer

Otherwise, write one coherent answer that keeps every correct point and resolves disagreements.

Ignore answers that report an error. Output the merged answer first; put any notes about \
sources or disagreements after it.";

pub fn build_synthesis_prompt(user_prompt: &str, inputs: &[SynthesisInput<'_>]) -> String {
    let mut prompt = String::with_capacity(user_prompt.len() + 512);
    let _ = writeln!(prompt, "Original question:\n{}\n", user_prompt);
    let _ = writeln!(prompt, "Answers from {} providers:\n", inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        match input.outcome {
            Ok(content) => {
                let _ = writeln!(prompt, "--- Answer {} ({}) ---\n{}\n", i + 1, input.provider, content);
            }
            Err(error) => {
                let _ = writeln!(prompt, "--- Answer {} ({}) ---\n[error] {}\n", i + 1, input.provider, error);
            }
        }
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}
