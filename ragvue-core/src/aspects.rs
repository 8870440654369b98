//! Aspect extraction: the atomic information needs a question asks for.

use crate::error::LlmError;
use crate::judge::Judge;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

const ASPECTS_SYSTEM_PROMPT: &str = "You split a question into a small set of atomic aspects.\n\
Each aspect describes a distinct information need that must be satisfied to fully answer the question.\n\
Do NOT answer the question and do NOT use outside knowledge.\n\
Do NOT insert specific names, dates, or facts that are not already written in the question.\n\
If the question uses words like 'who', 'when', 'where', etc., keep these words or use a generic descriptor \
such as 'author of the book' or 'year of publication'; do not replace them with concrete answers.\n\
Aspects must stay in question space, not look like filled-in answers.";

/// Placeholder used when no usable token survives the deterministic fallback.
pub const GENERIC_ASPECT: &str = "required aspect(s) from question";

static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9\-]+").expect("valid token regex"));

fn aspects_user_prompt(question: &str) -> String {
    format!(
        "Question: {question}\n\n\
List the minimal aspects that the answer must cover.\n\n\
Rules:\n\
- Return 1–3 aspects.\n\
- Each aspect should be a short phrase (about 3–8 words), not a full sentence.\n\
- Describe what information is being asked for, not the answer itself.\n\
- Do NOT introduce new names, dates, or facts that are not explicitly present in the question.\n\
- Do NOT copy the whole question; break it into smaller information needs if it has multiple parts.\n\
- No explanation, no extra text.\n\n\
Format:\n\
- One aspect per line, starting with a dash.\n\n\
Example:\n\
Q: Who wrote the novel '1984' and when was it first published?\n\
A:\n\
- who wrote the novel '1984'\n\
- when the novel '1984' was first published"
    )
}

/// Aspects for `question`: the caller's list when given, otherwise extracted by the judge.
pub async fn get_aspects(
    judge: &Judge,
    question: &str,
    provided: Option<&[String]>,
    model: &str,
    max_aspects: usize,
) -> Result<Vec<String>, LlmError> {
    if let Some(list) = provided.filter(|l| !l.is_empty()) {
        return Ok(list
            .iter()
            .take(max_aspects)
            .map(|a| a.trim().to_string())
            .collect());
    }
    extract_aspects(judge, question, model, max_aspects).await
}

/// Ask the judge to split `question` into at most `max_aspects` aspects.
pub async fn extract_aspects(
    judge: &Judge,
    question: &str,
    model: &str,
    max_aspects: usize,
) -> Result<Vec<String>, LlmError> {
    let reply = judge
        .chat_text(
            ASPECTS_SYSTEM_PROMPT,
            &aspects_user_prompt(question),
            model,
            0.0,
        )
        .await?;
    let aspects = parse_aspect_lines(&reply, max_aspects);
    debug!(count = aspects.len(), "Extracted aspects from question");
    Ok(aspects)
}

/// One aspect per non-empty line, with list markers and numbering removed.
pub fn parse_aspect_lines(text: &str, max_aspects: usize) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| "-*0123456789. ".contains(c))
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(max_aspects)
        .map(str::to_string)
        .collect()
}

/// Deterministic checklist built from the question's longer words.
pub fn fallback_aspects(question: &str, max_aspects: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let aspects: Vec<String> = WORD_TOKEN
        .find_iter(question)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.chars().count() >= 4)
        .filter(|t| seen.insert(t.clone()))
        .take(max_aspects)
        .collect();
    if aspects.is_empty() {
        vec![GENERIC_ASPECT.to_string()]
    } else {
        aspects
    }
}
