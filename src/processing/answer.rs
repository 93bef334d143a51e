//! Helper routines for turning retrieved chunks into a chat answer.

use crate::index::SearchMatch;

/// Build the prompt sent to an abstractive summarization provider.
pub(crate) fn build_answer_prompt(
    question: &str,
    matches: &[SearchMatch],
    max_words: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "System: You answer questions strictly from the provided document excerpts. Prefer neutral tone. Avoid speculation. Return at most {max_words} words. Output a single paragraph.\n\n"
    ));
    prompt.push_str("Document excerpts:\n");

    for item in matches {
        let text = item.text.trim();
        if text.is_empty() {
            continue;
        }
        let snippet = truncate_sentence(text, 400);
        prompt.push_str(&format!("- [{}] {snippet}\n", item.source_filename));
    }

    prompt.push_str(&format!("\nQuestion: {question}\n"));
    prompt
}

/// Build a deterministic extractive answer bounded by a word budget.
///
/// Used when no summarization provider is configured, or when the provider fails.
pub(crate) fn build_extractive_answer(matches: &[SearchMatch], max_words: usize) -> String {
    let mut bullets = Vec::new();
    let mut used_words = 0usize;

    for item in matches {
        let text = item.text.trim();
        if text.is_empty() {
            continue;
        }

        let sentence = truncate_sentence(first_sentence(text), 180);
        if sentence.is_empty() {
            continue;
        }

        let bullet = format!("- {}: {}", item.source_filename, sentence);
        let bullet_words = count_words(&bullet);
        if bullet_words == 0 {
            continue;
        }
        if !bullets.is_empty() && used_words + bullet_words > max_words {
            break;
        }
        used_words += bullet_words;
        bullets.push(bullet);
        if used_words >= max_words {
            break;
        }
    }

    if bullets.is_empty() {
        return matches
            .iter()
            .find_map(|item| {
                let trimmed = item.text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(truncate_sentence(trimmed, 180))
                }
            })
            .unwrap_or_else(|| "No relevant document excerpts found.".into());
    }

    bullets.join("\n")
}

fn first_sentence(text: &str) -> &str {
    text.split(|c| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .unwrap_or(text)
}

fn truncate_sentence(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars - 1).collect::<String>();
    truncated.push('…');
    truncated
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
