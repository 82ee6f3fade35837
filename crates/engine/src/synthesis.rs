use thiserror::Error;

use crate::models::PromptAnswer;

pub const MAX_CUSTOM_PROMPTS: usize = 10;
pub const ANSWER_DELIMITER: &str = "<<<ANSWER_BREAK>>>";

#[derive(Debug, Error, PartialEq)]
pub enum SynthesisError {
    #[error("expected {expected} answers separated by {delimiter}, got {actual}")]
    PartCountMismatch {
        expected: usize,
        actual: usize,
        delimiter: &'static str,
    },
}

/// Keeps at most [`MAX_CUSTOM_PROMPTS`] prompts, dropping the rest silently.
pub fn cap_prompts(prompts: &[String]) -> &[String] {
    &prompts[..prompts.len().min(MAX_CUSTOM_PROMPTS)]
}

/// Builds the single request answering every custom prompt against the
/// concatenated chunk summaries.
pub fn build_final_prompt(summaries: &[String], prompts: &[String], context_info: &str) -> String {
    let all_summaries = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Video {}:\n{}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n\n");

    let numbered = cap_prompts(prompts)
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = String::from("Below are summaries of each part of a continuous video series.\n\n");
    let context_info = context_info.trim();
    if !context_info.is_empty() {
        prompt.push_str(&format!("[Characters and background]\n{}\n\n", context_info));
    }
    prompt.push_str(&format!("[Summaries]\n{}\n\n", all_summaries));
    prompt.push_str(&format!(
        "Answer each of the following {} requests about the whole series, in order:\n{}\n\n\
         Write only the answers. Separate consecutive answers with the line {} and do not number them.",
        cap_prompts(prompts).len(),
        numbered,
        ANSWER_DELIMITER
    ));
    prompt
}

/// Splits the model answer into one part per prompt. A count mismatch is an
/// error; parts are never guessed onto prompts.
pub fn parse_final_response(response: &str, prompts: &[String]) -> Result<Vec<PromptAnswer>, SynthesisError> {
    let prompts = cap_prompts(prompts);
    let mut body = response.trim();
    if let Some(rest) = body.strip_prefix(ANSWER_DELIMITER) {
        body = rest.trim();
    }
    if let Some(rest) = body.strip_suffix(ANSWER_DELIMITER) {
        body = rest.trim();
    }

    let parts: Vec<&str> = if body.is_empty() {
        Vec::new()
    } else {
        body.split(ANSWER_DELIMITER).map(str::trim).collect()
    };

    if parts.len() != prompts.len() {
        return Err(SynthesisError::PartCountMismatch {
            expected: prompts.len(),
            actual: parts.len(),
            delimiter: ANSWER_DELIMITER,
        });
    }

    Ok(prompts
        .iter()
        .zip(parts)
        .map(|(prompt, answer)| PromptAnswer {
            prompt: prompt.clone(),
            answer: answer.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("question {}", i)).collect()
    }

    #[test]
    fn test_final_prompt_lists_everything() {
        let summaries = vec!["first".to_string(), "second".to_string()];
        let prompt = build_final_prompt(&summaries, &prompts(2), "cast list");
        assert!(prompt.contains("Video 1:\nfirst"));
        assert!(prompt.contains("Video 2:\nsecond"));
        assert!(prompt.contains("1. question 1\n2. question 2"));
        assert!(prompt.contains("cast list"));
        assert!(prompt.contains(ANSWER_DELIMITER));
    }

    #[test]
    fn test_prompts_capped_at_ten() {
        let many = prompts(14);
        assert_eq!(cap_prompts(&many).len(), MAX_CUSTOM_PROMPTS);
        let prompt = build_final_prompt(&["s".to_string()], &many, "");
        assert!(prompt.contains("10. question 10"));
        assert!(!prompt.contains("11. question 11"));
    }

    #[test]
    fn test_parse_pairs_in_order() {
        let response = format!("  answer one \n{}\nanswer two\n{}\nanswer three", ANSWER_DELIMITER, ANSWER_DELIMITER);
        let pairs = parse_final_response(&response, &prompts(3)).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].prompt, "question 1");
        assert_eq!(pairs[0].answer, "answer one");
        assert_eq!(pairs[2].answer, "answer three");
    }

    #[test]
    fn test_parse_tolerates_edge_delimiters() {
        let response = format!("{}\na\n{}\nb\n{}\n", ANSWER_DELIMITER, ANSWER_DELIMITER, ANSWER_DELIMITER);
        let pairs = parse_final_response(&response, &prompts(2)).unwrap();
        assert_eq!(pairs[0].answer, "a");
        assert_eq!(pairs[1].answer, "b");
    }

    #[test]
    fn test_parse_count_mismatch_is_error() {
        let err = parse_final_response("just one answer", &prompts(2)).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::PartCountMismatch {
                expected: 2,
                actual: 1,
                delimiter: ANSWER_DELIMITER
            }
        );
        assert!(parse_final_response("", &prompts(1)).is_err());
    }

    #[test]
    fn test_parse_truncated_prompts() {
        let many = prompts(12);
        let response = (1..=10).map(|i| format!("a{}", i)).collect::<Vec<_>>().join(ANSWER_DELIMITER);
        let pairs = parse_final_response(&response, &many).unwrap();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[9].prompt, "question 10");
    }
}
