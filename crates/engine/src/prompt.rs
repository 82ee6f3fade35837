use std::collections::BTreeMap;

use crate::models::{scene_token, SceneDescriptor, Utterance};

pub const SELECTION_OPEN: &str = "[SCENE_SELECTION]";
pub const SELECTION_CLOSE: &str = "[/SCENE_SELECTION]";

pub struct ChunkPrompt<'a> {
    pub characters_info: &'a str,
    /// Rendered rolling context, if the window holds anything.
    pub context: Option<&'a str>,
    pub utterances: &'a [Utterance],
    pub scenes: &'a [SceneDescriptor],
    pub queries: &'a [String],
}

impl ChunkPrompt<'_> {
    pub fn build(&self) -> String {
        let mut sections = vec!["The following is one part of a continuous video series.".to_string()];

        let characters = self.characters_info.trim();
        if !characters.is_empty() {
            sections.push(format!("[Characters and background]\n{}", characters));
        }

        if let Some(context) = self.context {
            sections.push(context.to_string());
        }

        if !self.scenes.is_empty() {
            sections.push(format!("[Scenes in the current video]\n{}", self.scene_lines()));
        }

        let unaligned: Vec<&Utterance> = self
            .utterances
            .iter()
            .filter(|u| !self.scenes.iter().any(|s| s.overlaps(u)))
            .collect();
        if !unaligned.is_empty() {
            let header = if self.scenes.is_empty() {
                "[Dialogue in the current video]"
            } else {
                "[Dialogue outside detected scenes]"
            };
            sections.push(format!("{}\n{}", header, dialogue_lines(unaligned.into_iter())));
        }

        sections.push(
            "Taking the earlier videos into account, describe what happens in each scene, \
             relate it to the dialogue, and explain how the story progresses. \
             Then summarize the current video."
                .to_string(),
        );

        if !self.queries.is_empty() {
            sections.push(self.selection_instructions());
        }

        sections.join("\n\n")
    }

    fn scene_lines(&self) -> String {
        self.scenes
            .iter()
            .enumerate()
            .map(|(i, scene)| {
                let header = format!("Scene {} ({:.1}s-{:.1}s)", i + 1, scene.start, scene.end);
                let lines = dialogue_lines(self.utterances.iter().filter(|u| scene.overlaps(u)));
                if lines.is_empty() {
                    header
                } else {
                    format!("{}\n{}", header, lines)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn selection_instructions(&self) -> String {
        let queries = self
            .queries
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Q{}: {}", i + 1, q))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "[Scene search]\n{}\n\nAfter the summary, list for every query the numbers of the scenes \
             that match it, using exactly this format (write `none` when nothing matches):\n\
             {}\nQ1: 1, 3\nQ2: none\n{}",
            queries, SELECTION_OPEN, SELECTION_CLOSE
        )
    }
}

fn dialogue_lines<'a>(utterances: impl Iterator<Item = &'a Utterance>) -> String {
    utterances
        .map(|u| format!("[{}] {}", u.speaker, u.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResponse {
    /// Summary text with the selection block removed.
    pub summary: String,
    /// 1-based scene numbers per query, aligned with the query list.
    pub nominations: Vec<Vec<usize>>,
    /// Entries dropped because they named an unknown query or scene.
    pub rejected: Vec<String>,
}

/// Splits the model answer into the user-facing summary and its scene picks.
pub fn parse_chunk_response(response: &str, query_count: usize, scene_count: usize) -> ChunkResponse {
    let mut nominations = vec![Vec::new(); query_count];
    let mut rejected = Vec::new();

    let Some(open) = response.find(SELECTION_OPEN) else {
        return ChunkResponse {
            summary: response.trim().to_string(),
            nominations,
            rejected,
        };
    };

    let before = &response[..open];
    let inner_start = open + SELECTION_OPEN.len();
    let (block, after) = match response[inner_start..].find(SELECTION_CLOSE) {
        Some(rel) => (
            &response[inner_start..inner_start + rel],
            &response[inner_start + rel + SELECTION_CLOSE.len()..],
        ),
        None => (&response[inner_start..], ""),
    };

    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((label, picks)) = line.split_once(':') else {
            rejected.push(line.to_string());
            continue;
        };
        let query_number = label
            .trim()
            .trim_start_matches(|c: char| c == 'Q' || c == 'q')
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=query_count).contains(n));
        let Some(query_number) = query_number else {
            rejected.push(line.to_string());
            continue;
        };

        let slot = &mut nominations[query_number - 1];
        for pick in picks.split(',').map(str::trim) {
            if pick.is_empty() || pick.eq_ignore_ascii_case("none") {
                continue;
            }
            match scene_number(pick) {
                Some(n) if (1..=scene_count).contains(&n) => {
                    if !slot.contains(&n) {
                        slot.push(n);
                    }
                }
                _ => rejected.push(format!("Q{}: {}", query_number, pick)),
            }
        }
    }

    let summary = [before.trim(), after.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    ChunkResponse {
        summary,
        nominations,
        rejected,
    }
}

/// `3`, `#3` or `Scene 3`; anything else (ranges, decimals, suffixes) is not a scene number.
fn scene_number(pick: &str) -> Option<usize> {
    let body = match pick.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("scene") => &pick[5..],
        _ => pick,
    };
    let body = body.trim_start().trim_start_matches('#').trim_start();
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    body.parse().ok()
}

/// Turns per-query scene numbers of chunk `order` into scene tokens keyed by query text.
pub fn nomination_tokens(
    order: u32,
    queries: &[String],
    nominations: &[Vec<usize>],
) -> BTreeMap<String, Vec<String>> {
    let mut tokens: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (query, picks) in queries.iter().zip(nominations) {
        let entry = tokens.entry(query.clone()).or_default();
        for &n in picks {
            let token = scene_token(order, n);
            if !entry.contains(&token) {
                entry.push(token);
            }
        }
    }
    tokens
}
