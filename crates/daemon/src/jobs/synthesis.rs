use tracing::{info, warn};

use engine::synthesis::{build_final_prompt, parse_final_response, MAX_CUSTOM_PROMPTS};
use engine::PromptAnswer;

use crate::collaborators::Summarizer;
use crate::error::PipelineError;

/// Answers every custom prompt in a single summarizer call over all chunk summaries.
pub struct FinalSynthesizer<'a> {
    pub summarizer: &'a dyn Summarizer,
}

impl FinalSynthesizer<'_> {
    pub async fn synthesize(
        &self,
        summaries: &[String],
        prompts: &[String],
        context_info: &str,
    ) -> Result<Vec<PromptAnswer>, PipelineError> {
        if prompts.is_empty() {
            info!("no custom prompts, skipping final synthesis call");
            return Ok(Vec::new());
        }
        if prompts.len() > MAX_CUSTOM_PROMPTS {
            warn!(
                count = prompts.len(),
                kept = MAX_CUSTOM_PROMPTS,
                "too many custom prompts, extra ones ignored"
            );
        }

        let request = build_final_prompt(summaries, prompts, context_info);
        let response = self
            .summarizer
            .summarize(&[], &request)
            .await
            .map_err(PipelineError::external("final synthesis"))?;

        let answers = parse_final_response(&response, prompts)
            .map_err(|e| PipelineError::external("final synthesis")(e.into()))?;
        info!(answers = answers.len(), summaries = summaries.len(), "final synthesis done");
        Ok(answers)
    }
}
