use crate::pipeline::{Envelope, PipelineError, Transform};
use microgrid_client::Sample;
use time::macros::datetime;

/// Pure validation of an ingested `Sample`.
///
/// Rules:
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
/// - every present channel must be a finite number.
pub fn validate_sample(env: Envelope<Sample>) -> Result<Envelope<Sample>, PipelineError> {
    let s = &env.payload;

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if s.ts < min_ts || s.ts > max_ts {
        return Err(PipelineError::Rejected(format!(
            "timestamp {} out of allowed range",
            s.ts
        )));
    }

    if let Some((channel, value)) = s.first_non_finite() {
        return Err(PipelineError::Rejected(format!(
            "{channel} is not finite ({value}) at {}",
            s.ts
        )));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct SampleValidation;

#[async_trait::async_trait]
impl Transform<Sample, Sample> for SampleValidation {
    async fn apply(&self, input: Envelope<Sample>) -> Result<Envelope<Sample>, PipelineError> {
        let line = input.line;
        match validate_sample(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_sample_rejected_total").increment(1);
                tracing::debug!(error = %e, line, "sample rejected by validation");
                Err(e)
            }
        }
    }
}
