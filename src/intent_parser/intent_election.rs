use std::collections::HashSet;

use log::debug;

use crate::models::intent::DEFAULT_CONTEXT;
use crate::models::IntentPrediction;

#[derive(Debug, Clone, PartialEq)]
pub struct Election {
    pub intent: IntentPrediction,
    /// The top intent cleared the threshold but was too close to the runner-up
    pub ambiguous: bool,
}

/// Keeps the predictions of `contexts` and the best prediction of each intent, ranked by
/// decreasing confidence. Equal confidences keep their incoming order.
pub fn rank_predictions(
    predictions: Vec<IntentPrediction>,
    contexts: &[String],
) -> Vec<IntentPrediction> {
    let mut ranked: Vec<IntentPrediction> = predictions
        .into_iter()
        .filter(|p| contexts.is_empty() || contexts.contains(&p.context))
        .collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    ranked.retain(|p| seen.insert(p.name.clone()));
    ranked
}

/// Elects the top intent when it is confident enough and clearly ahead of the runner-up.
///
/// With `t` the threshold and `std` the population standard deviation of the ranked
/// confidences, the top intent wins iff `c0 >= t` and, when there is a runner-up,
/// `c0 - c1 >= max(std, (1 - t) / 2)`. Otherwise `none` wins.
pub fn elect_intent(ranked: &[IntentPrediction], threshold: f32) -> Election {
    let top = match ranked.first() {
        Some(top) => top,
        None => {
            return Election {
                intent: IntentPrediction::none(DEFAULT_CONTEXT),
                ambiguous: false,
            }
        }
    };
    if top.confidence < threshold {
        debug!(
            "Top intent '{}' ({}) is below threshold {}",
            top.name, top.confidence, threshold
        );
        return Election {
            intent: IntentPrediction::none(&top.context),
            ambiguous: false,
        };
    }
    let runner_up = match ranked.get(1) {
        Some(runner_up) => runner_up,
        None => {
            return Election {
                intent: top.clone(),
                ambiguous: false,
            }
        }
    };

    let required_margin = standard_deviation(ranked).max((1.0 - threshold) / 2.0);
    let margin = top.confidence - runner_up.confidence;
    if margin >= required_margin {
        Election {
            intent: top.clone(),
            ambiguous: false,
        }
    } else {
        debug!(
            "Intents '{}' and '{}' are too close ({} < {})",
            top.name, runner_up.name, margin, required_margin
        );
        Election {
            intent: IntentPrediction::none(&top.context),
            ambiguous: true,
        }
    }
}

fn standard_deviation(ranked: &[IntentPrediction]) -> f32 {
    let count = ranked.len() as f32;
    let mean = ranked.iter().map(|p| p.confidence).sum::<f32>() / count;
    let variance = ranked
        .iter()
        .map(|p| (p.confidence - mean).powi(2))
        .sum::<f32>()
        / count;
    variance.sqrt()
}
