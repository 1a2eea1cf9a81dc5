pub mod exact_matcher;
pub mod intent_election;

pub use self::exact_matcher::ExactMatcher;
pub use self::intent_election::{elect_intent, rank_predictions, Election};
