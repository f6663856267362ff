pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::{GoNoGoPhase, Phase};
pub use stimulus::Word;
pub use trial::{Feedback, RESPONSE_KEY, TrialResult, TrialSpec, TrialState};
