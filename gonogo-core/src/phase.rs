/// Defines experiment phases and behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn allows_response(&self) -> bool;
    fn requires_calibration(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_practice(&self) -> bool {
        false
    }
    fn is_experiment(&self) -> bool {
        false
    }

    /// Screens that hold until a keypress.
    fn is_message(&self) -> bool {
        false
    }

    fn is_debrief(&self) -> bool {
        false
    }
}

/// Phase order of the Go/No-Go session.
#[derive(Copy, Debug, Clone, PartialEq, Default)]
pub enum GoNoGoPhase {
    #[default]
    Welcome,
    Calibration,
    Instructions,
    Practice,
    PracticeEnd,
    Experiment,
    Debrief,
}

impl Phase for GoNoGoPhase {
    fn allows_response(&self) -> bool {
        matches!(self, Self::Practice | Self::Experiment)
    }

    fn requires_calibration(&self) -> bool {
        matches!(self, Self::Calibration)
    }

    fn next(&self) -> Option<Self> {
        use GoNoGoPhase::*;
        Some(match self {
            Welcome => Calibration,
            Calibration => Instructions,
            Instructions => Practice,
            Practice => PracticeEnd,
            PracticeEnd => Experiment,
            Experiment => Debrief,
            Debrief => return None,
        })
    }

    fn is_practice(&self) -> bool {
        matches!(self, GoNoGoPhase::Practice)
    }

    fn is_experiment(&self) -> bool {
        matches!(self, GoNoGoPhase::Experiment)
    }

    fn is_message(&self) -> bool {
        matches!(
            self,
            GoNoGoPhase::Welcome
                | GoNoGoPhase::Instructions
                | GoNoGoPhase::PracticeEnd
                | GoNoGoPhase::Debrief
        )
    }

    fn is_debrief(&self) -> bool {
        matches!(self, GoNoGoPhase::Debrief)
    }
}
