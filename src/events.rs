/// Inputs to the player and ghost state machines.
///
/// Both machines share the vocabulary; each one ignores the events its
/// transition table has no entry for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateEvent {
    Scatter,
    ChasePacman,
    PowerPelletEaten,
    PowerPelletWearOff,
    StartFlickering,
    GhostEaten,
    ReachBase,
    PacManEaten,
    GameOver,
    AllPelletsEaten,
}

impl StateEvent {
    pub const ALL: [StateEvent; 10] = [
        StateEvent::Scatter,
        StateEvent::ChasePacman,
        StateEvent::PowerPelletEaten,
        StateEvent::PowerPelletWearOff,
        StateEvent::StartFlickering,
        StateEvent::GhostEaten,
        StateEvent::ReachBase,
        StateEvent::PacManEaten,
        StateEvent::GameOver,
        StateEvent::AllPelletsEaten,
    ];
}
