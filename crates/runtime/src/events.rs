#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStage {
    TickAdmitted,
    ExcursionsMarked,
    SignalsCollected,
    EntriesApplied,
    SnapshotBuilt,
    ExitsApplied,
}

impl RoundStage {
    pub const ALL: [RoundStage; 6] = [
        RoundStage::TickAdmitted,
        RoundStage::ExcursionsMarked,
        RoundStage::SignalsCollected,
        RoundStage::EntriesApplied,
        RoundStage::SnapshotBuilt,
        RoundStage::ExitsApplied,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TickAdmitted => "tick_admitted",
            Self::ExcursionsMarked => "excursions_marked",
            Self::SignalsCollected => "signals_collected",
            Self::EntriesApplied => "entries_applied",
            Self::SnapshotBuilt => "snapshot_built",
            Self::ExitsApplied => "exits_applied",
        }
    }
}
