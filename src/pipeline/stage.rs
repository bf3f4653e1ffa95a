use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bitflags::bitflags;

/// The construction stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PixelType,
    GridAlignment,
    NoData,
    Statistics,
    Overviews,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::PixelType,
        Stage::GridAlignment,
        Stage::NoData,
        Stage::Statistics,
        Stage::Overviews,
        Stage::Finalize,
    ];

    pub fn flag(self) -> StageSet {
        match self {
            Stage::PixelType => StageSet::PIXEL_TYPE,
            Stage::GridAlignment => StageSet::GRID_ALIGNMENT,
            Stage::NoData => StageSet::NO_DATA,
            Stage::Statistics => StageSet::STATISTICS,
            Stage::Overviews => StageSet::OVERVIEWS,
            Stage::Finalize => StageSet::FINALIZE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stage::PixelType => "pixel type",
            Stage::GridAlignment => "grid alignment",
            Stage::NoData => "no-data",
            Stage::Statistics => "statistics",
            Stage::Overviews => "overviews",
            Stage::Finalize => "finalize",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    /// Accepts the display name or a kebab-case spelling (`grid-alignment`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name().replace('-', " ") == wanted)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

bitflags! {
    /// Which stages a pipeline run executes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StageSet: u8 {
        const PIXEL_TYPE = 0x01;
        const GRID_ALIGNMENT = 0x02;
        const NO_DATA = 0x04;
        const STATISTICS = 0x08;
        const OVERVIEWS = 0x10;
        const FINALIZE = 0x20;
    }
}

impl Default for StageSet {
    fn default() -> Self {
        StageSet::all()
    }
}

impl StageSet {
    pub fn runs(self, stage: Stage) -> bool {
        self.contains(stage.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Overviews.to_string(), "overviews");
        assert_eq!("grid-alignment".parse::<Stage>(), Ok(Stage::GridAlignment));
        assert_eq!("no-data".parse::<Stage>(), Ok(Stage::NoData));
        assert_eq!("PIXEL_TYPE".parse::<Stage>(), Ok(Stage::PixelType));
        assert!("warp".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_set() {
        let set = StageSet::default() - Stage::Statistics.flag();
        assert!(set.runs(Stage::Finalize));
        assert!(!set.runs(Stage::Statistics));
        assert_eq!(Stage::ALL.iter().filter(|s| set.runs(**s)).count(), 5);
    }
}
