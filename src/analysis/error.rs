use std::fmt;

use thiserror::Error;

/// Pipeline stage an unexpected fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchWindow,
    Aggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchWindow => f.write_str("fetch window"),
            Stage::Aggregate => f.write_str("aggregate"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no readings available for analysis")]
    NoData,

    #[error("analysis of patient {patient_id} failed during {stage}: {source}")]
    Stage {
        patient_id: String,
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    pub fn stage(patient_id: impl Into<String>, stage: Stage, source: anyhow::Error) -> Self {
        AnalysisError::Stage {
            patient_id: patient_id.into(),
            stage,
            source,
        }
    }
}
