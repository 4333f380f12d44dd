use crate::libs::descriptor::DependencyDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Success,
    Failure { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub descriptor: DependencyDescriptor,
    pub outcome: LoadOutcome,
}

impl LoadResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Success)
    }
}

/// Outcome of one load pass, handed to the caller. Results keep manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    results: Vec<LoadResult>,
}

impl LoadSummary {
    pub(crate) fn record(&mut self, result: LoadResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[LoadResult] {
        &self.results
    }

    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> Vec<&DependencyDescriptor> {
        self.results
            .iter()
            .filter(|result| result.is_success())
            .map(|result| &result.descriptor)
            .collect()
    }

    pub fn failed(&self) -> Vec<&LoadResult> {
        self.results
            .iter()
            .filter(|result| !result.is_success())
            .collect()
    }

    pub fn had_failures(&self) -> bool {
        self.results.iter().any(|result| !result.is_success())
    }

    pub fn summary_notification(&self) -> String {
        let failed = self.failed().len();
        format!(
            "libraries: {} loaded, {failed} failed",
            self.attempted() - failed
        )
    }

    pub fn error_notifications(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|result| match &result.outcome {
                LoadOutcome::Failure { reason } => Some(reason.clone()),
                LoadOutcome::Success => None,
            })
            .collect()
    }

    /// Lines an operator should see once startup finishes.
    pub fn startup_notifications(&self, prefix: &str) -> Vec<String> {
        let mut notices = vec![self.summary_notification()];
        if self.had_failures() {
            notices.extend(self.error_notifications());
            notices.push(format!(
                "{prefix} Some libraries failed to load. Features that depend on them may not work until the next restart."
            ));
        }
        notices
    }
}
