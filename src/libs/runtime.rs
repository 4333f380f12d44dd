use crate::libs::descriptor::DependencyDescriptor;
use crate::libs::engine::EngineError;

/// `Declared -> Resolving -> {Loaded | Failed}`. No retries, nothing persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Declared,
    Resolving,
    Loaded,
    Failed(EngineError),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Declared => "declared",
            LoadState::Resolving => "resolving",
            LoadState::Loaded => "loaded",
            LoadState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed(_))
    }
}

/// Tracks one descriptor through a single load pass.
#[derive(Debug, Clone)]
pub struct LibraryRuntime<'a> {
    pub descriptor: &'a DependencyDescriptor,
    state: LoadState,
}

impl<'a> LibraryRuntime<'a> {
    pub fn declare(descriptor: &'a DependencyDescriptor) -> Self {
        Self {
            descriptor,
            state: LoadState::Declared,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn begin(&mut self) {
        if matches!(self.state, LoadState::Declared) {
            self.transition(LoadState::Resolving);
        }
    }

    /// Only a resolving library can finish; anything else is ignored.
    pub fn finish(&mut self, result: Result<(), EngineError>) {
        if !matches!(self.state, LoadState::Resolving) {
            return;
        }

        match result {
            Ok(()) => self.transition(LoadState::Loaded),
            Err(err) => self.transition(LoadState::Failed(err)),
        }
    }

    fn transition(&mut self, next: LoadState) {
        tracing::debug!(
            "library {} {} -> {}",
            self.descriptor.id(),
            self.state.label(),
            next.label()
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::descriptor::tests::descriptor;

    #[test]
    fn happy_path() {
        let descriptor = descriptor("kotlin-stdlib");
        let mut runtime = LibraryRuntime::declare(&descriptor);
        assert_eq!(runtime.state(), &LoadState::Declared);
        runtime.begin();
        assert_eq!(runtime.state(), &LoadState::Resolving);
        runtime.finish(Ok(()));
        assert_eq!(runtime.state(), &LoadState::Loaded);
        assert!(runtime.state().is_terminal());
    }

    #[test]
    fn failure_is_terminal() {
        let descriptor = descriptor("kotlin-stdlib");
        let mut runtime = LibraryRuntime::declare(&descriptor);
        runtime.begin();
        runtime.finish(Err(EngineError::Download("connection reset".to_string())));
        assert!(matches!(runtime.state(), LoadState::Failed(EngineError::Download(_))));

        runtime.finish(Ok(()));
        runtime.begin();
        assert_eq!(runtime.state().label(), "failed");
    }

    #[test]
    fn cannot_finish_before_resolving() {
        let descriptor = descriptor("kotlin-stdlib");
        let mut runtime = LibraryRuntime::declare(&descriptor);
        runtime.finish(Ok(()));
        assert_eq!(runtime.state(), &LoadState::Declared);
    }
}
