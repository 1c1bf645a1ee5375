use crate::config::Source;

/// Static list of configured feed sources. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    pub fn enabled(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// Lookup regardless of the enabled flag; callers decide what a disabled
    /// source means for them.
    pub fn by_id(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn by_language(&self, language: &str) -> Vec<Source> {
        self.sources
            .iter()
            .filter(|s| s.enabled && s.language == language)
            .cloned()
            .collect()
    }
}
