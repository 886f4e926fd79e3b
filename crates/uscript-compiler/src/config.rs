//! Compiler options.

/// Options controlling a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Treat the first class error as fatal for the whole build.
    pub bootstrap: bool,
    /// Deepest allowed nesting of scopes (class, state, function, blocks).
    pub max_nest_depth: usize,
    /// Largest relative offset a callable may reach.
    pub max_code_size: usize,
    /// Log decompiled source for every class, not just `#decompile` ones.
    pub decompile_all: bool,
    /// Decompile and recompile each class, logging any byte difference.
    pub verify_round_trip: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            bootstrap: false,
            max_nest_depth: 16,
            max_code_size: 0xFFFE,
            decompile_all: false,
            verify_round_trip: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_max_nest_depth(mut self, depth: usize) -> Self {
        self.max_nest_depth = depth;
        self
    }

    pub fn with_max_code_size(mut self, size: usize) -> Self {
        self.max_code_size = size.min(0xFFFE);
        self
    }

    pub fn with_decompile_all(mut self, decompile: bool) -> Self {
        self.decompile_all = decompile;
        self
    }

    pub fn with_verify_round_trip(mut self, verify: bool) -> Self {
        self.verify_round_trip = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = CompilerConfig::new().with_bootstrap(true).with_max_code_size(1 << 20);
        assert!(config.bootstrap);
        assert_eq!(config.max_code_size, 0xFFFE);
        assert_eq!(config.max_nest_depth, 16);
    }
}
