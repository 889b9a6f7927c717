use crate::config::Config;
use crate::session::{Generation, Session};

/// Everything the core knows; never leaves the core.
#[derive(Debug, Default)]
pub struct Model {
    pub config: Config,
    pub session: Session,
    /// Generation of the most recently started upload.
    pub generation: Generation,
}

impl Model {
    pub fn next_generation(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.generation
    }

    #[must_use]
    pub fn is_latest(&self, generation: Generation) -> bool {
        self.generation == generation
    }
}
