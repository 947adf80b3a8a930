use std::sync::Arc;

use wormhole_generator::Generator;

#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(generator: impl Generator) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }

    pub fn generator(&self) -> Arc<dyn Generator> {
        Arc::clone(&self.generator)
    }
}
