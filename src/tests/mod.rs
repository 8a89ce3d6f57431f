mod integration_in;
mod scopes_and_views;

use crate::config::RuntimeConfig;
use crate::runtime::Engine;
use std::io::Cursor;

type TestEngine = Engine<Cursor<Vec<u8>>, Vec<u8>>;

fn engine_with_input(input: &str) -> TestEngine {
    Engine::new(
        RuntimeConfig::default(),
        Cursor::new(input.as_bytes().to_vec()),
        Vec::new(),
    )
}

fn printed(engine: TestEngine) -> String {
    String::from_utf8(engine.into_output()).unwrap()
}
