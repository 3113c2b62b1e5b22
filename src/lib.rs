#[macro_use]
mod browser;
mod engine;
mod game;
mod sprite;

use engine::GameLoop;
use game::Hillside;
use wasm_bindgen::prelude::*;

/// Main entry for the WebAssembly module
/// - sizes the canvas to the fixed logical viewport
/// - spawns the async initialization and hands off to the game loop
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();

    let canvas = browser::canvas().expect("canvas element must exist before startup");
    canvas.set_width(game::VIEWPORT_WIDTH as u32);
    canvas.set_height(game::VIEWPORT_HEIGHT as u32);

    browser::spawn_local(async move {
        GameLoop::start(Hillside::new())
            .await
            .expect("Could not start game loop");
    });

    Ok(())
}
