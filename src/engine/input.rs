use crate::browser;
use anyhow::Result;
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::KeyboardEvent;

pub enum KeyPress {
    KeyUp(KeyboardEvent),
    KeyDown(KeyboardEvent),
}

/// The set of key codes currently held down. Written only by
/// `process_input`, read once per update pass.
#[derive(Debug, Default)]
pub struct KeyState {
    pressed_keys: HashSet<String>,
}

impl KeyState {
    pub fn new() -> Self {
        KeyState::default()
    }

    pub fn is_pressed(&self, code: &str) -> bool {
        self.pressed_keys.contains(code)
    }

    pub(crate) fn set_pressed(&mut self, code: &str) {
        self.pressed_keys.insert(code.into());
    }

    pub(crate) fn set_released(&mut self, code: &str) {
        self.pressed_keys.remove(code);
    }
}

/// Wire keydown/keyup on the canvas into a channel the game loop drains.
/// The listeners are the only producer; the loop is the only consumer.
pub fn prepare_input() -> Result<UnboundedReceiver<KeyPress>> {
    let (keydown_sender, keyevent_receiver) = unbounded();
    let keydown_sender = Rc::new(RefCell::new(keydown_sender));
    let keyup_sender = keydown_sender.clone();

    let onkeydown = browser::closure_wrap(Box::new(move |keycode: KeyboardEvent| {
        let _ = keydown_sender
            .borrow_mut()
            .start_send(KeyPress::KeyDown(keycode));
    }) as Box<dyn FnMut(KeyboardEvent)>);

    let onkeyup = browser::closure_wrap(Box::new(move |keycode: KeyboardEvent| {
        let _ = keyup_sender
            .borrow_mut()
            .start_send(KeyPress::KeyUp(keycode));
    }) as Box<dyn FnMut(KeyboardEvent)>);

    let canvas = browser::canvas()?;
    canvas.set_onkeydown(Some(onkeydown.as_ref().unchecked_ref()));
    canvas.set_onkeyup(Some(onkeyup.as_ref().unchecked_ref()));
    onkeydown.forget();
    onkeyup.forget();

    Ok(keyevent_receiver)
}

/// Drain every pending key event into `state`. Runs once per frame, before
/// any update pass, so updates within a frame see one consistent snapshot.
pub fn process_input(state: &mut KeyState, keyevent_receiver: &mut UnboundedReceiver<KeyPress>) {
    loop {
        match keyevent_receiver.try_next() {
            Ok(None) => break,
            Err(_err) => break,
            Ok(Some(event)) => match event {
                KeyPress::KeyUp(event) => state.set_released(&event.code()),
                KeyPress::KeyDown(event) => state.set_pressed(&event.code()),
            },
        };
    }
}
