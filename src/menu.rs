//! Numbered menus as tables of `(key, label, handler)`

use anyhow::Result;
use colored::Colorize;

use crate::prompt::Prompter;
use crate::ui;

/// What the loop does after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub type Handler<S> = fn(&mut S) -> Result<Flow>;

pub struct MenuItem<S> {
    pub key: &'static str,
    pub label: &'static str,
    pub handler: Handler<S>,
}

/// A titled list of items; `0` always exits
pub struct Menu<S> {
    title: &'static str,
    items: Vec<MenuItem<S>>,
}

/// Sessions that can be driven by [`Menu::run`]
pub trait Interactive {
    fn prompter(&mut self) -> &mut dyn Prompter;
}

impl<S> Menu<S> {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            items: Vec::new(),
        }
    }

    pub fn item(mut self, key: &'static str, label: &'static str, handler: Handler<S>) -> Self {
        self.items.push(MenuItem {
            key,
            label,
            handler,
        });
        self
    }

    pub fn items(&self) -> &[MenuItem<S>] {
        &self.items
    }

    pub fn find(&self, key: &str) -> Option<&MenuItem<S>> {
        self.items.iter().find(|i| i.key == key)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(&format!("  {:>2}) {}\n", item.key, item.label));
        }
        out.push_str("   0) Exit\n");
        out
    }

    /// Run the handler for `choice`.
    ///
    /// Handler errors are propagated; unknown choices warn and continue.
    pub fn dispatch(&self, state: &mut S, choice: &str) -> Result<Flow> {
        let choice = choice.trim();
        if choice == "0" || choice.eq_ignore_ascii_case("q") {
            return Ok(Flow::Exit);
        }
        match self.find(choice) {
            Some(item) => {
                log::debug!("menu '{}': {}", self.title, item.label);
                (item.handler)(state)
            }
            None => {
                ui::warn(&format!("Unknown option '{choice}'"));
                Ok(Flow::Continue)
            }
        }
    }
}

impl<S: Interactive> Menu<S> {
    /// Show the menu until the operator exits.
    ///
    /// A failing handler reports its error and returns to the menu.
    /// Only a failure to read the choice itself ends the loop.
    pub fn run(&self, state: &mut S) -> Result<()> {
        loop {
            ui::header(self.title);
            print!("{}", self.render());
            let choice = state.prompter().input(&"Choose an option".bold().to_string(), None)?;

            match self.dispatch(state, &choice) {
                Ok(Flow::Exit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => {
                    log::debug!("handler failed: {e:?}");
                    ui::error(&format!("{e:#}"));
                }
            }
        }
    }
}
